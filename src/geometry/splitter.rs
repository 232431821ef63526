use crate::error::HalaGeometryError;
use super::batch::{
  HalaBatch,
  HalaPrimitive,
  BATCH_FLUSH_THRESHOLD,
};
use super::layout::{
  HalaAttribute,
  HalaVertexLayout,
};
use super::soup::{
  HalaGroup,
  HalaTriangleSoup,
  HalaVertexAttributeIndex,
};
use super::weld::HalaWeldTable;

/// Receives every flushed batch, in material order.
pub trait HalaBatchSink {
  /// Consume a flushed batch.
  /// The batch is reset by the splitter afterwards. The sink may rewrite it,
  /// but the primitives left in it are counted as written.
  /// param batch: The batch.
  /// param layout: The vertex layout.
  /// return: The result.
  fn consume(&mut self, batch: &mut HalaBatch, layout: &HalaVertexLayout) -> Result<(), HalaGeometryError>;
}

/// The state of the splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaSplitterState {
  Accumulating,
  Flushing,
  Done,
}

/// The per-corner packing options.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HalaPackOptions {
  pub flip_v: bool,
}

/// The statistics of one split.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HalaSplitStats {
  pub num_batches: u32,
  pub num_primitives: u32,
  pub num_vertices: u64,
  pub num_indices: u64,
  pub num_conflicts: u64,
}

/// Pack one face corner into vertex bytes.
/// param soup: The triangle soup.
/// param corner: The face corner.
/// param layout: The vertex layout.
/// param options: The packing options.
/// param vertex: The output, one stride long.
pub fn pack_vertex(
  soup: &HalaTriangleSoup,
  corner: &HalaVertexAttributeIndex,
  layout: &HalaVertexLayout,
  options: &HalaPackOptions,
  vertex: &mut [u8],
) {
  vertex.fill(0);

  let position = soup.positions[corner.position as usize];
  layout.pack(HalaAttribute::Position, [position.x, position.y, position.z, 0.0], vertex);

  if layout.has(HalaAttribute::Color0) {
    if let Some(color) = soup.colors.get(corner.position as usize) {
      layout.pack(HalaAttribute::Color0, color.to_array(), vertex);
    }
  }

  if layout.has(HalaAttribute::Color1) {
    let bc = [
      if corner.barycentric == 0 { 1.0 } else { 0.0 },
      if corner.barycentric == 1 { 1.0 } else { 0.0 },
      if corner.barycentric == 2 { 1.0 } else { 0.0 },
      0.0,
    ];
    layout.pack(HalaAttribute::Color1, bc, vertex);
  }

  if layout.has(HalaAttribute::TexCoord0) {
    if let Some(texcoord) = corner.texcoord.and_then(|idx| soup.texcoords.get(idx as usize)) {
      let v = if options.flip_v { -texcoord.y } else { texcoord.y };
      layout.pack(HalaAttribute::TexCoord0, [texcoord.x, v, 0.0, 0.0], vertex);
    }
  }

  if layout.has(HalaAttribute::Normal) {
    if let Some(normal) = corner.normal.and_then(|idx| soup.normals.get(idx as usize)) {
      let normal = normal.normalize_or_zero();
      layout.pack(HalaAttribute::Normal, [normal.x, normal.y, normal.z, 0.0], vertex);
    }
  }
}

/// Walks the material-sorted groups, welds every corner and flushes batches.
/// A batch is flushed on a material change, when it nears the 16-bit vertex
/// ceiling, and once more at the end.
pub struct HalaSplitter<'a> {
  soup: &'a HalaTriangleSoup,
  layout: &'a HalaVertexLayout,
  options: HalaPackOptions,
  state: HalaSplitterState,
  batch: HalaBatch,
  table: HalaWeldTable,
  primitive: HalaPrimitive,
  scratch: Vec<u8>,
  num_closed_primitives: u32,
  stats: HalaSplitStats,
}

/// The implementation of the splitter.
impl<'a> HalaSplitter<'a> {
  /// Create a new splitter.
  /// The soup's groups must already be sorted by material.
  /// param soup: The triangle soup.
  /// param layout: The vertex layout.
  /// param options: The packing options.
  /// return: The splitter.
  pub fn new(soup: &'a HalaTriangleSoup, layout: &'a HalaVertexLayout, options: HalaPackOptions) -> Self {
    let mut batch = HalaBatch::default();
    if let Some(first) = soup.groups.first() {
      batch.reset(&first.material);
    }
    Self {
      soup,
      layout,
      options,
      state: HalaSplitterState::Accumulating,
      batch,
      table: HalaWeldTable::new(),
      primitive: HalaPrimitive::default(),
      scratch: vec![0u8; layout.stride()],
      num_closed_primitives: 0,
      stats: HalaSplitStats::default(),
    }
  }

  pub fn state(&self) -> HalaSplitterState {
    self.state
  }

  /// Split the whole soup, handing every batch to the sink.
  /// param sink: The batch sink.
  /// return: The statistics.
  pub fn run(mut self, sink: &mut dyn HalaBatchSink) -> Result<HalaSplitStats, HalaGeometryError> {
    if self.layout.is_empty() {
      return Err(HalaGeometryError::internal("The vertex layout is empty."));
    }
    let soup = self.soup;

    // The trailing None is the sentinel group forcing the final flush.
    for group in soup.groups.iter().map(Some).chain(std::iter::once(None)) {
      let group = match group {
        Some(group) => group,
        None => {
          self.flush(sink, "")?;
          self.state = HalaSplitterState::Done;
          break;
        },
      };
      self.primitive.name.clone_from(&group.name);
      for tri in group.start_triangle..group.end_triangle() {
        if self.needs_flush(group) {
          self.flush(sink, &group.material)?;
        }
        self.add_triangle(tri as usize)?;
      }
      self.close_primitive();

      log::trace!("group s {:5}, n {:5}, {}", group.start_triangle, group.num_triangles, group.material);
    }

    if self.num_closed_primitives != self.stats.num_primitives {
      return Err(HalaGeometryError::internal(&format!("Not all primitives are written, {} closed, {} written.",
        self.num_closed_primitives, self.stats.num_primitives)));
    }
    Ok(self.stats)
  }

  fn needs_flush(&self, group: &HalaGroup) -> bool {
    self.batch.material != group.material || self.batch.num_vertices as usize >= BATCH_FLUSH_THRESHOLD
  }

  /// Weld the three corners of a triangle into the current batch.
  fn add_triangle(&mut self, tri: usize) -> Result<(), HalaGeometryError> {
    let soup = self.soup;
    let triangle = &soup.triangles[tri];
    for corner in triangle.corners.iter() {
      pack_vertex(soup, corner, self.layout, &self.options, &mut self.scratch);
      let result = self.table.resolve(&mut self.batch, corner, &self.scratch)?;
      self.batch.indices.push(result.index);
    }
    Ok(())
  }

  /// Close the open primitive and open the next one at the cursor.
  fn close_primitive(&mut self) {
    self.primitive.num_vertices = self.batch.num_vertices - self.primitive.start_vertex;
    self.primitive.num_indices = self.batch.num_indices() - self.primitive.start_index;
    if self.primitive.num_indices > 0 {
      self.batch.primitives.push(self.primitive.clone());
      self.num_closed_primitives += 1;
      self.primitive.start_vertex = self.batch.num_vertices;
      self.primitive.start_index = self.batch.num_indices();
    }
  }

  /// Close the batch, hand it to the sink and start an empty one.
  fn flush(&mut self, sink: &mut dyn HalaBatchSink, material: &str) -> Result<(), HalaGeometryError> {
    self.state = HalaSplitterState::Flushing;
    self.close_primitive();

    if !self.batch.indices.is_empty() {
      self.stats.num_batches += 1;
      self.stats.num_conflicts += self.batch.num_conflicts as u64;
      log::debug!("Flushing batch \"{}\": {} primitives, {} vertices, {} indices.",
        self.batch.material, self.batch.primitives.len(), self.batch.num_vertices, self.batch.indices.len());

      sink.consume(&mut self.batch, self.layout)?;

      self.stats.num_primitives += self.batch.primitives.len() as u32;
      self.stats.num_vertices += self.batch.num_vertices as u64;
      self.stats.num_indices += self.batch.indices.len() as u64;
    }

    self.batch.reset(material);
    self.table.reset();
    self.primitive.start_vertex = 0;
    self.primitive.start_index = 0;
    self.state = HalaSplitterState::Accumulating;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use glam::Vec3;

  use super::*;
  use crate::geometry::batch::MAX_BATCH_VERTICES;
  use crate::geometry::layout::HalaLayoutFlags;
  use crate::geometry::soup::HalaTriangle;

  /// Keeps a copy of every batch.
  #[derive(Default)]
  struct CollectSink {
    batches: Vec<HalaBatch>,
  }

  impl HalaBatchSink for CollectSink {
    fn consume(&mut self, batch: &mut HalaBatch, layout: &HalaVertexLayout) -> Result<(), HalaGeometryError> {
      batch.validate(layout.stride())?;
      self.batches.push(batch.clone());
      Ok(())
    }
  }

  fn corner(position: u32) -> HalaVertexAttributeIndex {
    HalaVertexAttributeIndex::new(position, None, None)
  }

  /// Every triangle gets three unique positions.
  fn unique_soup(groups: &[(&str, u32)]) -> HalaTriangleSoup {
    let mut soup = HalaTriangleSoup::default();
    for (name, num_triangles) in groups.iter() {
      let start = soup.triangles.len() as u32;
      for _ in 0..*num_triangles {
        let base = soup.positions.len() as u32;
        for i in 0..3 {
          soup.positions.push(Vec3::new((base + i) as f32, 0.0, 0.0));
        }
        soup.triangles.push(HalaTriangle {
          corners: [corner(base), corner(base + 1), corner(base + 2)],
        });
      }
      soup.groups.push(HalaGroup {
        start_triangle: start,
        num_triangles: *num_triangles,
        name: format!("{}_{}", name, start),
        material: name.to_string(),
      });
    }
    soup
  }

  fn split(soup: &HalaTriangleSoup) -> (Vec<HalaBatch>, HalaSplitStats) {
    let layout = HalaVertexLayout::build(&HalaLayoutFlags::default());
    let mut sink = CollectSink::default();
    let stats = HalaSplitter::new(soup, &layout, HalaPackOptions::default()).run(&mut sink).unwrap();
    (sink.batches, stats)
  }

  #[test]
  fn unsorted_materials_split_per_run() {
    let soup = unique_soup(&[("wood", 2), ("metal", 2), ("wood", 2)]);
    let (batches, _) = split(&soup);
    let materials = batches.iter().map(|b| b.material.as_str()).collect::<Vec<_>>();
    assert_eq!(materials, vec!["wood", "metal", "wood"]);
  }

  #[test]
  fn sorted_materials_give_one_batch_each() {
    let mut soup = unique_soup(&[("wood", 2), ("metal", 2), ("wood", 2)]);
    soup.sort_groups_by_material();
    let (batches, stats) = split(&soup);
    let materials = batches.iter().map(|b| b.material.as_str()).collect::<Vec<_>>();
    assert_eq!(materials, vec!["metal", "wood"]);
    assert_eq!(batches[1].primitives.len(), 2);
    assert_eq!(batches[1].primitives[0].name, "wood_0");
    assert_eq!(batches[1].primitives[1].name, "wood_4");
    assert_eq!(batches[1].primitives[1].start_index, 6);
    assert_eq!(stats.num_batches, 2);
    assert_eq!(stats.num_primitives, 3);
  }

  #[test]
  fn ceiling_splits_large_groups() {
    let soup = unique_soup(&[("stone", 70_000)]);
    let (batches, stats) = split(&soup);
    assert!(batches.len() >= 2);
    for batch in batches.iter() {
      assert!(batch.num_vertices as usize <= MAX_BATCH_VERTICES);
      assert!(batch.indices.iter().all(|&index| (index as u32) < batch.num_vertices));
      assert_eq!(batch.primitives.len(), 1);
      assert_eq!(batch.primitives[0].name, "stone_0");
    }
    assert_eq!(stats.num_indices, 70_000 * 3);
    assert_eq!(stats.num_vertices, 70_000 * 3);
  }

  #[test]
  fn shared_corners_are_welded() {
    let mut soup = unique_soup(&[("m", 1)]);
    soup.triangles.push(HalaTriangle {
      corners: [corner(2), corner(1), corner(0)],
    });
    soup.groups[0].num_triangles = 2;
    let (batches, stats) = split(&soup);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].num_vertices, 3);
    assert_eq!(batches[0].indices, vec![0, 1, 2, 2, 1, 0]);
    assert_eq!(stats.num_conflicts, 0);
  }

  #[test]
  fn every_closed_primitive_reaches_the_sink() {
    let mut soup = unique_soup(&[("wood", 3), ("wood", 0), ("metal", 2)]);
    soup.sort_groups_by_material();
    let (batches, stats) = split(&soup);
    let written = batches.iter().map(|b| b.primitives.len() as u32).sum::<u32>();
    assert_eq!(written, 2);
    assert_eq!(stats.num_primitives, written);
  }

  #[test]
  fn dropped_batch_fails_the_primitive_count() {
    struct DroppingSink;
    impl HalaBatchSink for DroppingSink {
      fn consume(&mut self, batch: &mut HalaBatch, _layout: &HalaVertexLayout) -> Result<(), HalaGeometryError> {
        batch.primitives.clear();
        Ok(())
      }
    }
    let soup = unique_soup(&[("m", 2)]);
    let layout = HalaVertexLayout::build(&HalaLayoutFlags::default());
    let result = HalaSplitter::new(&soup, &layout, HalaPackOptions::default()).run(&mut DroppingSink);
    assert!(result.is_err());
  }

  #[test]
  fn empty_soup_writes_nothing() {
    let soup = HalaTriangleSoup::default();
    let (batches, stats) = split(&soup);
    assert!(batches.is_empty());
    assert_eq!(stats, HalaSplitStats::default());
  }

  #[test]
  fn flip_v_negates_texcoord() {
    let mut soup = unique_soup(&[("m", 1)]);
    soup.texcoords.push(Vec3::new(0.25, 0.75, 0.0));
    soup.has_texcoord = true;
    let layout = HalaVertexLayout::build(&HalaLayoutFlags { has_texcoord: true, ..Default::default() });
    let mut vertex = vec![0u8; layout.stride()];
    let corner = HalaVertexAttributeIndex::new(0, Some(0), None);
    pack_vertex(&soup, &corner, &layout, &HalaPackOptions { flip_v: true }, &mut vertex);
    let uv = layout.unpack(HalaAttribute::TexCoord0, &vertex).unwrap();
    assert_eq!(uv[1], -0.75);
  }

  #[test]
  fn barycentric_ids_pack_one_hot() {
    let soup = unique_soup(&[("m", 1)]);
    let layout = HalaVertexLayout::build(&HalaLayoutFlags { has_barycentric: true, ..Default::default() });
    let mut vertex = vec![0u8; layout.stride()];
    let mut corner = HalaVertexAttributeIndex::new(0, None, None);
    corner.barycentric = 1;
    pack_vertex(&soup, &corner, &layout, &HalaPackOptions::default(), &mut vertex);
    assert_eq!(&vertex[12..16], &[0, 255, 0, 0]);
  }
}
