use crate::error::HalaGeometryError;
use super::batch::HalaBatch;
use super::layout::HalaVertexLayout;
use super::optimizer::HalaMeshOptimizer;
use super::tangent::calc_tangents;

/// Runs tangent generation and the mesh optimizations over a flushed batch.
pub struct HalaPostProcessor;

/// The implementation of the post processor.
impl HalaPostProcessor {
  /// Process a batch in place.
  /// Tangents and vertex fetch work on the whole batch, vertex cache on each primitive.
  /// The vertex count can shrink, primitive vertex ranges are recomputed afterwards.
  /// param batch: The batch.
  /// param layout: The vertex layout.
  /// param compress: Whether the index stream will be compressed.
  pub fn process(batch: &mut HalaBatch, layout: &HalaVertexLayout, compress: bool) -> Result<(), HalaGeometryError> {
    let stride = layout.stride();
    let num_vertices = batch.num_vertices as usize;

    calc_tangents(&mut batch.vertices, num_vertices, layout, &batch.indices);

    for primitive in batch.primitives.iter() {
      let start = primitive.start_index as usize;
      let end = start + primitive.num_indices as usize;
      HalaMeshOptimizer::optimize_vertex_cache(&mut batch.indices[start..end], num_vertices);
    }

    let new_count = HalaMeshOptimizer::optimize_vertex_fetch(&mut batch.vertices, &mut batch.indices, num_vertices, stride);
    if new_count != num_vertices {
      log::debug!("Vertex fetch optimization of \"{}\" dropped {} vertices.", batch.material, num_vertices - new_count);
    }
    batch.num_vertices = new_count as u32;

    Self::update_primitive_vertex_ranges(batch);

    // The index codec may rotate triangle corners, store the rotation it decodes to.
    if compress && !batch.indices.is_empty() {
      let encoded = HalaMeshOptimizer::encode_index_buffer(&batch.indices, new_count)?;
      batch.indices = HalaMeshOptimizer::decode_index_buffer(&encoded, batch.indices.len())?;
    }
    Ok(())
  }

  /// After vertex fetch optimization vertices are numbered by first use,
  /// so the vertices first used by each primitive form one contiguous run.
  /// param batch: The batch.
  fn update_primitive_vertex_ranges(batch: &mut HalaBatch) {
    let mut high_water = 0u32;
    for primitive in batch.primitives.iter_mut() {
      let start = primitive.start_index as usize;
      let end = start + primitive.num_indices as usize;
      let end_vertex = batch.indices[start..end].iter()
        .map(|&index| index as u32 + 1)
        .max()
        .unwrap_or(0)
        .max(high_water);
      primitive.start_vertex = high_water;
      primitive.num_vertices = end_vertex - high_water;
      high_water = end_vertex;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::batch::HalaPrimitive;
  use crate::geometry::layout::HalaLayoutFlags;

  fn position_batch(points: &[[f32; 3]], indices: &[u16], primitives: Vec<HalaPrimitive>) -> HalaBatch {
    HalaBatch {
      material: "m".to_string(),
      vertices: points.iter().flatten().flat_map(|v| v.to_le_bytes()).collect(),
      num_vertices: points.len() as u32,
      indices: indices.to_vec(),
      primitives,
      num_conflicts: 0,
    }
  }

  #[test]
  fn ranges_follow_first_use_order() {
    let layout = HalaVertexLayout::build(&HalaLayoutFlags::default());
    let points = [
      [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
      [1.0, 1.0, 0.0], [2.0, 0.0, 0.0],
    ];
    let primitives = vec![
      HalaPrimitive { name: "a".into(), start_vertex: 0, num_vertices: 3, start_index: 0, num_indices: 3 },
      HalaPrimitive { name: "b".into(), start_vertex: 3, num_vertices: 2, start_index: 3, num_indices: 6 },
    ];
    let mut batch = position_batch(&points, &[0, 1, 2, 1, 3, 2, 1, 4, 3], primitives);
    HalaPostProcessor::process(&mut batch, &layout, false).unwrap();

    assert_eq!(batch.num_vertices, 5);
    batch.validate(layout.stride()).unwrap();
    assert_eq!((batch.primitives[0].start_vertex, batch.primitives[0].num_vertices), (0, 3));
    assert_eq!((batch.primitives[1].start_vertex, batch.primitives[1].num_vertices), (3, 2));
  }

  #[test]
  fn unused_vertices_are_dropped() {
    let layout = HalaVertexLayout::build(&HalaLayoutFlags::default());
    let points = [[0.0, 0.0, 0.0], [9.0, 9.0, 9.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let primitives = vec![
      HalaPrimitive { name: "a".into(), start_vertex: 0, num_vertices: 4, start_index: 0, num_indices: 3 },
    ];
    let mut batch = position_batch(&points, &[0, 2, 3], primitives);
    HalaPostProcessor::process(&mut batch, &layout, false).unwrap();
    assert_eq!(batch.num_vertices, 3);
    assert_eq!(batch.vertices.len(), 36);
    batch.validate(layout.stride()).unwrap();
  }

  #[test]
  fn compressed_indices_keep_their_triangles() {
    let layout = HalaVertexLayout::build(&HalaLayoutFlags::default());
    let points = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
    let primitives = vec![
      HalaPrimitive { name: "a".into(), start_vertex: 0, num_vertices: 4, start_index: 0, num_indices: 6 },
    ];
    let mut batch = position_batch(&points, &[0, 1, 2, 1, 3, 2], primitives);
    HalaPostProcessor::process(&mut batch, &layout, true).unwrap();
    assert_eq!(batch.indices.len(), 6);
    batch.validate(layout.stride()).unwrap();
    assert_eq!(batch.primitives[0].num_indices, 6);
  }
}
