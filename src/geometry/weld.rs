use crate::error::HalaGeometryError;
use super::batch::{
  HalaBatch,
  MAX_BATCH_VERTICES,
};
use super::hash::murmur2a;
use super::soup::HalaVertexAttributeIndex;

/// Number of slots in the weld table, a power of two.
pub const WELD_TABLE_CAPACITY: usize = 1 << 17;

const _: () = assert!(WELD_TABLE_CAPACITY.is_power_of_two());
const _: () = assert!(WELD_TABLE_CAPACITY > MAX_BATCH_VERTICES);

const EMPTY_SLOT: u32 = u32::MAX;

/// The result of welding one face corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalaWeldResult {
  pub index: u16,
  pub is_new: bool,
  /// A different source corner produced the same bytes before.
  pub conflict: bool,
}

/// Open-addressing hash table from packed vertex bytes to the batch's vertex index.
pub struct HalaWeldTable {
  slots: Box<[u32]>,
  /// Source corner of each welded vertex, by vertex index.
  sources: Vec<HalaVertexAttributeIndex>,
}

impl Default for HalaWeldTable {
  fn default() -> Self {
    Self::new()
  }
}

/// The implementation of the weld table.
impl HalaWeldTable {
  pub fn new() -> Self {
    Self {
      slots: vec![EMPTY_SLOT; WELD_TABLE_CAPACITY].into_boxed_slice(),
      sources: Vec::new(),
    }
  }

  /// Empty the table without reallocating.
  pub fn reset(&mut self) {
    self.slots.fill(EMPTY_SLOT);
    self.sources.clear();
  }

  pub fn len(&self) -> usize {
    self.sources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sources.is_empty()
  }

  /// Find or insert a packed vertex.
  /// New vertices are appended to the batch's vertex buffer.
  /// param batch: The batch that owns the vertex buffer.
  /// param source: The face corner the bytes were packed from.
  /// param packed: The packed vertex, exactly one stride long.
  /// return: The welded vertex index.
  pub fn resolve(
    &mut self,
    batch: &mut HalaBatch,
    source: &HalaVertexAttributeIndex,
    packed: &[u8],
  ) -> Result<HalaWeldResult, HalaGeometryError> {
    let stride = packed.len();
    let mask = WELD_TABLE_CAPACITY - 1;
    let mut bucket = murmur2a(packed) as usize & mask;

    for probe in 0..WELD_TABLE_CAPACITY {
      let item = self.slots[bucket];

      if item == EMPTY_SLOT {
        if batch.num_vertices as usize >= MAX_BATCH_VERTICES {
          return Err(HalaGeometryError::internal(&format!(
            "Batch \"{}\" is full, cannot weld more than {} vertices.", batch.material, MAX_BATCH_VERTICES)));
        }
        let index = batch.num_vertices;
        batch.vertices.extend_from_slice(packed);
        batch.num_vertices += 1;
        self.slots[bucket] = index;
        self.sources.push(*source);
        return Ok(HalaWeldResult {
          index: index as u16,
          is_new: true,
          conflict: false,
        });
      }

      let offset = item as usize * stride;
      if &batch.vertices[offset..offset + stride] == packed {
        let conflict = self.sources[item as usize] != *source;
        if conflict {
          batch.num_conflicts += 1;
        }
        return Ok(HalaWeldResult {
          index: item as u16,
          is_new: false,
          conflict,
        });
      }

      // Hash collision, quadratic probing.
      bucket = (bucket + probe + 1) & mask;
    }

    Err(HalaGeometryError::internal(&format!(
      "Weld table saturated after probing {} slots.", WELD_TABLE_CAPACITY)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pack_position(p: [f32; 3]) -> Vec<u8> {
    p.iter().flat_map(|v| v.to_le_bytes()).collect()
  }

  #[test]
  fn same_bytes_weld_to_same_index() {
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let source = HalaVertexAttributeIndex::new(0, None, None);
    let a = table.resolve(&mut batch, &source, &pack_position([1.0, 2.0, 3.0])).unwrap();
    let b = table.resolve(&mut batch, &source, &pack_position([4.0, 5.0, 6.0])).unwrap();
    let c = table.resolve(&mut batch, &source, &pack_position([1.0, 2.0, 3.0])).unwrap();
    assert!(a.is_new && b.is_new && !c.is_new);
    assert_eq!(a.index, c.index);
    assert_ne!(a.index, b.index);
    assert_eq!(batch.num_vertices, 2);
    assert_eq!(batch.vertices.len(), 24);
  }

  #[test]
  fn exact_bytes_only() {
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let source = HalaVertexAttributeIndex::new(0, None, None);
    table.resolve(&mut batch, &source, &pack_position([0.0, 0.0, 0.0])).unwrap();
    let negative_zero = table.resolve(&mut batch, &source, &pack_position([-0.0, 0.0, 0.0])).unwrap();
    let nearly = table.resolve(&mut batch, &source, &pack_position([f32::EPSILON, 0.0, 0.0])).unwrap();
    assert!(negative_zero.is_new);
    assert!(nearly.is_new);
  }

  #[test]
  fn cube_welds_to_eight_vertices() {
    let corners = [
      [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
      [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0],
    ];
    let faces: [[u32; 3]; 12] = [
      [0, 1, 2], [0, 2, 3], [4, 6, 5], [4, 7, 6],
      [0, 4, 5], [0, 5, 1], [1, 5, 6], [1, 6, 2],
      [2, 6, 7], [2, 7, 3], [3, 7, 4], [3, 4, 0],
    ];
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let mut conflicts = 0;
    for face in faces.iter() {
      for &corner in face.iter() {
        let source = HalaVertexAttributeIndex::new(corner, None, None);
        let result = table.resolve(&mut batch, &source, &pack_position(corners[corner as usize])).unwrap();
        conflicts += result.conflict as u32;
        batch.indices.push(result.index);
      }
    }
    assert_eq!(batch.num_vertices, 8);
    assert_eq!(batch.indices.len(), 36);
    assert_eq!(conflicts, 0);
    assert_eq!(batch.num_conflicts, 0);
  }

  #[test]
  fn distinct_sources_with_equal_bytes_conflict() {
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let bytes = pack_position([1.0, 1.0, 1.0]);
    table.resolve(&mut batch, &HalaVertexAttributeIndex::new(0, None, None), &bytes).unwrap();
    let result = table.resolve(&mut batch, &HalaVertexAttributeIndex::new(5, None, None), &bytes).unwrap();
    assert!(!result.is_new);
    assert!(result.conflict);
    assert_eq!(batch.num_conflicts, 1);
  }

  #[test]
  fn unique_count_matches_distinct_patterns() {
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let source = HalaVertexAttributeIndex::default();
    for i in 0..5000u32 {
      let value = (i % 1234) as f32;
      table.resolve(&mut batch, &source, &pack_position([value, 0.0, 0.0])).unwrap();
    }
    assert_eq!(batch.num_vertices, 1234);
    assert_eq!(table.len(), 1234);
  }

  #[test]
  fn full_batch_is_internal_error() {
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let source = HalaVertexAttributeIndex::default();
    for i in 0..MAX_BATCH_VERTICES as u32 {
      table.resolve(&mut batch, &source, &i.to_le_bytes()).unwrap();
    }
    let err = table.resolve(&mut batch, &source, &u32::MAX.to_le_bytes()).unwrap_err();
    assert_eq!(err.kind(), crate::error::HalaGeometryErrorKind::Internal);
  }

  #[test]
  fn reset_forgets_vertices() {
    let mut table = HalaWeldTable::new();
    let mut batch = HalaBatch::default();
    let source = HalaVertexAttributeIndex::default();
    table.resolve(&mut batch, &source, &pack_position([1.0, 0.0, 0.0])).unwrap();
    table.reset();
    batch.reset("");
    let result = table.resolve(&mut batch, &source, &pack_position([1.0, 0.0, 0.0])).unwrap();
    assert!(result.is_new);
    assert_eq!(result.index, 0);
  }
}
