use crate::error::HalaGeometryError;

/// Most vertices one batch can hold, indices are 16-bit.
pub const MAX_BATCH_VERTICES: usize = u16::MAX as usize;

/// Vertex count at which the current batch is flushed before the next triangle.
/// Leaves room for three more unique vertices.
pub const BATCH_FLUSH_THRESHOLD: usize = MAX_BATCH_VERTICES - 2;

/// A named sub-range of a batch's vertex and index buffers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HalaPrimitive {
  pub name: String,
  pub start_vertex: u32,
  pub num_vertices: u32,
  pub start_index: u32,
  pub num_indices: u32,
}

/// The vertex and index buffers accumulated between two flushes.
#[derive(Debug, Default, Clone)]
pub struct HalaBatch {
  pub material: String,
  pub vertices: Vec<u8>,
  pub num_vertices: u32,
  pub indices: Vec<u16>,
  pub primitives: Vec<HalaPrimitive>,
  /// Welded corners whose source indices differed from the stored vertex's.
  pub num_conflicts: u32,
}

/// The implementation of the batch.
impl HalaBatch {
  /// Clear all accumulated data, keeping the allocations.
  /// param material: The material of the next batch.
  pub fn reset(&mut self, material: &str) {
    self.material.clear();
    self.material.push_str(material);
    self.vertices.clear();
    self.num_vertices = 0;
    self.indices.clear();
    self.primitives.clear();
    self.num_conflicts = 0;
  }

  pub fn num_indices(&self) -> u32 {
    self.indices.len() as u32
  }

  pub fn is_empty(&self) -> bool {
    self.num_vertices == 0
  }

  /// Get the bytes of a vertex range.
  /// param stride: The vertex stride.
  /// param start: The first vertex.
  /// param count: The number of vertices.
  /// return: The bytes.
  pub fn vertex_range(&self, stride: usize, start: u32, count: u32) -> &[u8] {
    let begin = start as usize * stride;
    let end = begin + count as usize * stride;
    &self.vertices[begin..end]
  }

  /// Check the batch is ready to be written.
  /// return: An internal error if the batch breaks the 16-bit index space or its own ranges.
  pub fn validate(&self, stride: usize) -> Result<(), HalaGeometryError> {
    if self.num_vertices as usize > MAX_BATCH_VERTICES {
      return Err(HalaGeometryError::internal(&format!(
        "Batch \"{}\" holds {} vertices, more than {}.", self.material, self.num_vertices, MAX_BATCH_VERTICES)));
    }
    if self.vertices.len() < self.num_vertices as usize * stride {
      return Err(HalaGeometryError::internal(&format!(
        "Batch \"{}\" vertex buffer is shorter than {} vertices.", self.material, self.num_vertices)));
    }
    if let Some(index) = self.indices.iter().find(|&&index| index as u32 >= self.num_vertices) {
      return Err(HalaGeometryError::internal(&format!(
        "Batch \"{}\" index {} is out of {} vertices.", self.material, index, self.num_vertices)));
    }
    for primitive in self.primitives.iter() {
      if primitive.start_index + primitive.num_indices > self.num_indices()
        || primitive.start_vertex + primitive.num_vertices > self.num_vertices {
        return Err(HalaGeometryError::internal(&format!(
          "Primitive \"{}\" of batch \"{}\" is out of range.", primitive.name, self.material)));
      }
    }
    Ok(())
  }
}
