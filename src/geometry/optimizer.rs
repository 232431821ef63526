use std::os::raw::{
  c_uint,
  c_void,
};

use meshopt::ffi;

use crate::error::HalaGeometryError;

/// Vertex cache, vertex fetch and stream compression, backed by meshoptimizer.
/// The vertex stride is only known at runtime, so the byte-level entry points
/// of meshoptimizer are called directly.
pub struct HalaMeshOptimizer;

/// The implementation of the mesh optimizer.
impl HalaMeshOptimizer {
  /// Reorder triangles for the post-transform vertex cache.
  /// The index count and the set of referenced vertices are unchanged.
  /// param indices: The indices of one primitive.
  /// param vertex_count: The number of vertices the indices refer to.
  pub fn optimize_vertex_cache(indices: &mut [u16], vertex_count: usize) {
    if indices.is_empty() {
      return;
    }
    let wide = indices.iter().map(|&index| index as u32).collect::<Vec<_>>();
    let optimized = meshopt::optimize_vertex_cache(&wide, vertex_count);
    for (index, optimized) in indices.iter_mut().zip(optimized) {
      *index = optimized as u16;
    }
  }

  /// Reorder vertices in first-use order and rewrite the indices to match.
  /// Unreferenced vertices are dropped.
  /// param vertices: The packed vertices, rewritten in place.
  /// param indices: The indices, rewritten in place.
  /// param vertex_count: The number of vertices.
  /// param stride: The vertex stride.
  /// return: The new vertex count.
  pub fn optimize_vertex_fetch(vertices: &mut Vec<u8>, indices: &mut [u16], vertex_count: usize, stride: usize) -> usize {
    if vertex_count == 0 || indices.is_empty() {
      return 0;
    }
    let mut wide = indices.iter().map(|&index| index as u32).collect::<Vec<_>>();
    let mut destination = vec![0u8; vertex_count * stride];
    let new_count = unsafe {
      ffi::meshopt_optimizeVertexFetch(
        destination.as_mut_ptr() as *mut c_void,
        wide.as_mut_ptr() as *mut c_uint,
        wide.len(),
        vertices.as_ptr() as *const c_void,
        vertex_count,
        stride,
      )
    };
    destination.truncate(new_count * stride);
    *vertices = destination;
    for (index, remapped) in indices.iter_mut().zip(wide) {
      *index = remapped as u16;
    }
    new_count
  }

  /// Compress a vertex stream.
  /// param vertices: The packed vertices.
  /// param vertex_count: The number of vertices.
  /// param stride: The vertex stride, a multiple of 4 up to 256.
  /// return: The compressed bytes.
  pub fn encode_vertex_buffer(vertices: &[u8], vertex_count: usize, stride: usize) -> Result<Vec<u8>, HalaGeometryError> {
    if stride == 0 || stride > 256 || stride % 4 != 0 || vertices.len() < vertex_count * stride {
      return Err(HalaGeometryError::internal(&format!("Cannot encode vertices with stride {}.", stride)));
    }
    let bound = unsafe { ffi::meshopt_encodeVertexBufferBound(vertex_count, stride) };
    let mut encoded = vec![0u8; bound];
    let size = unsafe {
      ffi::meshopt_encodeVertexBuffer(
        encoded.as_mut_ptr(),
        encoded.len(),
        vertices.as_ptr() as *const c_void,
        vertex_count,
        stride,
      )
    };
    if size == 0 {
      return Err(HalaGeometryError::internal("Encode vertex buffer failed."));
    }
    encoded.truncate(size);
    Ok(encoded)
  }

  /// Compress a triangle list index stream.
  /// param indices: The indices, a multiple of 3.
  /// param vertex_count: The number of vertices.
  /// return: The compressed bytes.
  pub fn encode_index_buffer(indices: &[u16], vertex_count: usize) -> Result<Vec<u8>, HalaGeometryError> {
    if indices.len() % 3 != 0 {
      return Err(HalaGeometryError::internal(&format!("Cannot encode {} indices, not a triangle list.", indices.len())));
    }
    let wide = indices.iter().map(|&index| index as u32).collect::<Vec<_>>();
    let bound = unsafe { ffi::meshopt_encodeIndexBufferBound(wide.len(), vertex_count) };
    let mut encoded = vec![0u8; bound];
    let size = unsafe {
      ffi::meshopt_encodeIndexBuffer(
        encoded.as_mut_ptr(),
        encoded.len(),
        wide.as_ptr() as *const c_uint,
        wide.len(),
      )
    };
    if size == 0 {
      return Err(HalaGeometryError::internal("Encode index buffer failed."));
    }
    encoded.truncate(size);
    Ok(encoded)
  }

  /// Decompress a vertex stream.
  /// param encoded: The compressed bytes.
  /// param vertex_count: The number of vertices.
  /// param stride: The vertex stride.
  /// return: The packed vertices.
  pub fn decode_vertex_buffer(encoded: &[u8], vertex_count: usize, stride: usize) -> Result<Vec<u8>, HalaGeometryError> {
    let mut vertices = vec![0u8; vertex_count * stride];
    let result = unsafe {
      ffi::meshopt_decodeVertexBuffer(
        vertices.as_mut_ptr() as *mut c_void,
        vertex_count,
        stride,
        encoded.as_ptr(),
        encoded.len(),
      )
    };
    if result != 0 {
      return Err(HalaGeometryError::input(&format!("Decode vertex buffer failed with {}.", result)));
    }
    Ok(vertices)
  }

  /// Decompress a triangle list index stream into 16-bit indices.
  /// param encoded: The compressed bytes.
  /// param index_count: The number of indices.
  /// return: The indices.
  pub fn decode_index_buffer(encoded: &[u8], index_count: usize) -> Result<Vec<u16>, HalaGeometryError> {
    let mut indices = vec![0u16; index_count];
    let result = unsafe {
      ffi::meshopt_decodeIndexBuffer(
        indices.as_mut_ptr() as *mut c_void,
        index_count,
        std::mem::size_of::<u16>(),
        encoded.as_ptr(),
        encoded.len(),
      )
    };
    if result != 0 {
      return Err(HalaGeometryError::input(&format!("Decode index buffer failed with {}.", result)));
    }
    Ok(indices)
  }
}
