use std::io::Write;

use glam::Vec3;

use crate::error::HalaGeometryError;
use crate::geometry::{
  HalaBatch,
  HalaBoundingVolumes,
  HalaMeshOptimizer,
  HalaVertexLayout,
};
use super::{
  HalaChunkMagic,
  CHUNK_MAGIC_VB,
  CHUNK_MAGIC_VBC,
  CHUNK_MAGIC_IB,
  CHUNK_MAGIC_IBC,
  CHUNK_MAGIC_PRI,
};

/// Little-endian payload builder.
#[derive(Default)]
struct HalaPayload {
  data: Vec<u8>,
}

impl HalaPayload {
  fn put_u8(&mut self, value: u8) {
    self.data.push(value);
  }

  fn put_u16(&mut self, value: u16) {
    self.data.extend_from_slice(&value.to_le_bytes());
  }

  fn put_u32(&mut self, value: u32) {
    self.data.extend_from_slice(&value.to_le_bytes());
  }

  fn put_f32(&mut self, value: f32) {
    self.data.extend_from_slice(&value.to_le_bytes());
  }

  fn put_vec3(&mut self, value: Vec3) {
    self.put_f32(value.x);
    self.put_f32(value.y);
    self.put_f32(value.z);
  }

  fn put_bytes(&mut self, value: &[u8]) {
    self.data.extend_from_slice(value);
  }

  fn put_string(&mut self, value: &str) -> Result<(), HalaGeometryError> {
    let len = u16::try_from(value.len())
      .map_err(|_| HalaGeometryError::input(&format!("Name \"{}...\" is longer than {} bytes.", value.chars().take(16).collect::<String>(), u16::MAX)))?;
    self.put_u16(len);
    self.put_bytes(value.as_bytes());
    Ok(())
  }

  fn put_bounds(&mut self, bounds: &HalaBoundingVolumes) {
    self.put_vec3(bounds.sphere.center);
    self.put_f32(bounds.sphere.radius);
    self.put_vec3(bounds.aabb.min);
    self.put_vec3(bounds.aabb.max);
    for value in bounds.obb.mtx.to_cols_array() {
      self.put_f32(value);
    }
  }

  fn put_layout(&mut self, layout: &HalaVertexLayout) {
    self.put_u8(layout.attributes.len() as u8);
    self.put_u16(layout.stride);
    for desc in layout.attributes.iter() {
      self.put_u16(desc.offset);
      self.put_u16(desc.attribute.to_id());
      self.put_u8(desc.num);
      self.put_u16(desc.ty.to_id());
      self.put_u8(desc.normalized as u8);
      self.put_u8(desc.as_int as u8);
    }
  }
}

/// Append one framed chunk.
/// param output: The output bytes.
/// param magic: The chunk magic.
/// param payload: The chunk payload.
fn frame(output: &mut Vec<u8>, magic: HalaChunkMagic, payload: HalaPayload) -> Result<(), HalaGeometryError> {
  let size = u32::try_from(payload.data.len())
    .map_err(|_| HalaGeometryError::internal("Chunk payload exceeds 4 GiB."))?;
  output.extend_from_slice(&magic);
  output.extend_from_slice(&size.to_le_bytes());
  output.extend_from_slice(&payload.data);
  Ok(())
}

fn ratio(uncompressed: usize, compressed: usize) -> f32 {
  if uncompressed == 0 {
    return 0.0;
  }
  100.0 - compressed as f32 / uncompressed as f32 * 100.0
}

/// Serialize one post-processed batch into its vertex, index and primitive chunks.
/// param batch: The batch.
/// param layout: The vertex layout.
/// param compress: Whether to compress the vertex and index streams.
/// param obb_steps: The OBB search steps.
/// return: The chunk bytes.
pub fn serialize_batch(batch: &HalaBatch, layout: &HalaVertexLayout, compress: bool, obb_steps: u32) -> Result<Vec<u8>, HalaGeometryError> {
  let stride = layout.stride();
  batch.validate(stride)?;
  let num_vertices = batch.num_vertices as usize;
  let vertices = batch.vertex_range(stride, 0, batch.num_vertices);
  let mut output = Vec::new();

  // Vertex chunk.
  let mut payload = HalaPayload::default();
  payload.put_bounds(&HalaBoundingVolumes::compute(vertices, stride, obb_steps));
  payload.put_layout(layout);
  payload.put_u16(batch.num_vertices as u16);
  if compress {
    let encoded = HalaMeshOptimizer::encode_vertex_buffer(vertices, num_vertices, stride)?;
    log::info!("vertices uncompressed: {:10}, compressed: {:10}, ratio: {:.2}%",
      vertices.len(), encoded.len(), ratio(vertices.len(), encoded.len()));
    payload.put_u32(encoded.len() as u32);
    payload.put_bytes(&encoded);
    frame(&mut output, CHUNK_MAGIC_VBC, payload)?;
  } else {
    payload.put_bytes(vertices);
    frame(&mut output, CHUNK_MAGIC_VB, payload)?;
  }

  // Index chunk.
  let mut payload = HalaPayload::default();
  payload.put_u32(batch.num_indices());
  if compress {
    let encoded = HalaMeshOptimizer::encode_index_buffer(&batch.indices, num_vertices)?;
    log::info!("indices uncompressed: {:10}, compressed: {:10}, ratio: {:.2}%",
      batch.indices.len() * 2, encoded.len(), ratio(batch.indices.len() * 2, encoded.len()));
    payload.put_u32(encoded.len() as u32);
    payload.put_bytes(&encoded);
    frame(&mut output, CHUNK_MAGIC_IBC, payload)?;
  } else {
    for index in batch.indices.iter() {
      payload.put_u16(*index);
    }
    frame(&mut output, CHUNK_MAGIC_IB, payload)?;
  }

  // Primitive chunk.
  let mut payload = HalaPayload::default();
  payload.put_string(&batch.material)?;
  let num_primitives = u16::try_from(batch.primitives.len())
    .map_err(|_| HalaGeometryError::internal(&format!("Batch \"{}\" has too many primitives.", batch.material)))?;
  payload.put_u16(num_primitives);
  for primitive in batch.primitives.iter() {
    let primitive_vertices = batch.vertex_range(stride, primitive.start_vertex, primitive.num_vertices);
    payload.put_string(&primitive.name)?;
    payload.put_u32(primitive.start_index);
    payload.put_u32(primitive.num_indices);
    payload.put_u32(primitive.start_vertex);
    payload.put_u32(primitive.num_vertices);
    payload.put_bounds(&HalaBoundingVolumes::compute(primitive_vertices, stride, obb_steps));
    payload.put_bytes(primitive_vertices);
  }
  frame(&mut output, CHUNK_MAGIC_PRI, payload)?;

  Ok(output)
}

/// Appends serialized batches to an output stream.
pub struct HalaChunkWriter<W: Write> {
  writer: W,
  compress: bool,
  obb_steps: u32,
  bytes_written: u64,
}

/// The implementation of the chunk writer.
impl<W: Write> HalaChunkWriter<W> {
  /// Create a new chunk writer.
  /// param writer: The output stream.
  /// param compress: Whether to compress the vertex and index streams.
  /// param obb_steps: The OBB search steps.
  /// return: The chunk writer.
  pub fn new(writer: W, compress: bool, obb_steps: u32) -> Self {
    Self {
      writer,
      compress,
      obb_steps,
      bytes_written: 0,
    }
  }

  pub fn bytes_written(&self) -> u64 {
    self.bytes_written
  }

  /// Serialize and append one batch.
  /// param batch: The post-processed batch.
  /// param layout: The vertex layout.
  pub fn write_batch(&mut self, batch: &HalaBatch, layout: &HalaVertexLayout) -> Result<(), HalaGeometryError> {
    let data = serialize_batch(batch, layout, self.compress, self.obb_steps)?;
    self.write_serialized(&data)
  }

  /// Append already serialized chunks.
  /// param data: The chunk bytes.
  pub fn write_serialized(&mut self, data: &[u8]) -> Result<(), HalaGeometryError> {
    self.writer.write_all(data)
      .map_err(|err| HalaGeometryError::io("Write chunks failed.", err))?;
    self.bytes_written += data.len() as u64;
    Ok(())
  }

  /// Flush and return the output stream.
  pub fn finish(mut self) -> Result<W, HalaGeometryError> {
    self.writer.flush()
      .map_err(|err| HalaGeometryError::io("Flush output failed.", err))?;
    Ok(self.writer)
  }
}
