use std::path::Path;

use glam::{
  Mat4,
  Vec3,
};

use crate::error::HalaGeometryError;
use crate::geometry::{
  HalaAttribute,
  HalaAttributeDesc,
  HalaAttributeType,
  HalaBoundingVolumes,
  HalaMeshOptimizer,
  HalaPrimitive,
  HalaVertexLayout,
};
use crate::geometry::bounds::{
  HalaAabb,
  HalaObb,
  HalaSphere,
};
use super::{
  magic_to_string,
  HalaChunkMagic,
  CHUNK_HEADER_SIZE,
  CHUNK_MAGIC_VB,
  CHUNK_MAGIC_VBC,
  CHUNK_MAGIC_IB,
  CHUNK_MAGIC_IBC,
  CHUNK_MAGIC_PRI,
};

/// Little-endian payload parser.
struct HalaPayloadReader<'a> {
  data: &'a [u8],
  pos: usize,
  chunk: HalaChunkMagic,
}

impl<'a> HalaPayloadReader<'a> {
  fn new(data: &'a [u8], chunk: HalaChunkMagic) -> Self {
    Self {
      data,
      pos: 0,
      chunk,
    }
  }

  fn take(&mut self, len: usize) -> Result<&'a [u8], HalaGeometryError> {
    if self.data.len() - self.pos < len {
      return Err(HalaGeometryError::input(&format!(
        "Chunk \"{}\" is truncated at byte {}.", magic_to_string(&self.chunk), self.pos)));
    }
    let bytes = &self.data[self.pos..self.pos + len];
    self.pos += len;
    Ok(bytes)
  }

  fn get_u8(&mut self) -> Result<u8, HalaGeometryError> {
    Ok(self.take(1)?[0])
  }

  fn get_u16(&mut self) -> Result<u16, HalaGeometryError> {
    let bytes = self.take(2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
  }

  fn get_u32(&mut self) -> Result<u32, HalaGeometryError> {
    let bytes = self.take(4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
  }

  fn get_f32(&mut self) -> Result<f32, HalaGeometryError> {
    Ok(f32::from_bits(self.get_u32()?))
  }

  fn get_vec3(&mut self) -> Result<Vec3, HalaGeometryError> {
    Ok(Vec3::new(self.get_f32()?, self.get_f32()?, self.get_f32()?))
  }

  fn get_string(&mut self) -> Result<String, HalaGeometryError> {
    let len = self.get_u16()? as usize;
    let bytes = self.take(len)?;
    String::from_utf8(bytes.to_vec())
      .map_err(|err| HalaGeometryError::new(crate::error::HalaGeometryErrorKind::Input, "Chunk string is not UTF-8.", Some(Box::new(err))))
  }

  fn get_bounds(&mut self) -> Result<HalaBoundingVolumes, HalaGeometryError> {
    let sphere = HalaSphere {
      center: self.get_vec3()?,
      radius: self.get_f32()?,
    };
    let aabb = HalaAabb::new(self.get_vec3()?, self.get_vec3()?);
    let mut cols = [0f32; 16];
    for value in cols.iter_mut() {
      *value = self.get_f32()?;
    }
    Ok(HalaBoundingVolumes {
      sphere,
      aabb,
      obb: HalaObb { mtx: Mat4::from_cols_array(&cols) },
    })
  }

  fn get_layout(&mut self) -> Result<HalaVertexLayout, HalaGeometryError> {
    let num_attributes = self.get_u8()?;
    let stride = self.get_u16()?;
    let mut attributes = Vec::with_capacity(num_attributes as usize);
    for _ in 0..num_attributes {
      let offset = self.get_u16()?;
      let attribute_id = self.get_u16()?;
      let num = self.get_u8()?;
      let type_id = self.get_u16()?;
      let normalized = self.get_u8()? != 0;
      let as_int = self.get_u8()? != 0;
      let attribute = HalaAttribute::from_id(attribute_id)
        .ok_or(HalaGeometryError::input(&format!("Unknown vertex attribute id {:#06x}.", attribute_id)))?;
      let ty = HalaAttributeType::from_id(type_id)
        .ok_or(HalaGeometryError::input(&format!("Unknown vertex attribute type id {:#06x}.", type_id)))?;
      attributes.push(HalaAttributeDesc {
        attribute,
        num,
        ty,
        normalized,
        as_int,
        offset,
      });
    }
    Ok(HalaVertexLayout {
      attributes,
      stride,
    })
  }
}

/// One raw chunk.
#[derive(Debug, Clone, Copy)]
pub struct HalaChunk<'a> {
  pub magic: HalaChunkMagic,
  pub payload: &'a [u8],
}

/// A primitive read back from a primitive chunk.
#[derive(Debug, Clone)]
pub struct HalaDecodedPrimitive {
  pub primitive: HalaPrimitive,
  pub bounds: HalaBoundingVolumes,
  pub vertices: Vec<u8>,
}

/// A batch read back from its vertex, index and primitive chunks.
#[derive(Debug, Clone, Default)]
pub struct HalaDecodedBatch {
  pub compressed: bool,
  pub bounds: HalaBoundingVolumes,
  pub layout: HalaVertexLayout,
  pub num_vertices: u32,
  pub vertices: Vec<u8>,
  pub indices: Vec<u16>,
  pub material: String,
  pub primitives: Vec<HalaDecodedPrimitive>,
}

/// Reads the chunks of a compiled geometry file.
pub struct HalaChunkReader<'a> {
  data: &'a [u8],
  pos: usize,
}

/// The implementation of the chunk reader.
impl<'a> HalaChunkReader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self {
      data,
      pos: 0,
    }
  }

  /// Read a whole geometry file into memory.
  /// param path: The file path.
  /// return: The file bytes.
  pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, HalaGeometryError> {
    let path = path.as_ref();
    std::fs::read(path)
      .map_err(|err| HalaGeometryError::io(&format!("Read geometry file \"{:?}\" failed.", path), err))
  }

  /// Read the next chunk.
  /// return: The chunk, None at the end of the data.
  pub fn next_chunk(&mut self) -> Result<Option<HalaChunk<'a>>, HalaGeometryError> {
    let remaining = self.data.len() - self.pos;
    if remaining == 0 {
      return Ok(None);
    }
    if remaining < CHUNK_HEADER_SIZE {
      return Err(HalaGeometryError::input(&format!("Truncated chunk header at byte {}.", self.pos)));
    }
    let header = &self.data[self.pos..self.pos + CHUNK_HEADER_SIZE];
    let magic = [header[0], header[1], header[2], header[3]];
    let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let start = self.pos + CHUNK_HEADER_SIZE;
    if self.data.len() - start < size {
      return Err(HalaGeometryError::input(&format!(
        "Chunk \"{}\" at byte {} claims {} bytes past the end.", magic_to_string(&magic), self.pos, size)));
    }
    self.pos = start + size;
    Ok(Some(HalaChunk {
      magic,
      payload: &self.data[start..start + size],
    }))
  }

  /// Decode every batch, skipping chunks of unknown type.
  /// return: The batches in file order.
  pub fn read_batches(&mut self) -> Result<Vec<HalaDecodedBatch>, HalaGeometryError> {
    let mut batches = Vec::new();
    let mut current: Option<HalaDecodedBatch> = None;

    while let Some(chunk) = self.next_chunk()? {
      match chunk.magic {
        CHUNK_MAGIC_VB | CHUNK_MAGIC_VBC => {
          if current.is_some() {
            return Err(HalaGeometryError::input("Vertex chunk without a primitive chunk before it."));
          }
          current = Some(Self::decode_vertices(&chunk)?);
        },
        CHUNK_MAGIC_IB | CHUNK_MAGIC_IBC => {
          let batch = current.as_mut()
            .ok_or(HalaGeometryError::input("Index chunk without a vertex chunk."))?;
          batch.indices = Self::decode_indices(&chunk, batch.num_vertices)?;
        },
        CHUNK_MAGIC_PRI => {
          let mut batch = current.take()
            .ok_or(HalaGeometryError::input("Primitive chunk without a vertex chunk."))?;
          Self::decode_primitives(&chunk, &mut batch)?;
          batches.push(batch);
        },
        magic => {
          log::debug!("Skipping unknown chunk \"{}\" of {} bytes.", magic_to_string(&magic), chunk.payload.len());
        },
      }
    }

    if current.is_some() {
      return Err(HalaGeometryError::input("The last batch has no primitive chunk."));
    }
    Ok(batches)
  }

  fn decode_vertices(chunk: &HalaChunk<'a>) -> Result<HalaDecodedBatch, HalaGeometryError> {
    let mut reader = HalaPayloadReader::new(chunk.payload, chunk.magic);
    let bounds = reader.get_bounds()?;
    let layout = reader.get_layout()?;
    let num_vertices = reader.get_u16()? as u32;
    let stride = layout.stride();
    let compressed = chunk.magic == CHUNK_MAGIC_VBC;
    let vertices = if compressed {
      let size = reader.get_u32()? as usize;
      let encoded = reader.take(size)?;
      HalaMeshOptimizer::decode_vertex_buffer(encoded, num_vertices as usize, stride)?
    } else {
      reader.take(num_vertices as usize * stride)?.to_vec()
    };
    Ok(HalaDecodedBatch {
      compressed,
      bounds,
      layout,
      num_vertices,
      vertices,
      ..Default::default()
    })
  }

  fn decode_indices(chunk: &HalaChunk<'a>, num_vertices: u32) -> Result<Vec<u16>, HalaGeometryError> {
    let mut reader = HalaPayloadReader::new(chunk.payload, chunk.magic);
    let num_indices = reader.get_u32()? as usize;
    let indices = if chunk.magic == CHUNK_MAGIC_IBC {
      let size = reader.get_u32()? as usize;
      let encoded = reader.take(size)?;
      HalaMeshOptimizer::decode_index_buffer(encoded, num_indices)?
    } else {
      let mut indices = Vec::with_capacity(num_indices);
      for _ in 0..num_indices {
        indices.push(reader.get_u16()?);
      }
      indices
    };
    if let Some(index) = indices.iter().find(|&&index| index as u32 >= num_vertices) {
      return Err(HalaGeometryError::input(&format!("Index {} is out of {} vertices.", index, num_vertices)));
    }
    Ok(indices)
  }

  fn decode_primitives(chunk: &HalaChunk<'a>, batch: &mut HalaDecodedBatch) -> Result<(), HalaGeometryError> {
    let mut reader = HalaPayloadReader::new(chunk.payload, chunk.magic);
    let stride = batch.layout.stride();
    batch.material = reader.get_string()?;
    let num_primitives = reader.get_u16()?;
    for _ in 0..num_primitives {
      let name = reader.get_string()?;
      let start_index = reader.get_u32()?;
      let num_indices = reader.get_u32()?;
      let start_vertex = reader.get_u32()?;
      let num_vertices = reader.get_u32()?;
      let bounds = reader.get_bounds()?;
      let vertices = reader.take(num_vertices as usize * stride)?.to_vec();
      batch.primitives.push(HalaDecodedPrimitive {
        primitive: HalaPrimitive {
          name,
          start_vertex,
          num_vertices,
          start_index,
          num_indices,
        },
        bounds,
        vertices,
      });
    }
    Ok(())
  }
}
