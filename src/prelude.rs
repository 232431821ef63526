pub use crate::error::{
  HalaGeometryError,
  HalaGeometryErrorKind,
};
pub use crate::config::{
  HalaCompileOptions,
  HalaNormalPacking,
  HalaTexcoordPacking,
};
pub use crate::geometry::{
  HalaTriangleSoup,
  HalaVertexLayout,
  HalaBatch,
  HalaPrimitive,
  HalaBoundingVolumes,
};
pub use crate::chunk::{
  HalaChunkWriter,
  HalaChunkReader,
  HalaDecodedBatch,
  HalaDecodedPrimitive,
};
pub use crate::loader::{
  HalaSourceFormat,
  HalaSoupLoader,
};
pub use crate::compiler::{
  HalaGeometryCompiler,
  HalaCompileStats,
};
