pub mod soup;
pub mod layout;
pub mod hash;
pub mod weld;
pub mod batch;
pub mod splitter;
pub mod tangent;
pub mod bounds;
pub mod optimizer;
pub mod postprocess;

pub use soup::{
  HalaVertexAttributeIndex,
  HalaTriangle,
  HalaGroup,
  HalaTriangleSoup,
};
pub use layout::{
  HalaAttribute,
  HalaAttributeType,
  HalaAttributeDesc,
  HalaLayoutFlags,
  HalaVertexLayout,
};
pub use weld::HalaWeldTable;
pub use batch::{
  HalaBatch,
  HalaPrimitive,
};
pub use splitter::{
  HalaBatchSink,
  HalaSplitter,
};
pub use bounds::HalaBoundingVolumes;
pub use optimizer::HalaMeshOptimizer;
pub use postprocess::HalaPostProcessor;
