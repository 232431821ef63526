pub mod obj_loader;
pub mod gltf_loader;

use std::path::Path;

use crate::error::HalaGeometryError;
use crate::geometry::HalaTriangleSoup;

pub use obj_loader::HalaObjLoader;
pub use gltf_loader::HalaGltfLoader;

/// The supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalaSourceFormat {
  Obj,
  Gltf,
}

/// The implementation of the source format.
impl HalaSourceFormat {
  /// Detect the source format from the file extension.
  /// param path: The source file path.
  /// return: The source format.
  pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, HalaGeometryError> {
    let path = path.as_ref();
    let ext = path.extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.to_ascii_lowercase())
      .unwrap_or_default();
    match ext.as_str() {
      "obj" => Ok(Self::Obj),
      "gltf" | "glb" => Ok(Self::Gltf),
      _ => Err(HalaGeometryError::input(&format!("Unsupported source file \"{:?}\", expected .obj, .gltf or .glb.", path))),
    }
  }
}

/// Loads any supported source file into a triangle soup.
pub struct HalaSoupLoader;

/// The implementation of the soup loader.
impl HalaSoupLoader {
  /// Load the source file.
  /// param path: The source file path.
  /// param barycentric: Whether to assign barycentric corner ids.
  /// return: The triangle soup.
  pub fn load<P: AsRef<Path>>(path: P, barycentric: bool) -> Result<HalaTriangleSoup, HalaGeometryError> {
    let path = path.as_ref();
    let format = HalaSourceFormat::from_path(path)?;
    log::debug!("Loading {:?} source \"{:?}\".", format, path);
    match format {
      HalaSourceFormat::Obj => HalaObjLoader::new(barycentric).load(path),
      HalaSourceFormat::Gltf => HalaGltfLoader::load(path, barycentric),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::HalaGeometryErrorKind;

  #[test]
  fn format_from_extension() {
    assert_eq!(HalaSourceFormat::from_path("a/b/mesh.obj").unwrap(), HalaSourceFormat::Obj);
    assert_eq!(HalaSourceFormat::from_path("scene.GLTF").unwrap(), HalaSourceFormat::Gltf);
    assert_eq!(HalaSourceFormat::from_path("scene.glb").unwrap(), HalaSourceFormat::Gltf);
    let err = HalaSourceFormat::from_path("mesh.fbx").unwrap_err();
    assert_eq!(err.kind(), HalaGeometryErrorKind::Input);
    assert!(HalaSourceFormat::from_path("noext").is_err());
  }
}
