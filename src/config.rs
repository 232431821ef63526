use std::path::Path;

use serde::{
  Deserialize,
  Serialize,
};

use crate::error::{
  HalaGeometryError,
  HalaGeometryErrorKind,
};

pub const DEFAULT_OBB_STEPS: u32 = 17;
pub const MAX_OBB_STEPS: u32 = 90;

/// How normals and tangents are stored in a vertex.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalaNormalPacking {
  /// 3 (normal) or 4 (tangent) 32-bit floats.
  #[default]
  Full,
  /// 4 unsigned bytes, signed-normalized.
  Packed,
}

impl HalaNormalPacking {
  /// Convert the command line packing number.
  /// Unknown numbers fall back to full precision.
  /// param value: The packing number.
  /// return: The packing mode.
  pub fn from_u32(value: u32) -> Self {
    match value {
      0 => Self::Full,
      1 => Self::Packed,
      _ => {
        log::warn!("Unknown normal packing {}, falling back to full precision.", value);
        Self::Full
      },
    }
  }
}

/// How texture coordinates are stored in a vertex.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalaTexcoordPacking {
  /// 2 32-bit floats.
  #[default]
  Full,
  /// 2 16-bit floats.
  Half,
}

impl HalaTexcoordPacking {
  /// Convert the command line packing number.
  /// Unknown numbers fall back to full precision.
  /// param value: The packing number.
  /// return: The packing mode.
  pub fn from_u32(value: u32) -> Self {
    match value {
      0 => Self::Full,
      1 => Self::Half,
      _ => {
        log::warn!("Unknown texture coordinate packing {}, falling back to full precision.", value);
        Self::Full
      },
    }
  }
}

fn default_as_one() -> f32 {
  1.0
}

fn default_obb_steps() -> u32 {
  DEFAULT_OBB_STEPS
}

/// The options of one geometry compile.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HalaCompileOptions {
  #[serde(default = "default_as_one")]
  pub scale: f32,
  #[serde(default)]
  pub ccw: bool,
  #[serde(default)]
  pub flip_v: bool,
  #[serde(default)]
  pub tangent: bool,
  #[serde(default)]
  pub barycentric: bool,
  #[serde(default)]
  pub compress: bool,
  #[serde(default)]
  pub normal_packing: HalaNormalPacking,
  #[serde(default)]
  pub texcoord_packing: HalaTexcoordPacking,
  #[serde(default = "default_obb_steps")]
  pub obb_steps: u32,
  #[serde(default)]
  pub parallel: bool,
}

impl Default for HalaCompileOptions {
  fn default() -> Self {
    Self {
      scale: 1.0,
      ccw: false,
      flip_v: false,
      tangent: false,
      barycentric: false,
      compress: false,
      normal_packing: HalaNormalPacking::Full,
      texcoord_packing: HalaTexcoordPacking::Full,
      obb_steps: DEFAULT_OBB_STEPS,
      parallel: false,
    }
  }
}

/// The implementation of the compile options.
impl HalaCompileOptions {
  /// Load the options from a JSON file.
  /// Missing fields keep their default values.
  /// param path: The path to the JSON file.
  /// return: The options.
  pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, HalaGeometryError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
      .map_err(|err| HalaGeometryError::io(&format!("Read config file \"{:?}\" failed.", path), err))?;
    Self::from_json_str(&text)
  }

  /// Parse the options from a JSON string.
  /// param text: The JSON text.
  /// return: The options.
  pub fn from_json_str(text: &str) -> Result<Self, HalaGeometryError> {
    let options = serde_json::from_str::<HalaCompileOptions>(text)
      .map_err(|err| HalaGeometryError::new(HalaGeometryErrorKind::Input, "Parse config failed.", Some(Box::new(err))))?;
    Ok(options.sanitized())
  }

  /// Clamp the options into their supported ranges.
  /// return: The sanitized options.
  pub fn sanitized(mut self) -> Self {
    let clamped = self.obb_steps.clamp(1, MAX_OBB_STEPS);
    if clamped != self.obb_steps {
      log::warn!("OBB steps {} clamped to {}.", self.obb_steps, clamped);
      self.obb_steps = clamped;
    }
    if !self.scale.is_finite() || self.scale == 0.0 {
      log::warn!("Invalid scale {}, using 1.0.", self.scale);
      self.scale = 1.0;
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_fields_use_defaults() {
    let options = HalaCompileOptions::from_json_str(r#"{ "compress": true, "normal_packing": "packed" }"#).unwrap();
    assert!(options.compress);
    assert_eq!(options.normal_packing, HalaNormalPacking::Packed);
    assert_eq!(options.texcoord_packing, HalaTexcoordPacking::Full);
    assert_eq!(options.scale, 1.0);
    assert_eq!(options.obb_steps, DEFAULT_OBB_STEPS);
  }

  #[test]
  fn obb_steps_are_clamped() {
    let options = HalaCompileOptions::from_json_str(r#"{ "obb_steps": 1000 }"#).unwrap();
    assert_eq!(options.obb_steps, MAX_OBB_STEPS);
    let options = HalaCompileOptions::from_json_str(r#"{ "obb_steps": 0 }"#).unwrap();
    assert_eq!(options.obb_steps, 1);
  }

  #[test]
  fn unknown_packing_numbers_fall_back() {
    assert_eq!(HalaNormalPacking::from_u32(7), HalaNormalPacking::Full);
    assert_eq!(HalaTexcoordPacking::from_u32(1), HalaTexcoordPacking::Half);
  }

  #[test]
  fn malformed_json_is_an_input_error() {
    let err = HalaCompileOptions::from_json_str("{ scale: ").unwrap_err();
    assert_eq!(err.kind(), HalaGeometryErrorKind::Input);
  }
}
