use half::f16;

use crate::config::{
  HalaNormalPacking,
  HalaTexcoordPacking,
};

/// The semantic of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalaAttribute {
  Position,
  Normal,
  Tangent,
  Color0,
  Color1,
  TexCoord0,
}

impl HalaAttribute {
  /// The on-disk id of the attribute.
  pub fn to_id(self) -> u16 {
    match self {
      Self::Position => 0x0001,
      Self::Normal => 0x0002,
      Self::Tangent => 0x0003,
      Self::Color0 => 0x0005,
      Self::Color1 => 0x0006,
      Self::TexCoord0 => 0x0010,
    }
  }

  pub fn from_id(id: u16) -> Option<Self> {
    match id {
      0x0001 => Some(Self::Position),
      0x0002 => Some(Self::Normal),
      0x0003 => Some(Self::Tangent),
      0x0005 => Some(Self::Color0),
      0x0006 => Some(Self::Color1),
      0x0010 => Some(Self::TexCoord0),
      _ => None,
    }
  }
}

/// The component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalaAttributeType {
  Uint8,
  Half,
  Float,
}

impl HalaAttributeType {
  /// The on-disk id of the component type.
  pub fn to_id(self) -> u16 {
    match self {
      Self::Uint8 => 0x0001,
      Self::Half => 0x0003,
      Self::Float => 0x0004,
    }
  }

  pub fn from_id(id: u16) -> Option<Self> {
    match id {
      0x0001 => Some(Self::Uint8),
      0x0003 => Some(Self::Half),
      0x0004 => Some(Self::Float),
      _ => None,
    }
  }

  /// The size of one component in bytes.
  pub fn size(self) -> usize {
    match self {
      Self::Uint8 => 1,
      Self::Half => 2,
      Self::Float => 4,
    }
  }
}

/// One attribute of a vertex layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaAttributeDesc {
  pub attribute: HalaAttribute,
  pub num: u8,
  pub ty: HalaAttributeType,
  pub normalized: bool,
  /// Signed values packed into an unsigned type, v * 127 + 128.
  pub as_int: bool,
  pub offset: u16,
}

impl HalaAttributeDesc {
  pub fn size(&self) -> usize {
    self.num as usize * self.ty.size()
  }
}

/// The feature flags a layout is built from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HalaLayoutFlags {
  pub has_color: bool,
  pub has_barycentric: bool,
  pub has_texcoord: bool,
  pub has_normal: bool,
  pub has_tangent: bool,
  pub normal_packing: HalaNormalPacking,
  pub texcoord_packing: HalaTexcoordPacking,
}

/// The packed vertex layout.
/// The layout is the only source of attribute offsets.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct HalaVertexLayout {
  pub attributes: Vec<HalaAttributeDesc>,
  pub stride: u16,
}

/// The implementation of the vertex layout.
impl HalaVertexLayout {
  /// Build the layout for the given feature flags.
  /// The tangent is only added when both normal and texcoord are present.
  /// param flags: The feature flags.
  /// return: The layout.
  pub fn build(flags: &HalaLayoutFlags) -> Self {
    let mut layout = Self::default();
    layout.add(HalaAttribute::Position, 3, HalaAttributeType::Float, false, false);

    if flags.has_color {
      layout.add(HalaAttribute::Color0, 4, HalaAttributeType::Uint8, true, false);
    }

    if flags.has_barycentric {
      layout.add(HalaAttribute::Color1, 4, HalaAttributeType::Uint8, true, false);
    }

    if flags.has_texcoord {
      match flags.texcoord_packing {
        HalaTexcoordPacking::Full => layout.add(HalaAttribute::TexCoord0, 2, HalaAttributeType::Float, false, false),
        HalaTexcoordPacking::Half => layout.add(HalaAttribute::TexCoord0, 2, HalaAttributeType::Half, false, false),
      }
    }

    if flags.has_normal {
      let has_tangent = flags.has_tangent && flags.has_texcoord;
      match flags.normal_packing {
        HalaNormalPacking::Full => {
          layout.add(HalaAttribute::Normal, 3, HalaAttributeType::Float, false, false);
          if has_tangent {
            layout.add(HalaAttribute::Tangent, 4, HalaAttributeType::Float, false, false);
          }
        },
        HalaNormalPacking::Packed => {
          layout.add(HalaAttribute::Normal, 4, HalaAttributeType::Uint8, true, true);
          if has_tangent {
            layout.add(HalaAttribute::Tangent, 4, HalaAttributeType::Uint8, true, true);
          }
        },
      }
    }

    layout
  }

  fn add(&mut self, attribute: HalaAttribute, num: u8, ty: HalaAttributeType, normalized: bool, as_int: bool) {
    let desc = HalaAttributeDesc {
      attribute,
      num,
      ty,
      normalized,
      as_int,
      offset: self.stride,
    };
    self.stride += desc.size() as u16;
    self.attributes.push(desc);
  }

  pub fn is_empty(&self) -> bool {
    self.attributes.is_empty()
  }

  pub fn stride(&self) -> usize {
    self.stride as usize
  }

  /// Find the descriptor of an attribute.
  /// param attribute: The attribute.
  /// return: The descriptor or None.
  pub fn get(&self, attribute: HalaAttribute) -> Option<&HalaAttributeDesc> {
    self.attributes.iter().find(|desc| desc.attribute == attribute)
  }

  pub fn has(&self, attribute: HalaAttribute) -> bool {
    self.get(attribute).is_some()
  }

  /// Pack an attribute value into one vertex.
  /// Does nothing when the layout lacks the attribute.
  /// param attribute: The attribute.
  /// param input: The value, only the first `num` components are used.
  /// param vertex: The bytes of one vertex, at least `stride` long.
  pub fn pack(&self, attribute: HalaAttribute, input: [f32; 4], vertex: &mut [u8]) {
    let desc = match self.get(attribute) {
      Some(desc) => desc,
      None => return,
    };
    let data = &mut vertex[desc.offset as usize..desc.offset as usize + desc.size()];
    for (i, value) in input.iter().take(desc.num as usize).enumerate() {
      match desc.ty {
        HalaAttributeType::Uint8 => {
          data[i] = if desc.as_int {
            (value * 127.0 + 128.0) as u8
          } else if desc.normalized {
            (value * 255.0) as u8
          } else {
            *value as u8
          };
        },
        HalaAttributeType::Half => {
          data[i * 2..i * 2 + 2].copy_from_slice(&f16::from_f32(*value).to_le_bytes());
        },
        HalaAttributeType::Float => {
          data[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        },
      }
    }
  }

  /// Unpack an attribute value from one vertex.
  /// Missing components are zero.
  /// param attribute: The attribute.
  /// param vertex: The bytes of one vertex.
  /// return: The value or None.
  pub fn unpack(&self, attribute: HalaAttribute, vertex: &[u8]) -> Option<[f32; 4]> {
    let desc = self.get(attribute)?;
    let data = &vertex[desc.offset as usize..desc.offset as usize + desc.size()];
    let mut output = [0f32; 4];
    for (i, value) in output.iter_mut().take(desc.num as usize).enumerate() {
      *value = match desc.ty {
        HalaAttributeType::Uint8 => {
          if desc.as_int {
            (data[i] as f32 - 128.0) / 127.0
          } else if desc.normalized {
            data[i] as f32 / 255.0
          } else {
            data[i] as f32
          }
        },
        HalaAttributeType::Half => f16::from_le_bytes([data[i * 2], data[i * 2 + 1]]).to_f32(),
        HalaAttributeType::Float => f32::from_le_bytes([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]]),
      };
    }
    Some(output)
  }
}
