use glam::{
  Vec3,
  Vec4,
};

/// One face corner's indices into the attribute arrays.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalaVertexAttributeIndex {
  pub position: u32,
  pub texcoord: Option<u32>,
  pub normal: Option<u32>,
  /// The barycentric corner id, 0, 1 or 2.
  pub barycentric: u8,
}

impl HalaVertexAttributeIndex {
  pub fn new(position: u32, texcoord: Option<u32>, normal: Option<u32>) -> Self {
    Self {
      position,
      texcoord,
      normal,
      barycentric: 0,
    }
  }
}

/// A triangle made of three face corners.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HalaTriangle {
  pub corners: [HalaVertexAttributeIndex; 3],
}

/// A contiguous triangle range sharing a material.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HalaGroup {
  pub start_triangle: u32,
  pub num_triangles: u32,
  pub name: String,
  pub material: String,
}

impl HalaGroup {
  pub fn end_triangle(&self) -> u32 {
    self.start_triangle + self.num_triangles
  }
}

/// The triangle soup produced by a loader.
#[derive(Debug, Default, Clone)]
pub struct HalaTriangleSoup {
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  /// Texture coordinates, the third component is unused.
  pub texcoords: Vec<Vec3>,
  /// Vertex colors, indexed by the position index.
  pub colors: Vec<Vec4>,
  pub triangles: Vec<HalaTriangle>,
  pub groups: Vec<HalaGroup>,

  pub has_normal: bool,
  pub has_texcoord: bool,
  pub has_color: bool,

  /// Number of source lines or items the loader consumed.
  pub num_source_items: u32,
}

/// The implementation of the triangle soup.
impl HalaTriangleSoup {
  /// Multiply all positions by the scale factor.
  /// param scale: The scale factor.
  pub fn scale(&mut self, scale: f32) {
    if scale == 1.0 {
      return;
    }
    for position in self.positions.iter_mut() {
      *position *= scale;
    }
  }

  /// Reverse the winding of every triangle.
  pub fn reverse_winding(&mut self) {
    for triangle in self.triangles.iter_mut() {
      triangle.corners.swap(1, 2);
    }
  }

  /// Stable sort the groups by material name.
  pub fn sort_groups_by_material(&mut self) {
    self.groups.sort_by(|lhs, rhs| lhs.material.as_bytes().cmp(rhs.material.as_bytes()));
  }

  /// Check every corner refers to an existing attribute.
  /// return: The first invalid corner description, if any.
  pub fn find_invalid_corner(&self) -> Option<String> {
    for (tri_index, triangle) in self.triangles.iter().enumerate() {
      for corner in triangle.corners.iter() {
        if corner.position as usize >= self.positions.len() {
          return Some(format!("triangle {} position index {} out of range", tri_index, corner.position));
        }
        if self.has_texcoord {
          match corner.texcoord {
            Some(idx) if (idx as usize) < self.texcoords.len() => {},
            _ => return Some(format!("triangle {} texcoord index {:?} out of range", tri_index, corner.texcoord)),
          }
        }
        if self.has_normal {
          match corner.normal {
            Some(idx) if (idx as usize) < self.normals.len() => {},
            _ => return Some(format!("triangle {} normal index {:?} out of range", tri_index, corner.normal)),
          }
        }
        if self.has_color && corner.position as usize >= self.colors.len() {
          return Some(format!("triangle {} color index {} out of range", tri_index, corner.position));
        }
      }
    }
    for group in self.groups.iter() {
      if group.start_triangle as u64 + group.num_triangles as u64 > self.triangles.len() as u64 {
        return Some(format!("group \"{}\" ends past the triangle array", group.name));
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn group(start: u32, num: u32, material: &str) -> HalaGroup {
    HalaGroup {
      start_triangle: start,
      num_triangles: num,
      name: format!("g{}", start),
      material: material.to_string(),
    }
  }

  #[test]
  fn material_sort_is_stable() {
    let mut soup = HalaTriangleSoup {
      groups: vec![group(0, 1, "wood"), group(1, 1, "metal"), group(2, 1, "wood")],
      ..Default::default()
    };
    soup.sort_groups_by_material();
    let order = soup.groups.iter().map(|g| g.start_triangle).collect::<Vec<_>>();
    assert_eq!(order, vec![1, 0, 2]);
  }

  #[test]
  fn reverse_winding_swaps_last_corners() {
    let mut soup = HalaTriangleSoup {
      triangles: vec![HalaTriangle {
        corners: [
          HalaVertexAttributeIndex::new(0, None, None),
          HalaVertexAttributeIndex::new(1, None, None),
          HalaVertexAttributeIndex::new(2, None, None),
        ],
      }],
      ..Default::default()
    };
    soup.reverse_winding();
    let positions = soup.triangles[0].corners.map(|c| c.position);
    assert_eq!(positions, [0, 2, 1]);
  }

  #[test]
  fn invalid_corners_are_reported() {
    let soup = HalaTriangleSoup {
      positions: vec![Vec3::ZERO; 2],
      triangles: vec![HalaTriangle {
        corners: [
          HalaVertexAttributeIndex::new(0, None, None),
          HalaVertexAttributeIndex::new(1, None, None),
          HalaVertexAttributeIndex::new(2, None, None),
        ],
      }],
      groups: vec![group(0, 1, "")],
      ..Default::default()
    };
    assert!(soup.find_invalid_corner().is_some());
  }
}
