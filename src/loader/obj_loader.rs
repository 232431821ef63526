use std::path::Path;

use glam::Vec3;

use crate::error::HalaGeometryError;
use crate::geometry::{
  HalaGroup,
  HalaTriangle,
  HalaTriangleSoup,
  HalaVertexAttributeIndex,
};

/// The Wavefront OBJ loader.
pub struct HalaObjLoader {
  barycentric: bool,
  warned_vp: bool,
}

/// The implementation of the OBJ loader.
impl HalaObjLoader {
  /// Create a new OBJ loader.
  /// param barycentric: Whether to assign barycentric corner ids.
  /// return: The loader.
  pub fn new(barycentric: bool) -> Self {
    Self {
      barycentric,
      warned_vp: false,
    }
  }

  /// Load the OBJ file from the given path.
  /// param path: The path of the OBJ file.
  /// return: The triangle soup.
  pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<HalaTriangleSoup, HalaGeometryError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
      .map_err(|err| HalaGeometryError::io(&format!("Read OBJ file \"{:?}\" failed.", path), err))?;
    self.parse(&text)
  }

  /// Parse OBJ text.
  /// param text: The OBJ text.
  /// return: The triangle soup.
  pub fn parse(&mut self, text: &str) -> Result<HalaTriangleSoup, HalaGeometryError> {
    let mut soup = HalaTriangleSoup::default();
    let mut group = HalaGroup::default();

    for (line_index, line) in text.lines().enumerate() {
      soup.num_source_items += 1;
      let line_no = line_index + 1;
      let mut tokens = line.split_whitespace();
      let tag = match tokens.next() {
        Some(tag) => tag,
        None => continue,
      };
      let args = tokens.collect::<Vec<_>>();

      match tag {
        "f" => self.parse_face(&args, line_no, &mut soup)?,
        "g" => {
          group.name = args.join(" ");
        },
        "usemtl" => {
          let material = args.first().copied().unwrap_or_default();
          if material != group.material {
            Self::close_group(&mut soup, &mut group);
          }
          group.material = material.to_string();
        },
        _ if tag.starts_with('v') => {
          Self::close_group(&mut soup, &mut group);
          match tag {
            "v" => {
              let mut position = Vec3::new(
                parse_f32(&args, 0, line_no)?,
                parse_f32(&args, 1, line_no)?,
                parse_f32(&args, 2, line_no)?,
              );
              if args.len() == 4 {
                position /= parse_f32(&args, 3, line_no)?;
              }
              soup.positions.push(position);
            },
            "vt" => {
              let mut texcoord = Vec3::new(parse_f32(&args, 0, line_no)?, 0.0, 0.0);
              if args.len() >= 2 {
                texcoord.y = parse_f32(&args, 1, line_no)?;
              }
              if args.len() >= 3 {
                texcoord.z = parse_f32(&args, 2, line_no)?;
              }
              soup.texcoords.push(texcoord);
            },
            "vn" => {
              soup.normals.push(Vec3::new(
                parse_f32(&args, 0, line_no)?,
                parse_f32(&args, 1, line_no)?,
                parse_f32(&args, 2, line_no)?,
              ));
            },
            "vp" => {
              if !self.warned_vp {
                self.warned_vp = true;
                log::warn!("Parameter space vertices are unsupported.");
              }
            },
            _ => {},
          }
        },
        // Comments, mtllib, o, s and other tags.
        _ => {},
      }
    }
    Self::close_group(&mut soup, &mut group);

    Self::fill_missing_indices(&mut soup);
    if let Some(msg) = soup.find_invalid_corner() {
      return Err(HalaGeometryError::input(&format!("Invalid OBJ face: {}.", msg)));
    }

    log::debug!("OBJ parsed: {} lines, {} positions, {} triangles, {} groups.",
      soup.num_source_items, soup.positions.len(), soup.triangles.len(), soup.groups.len());
    Ok(soup)
  }

  /// Parse one face and fan triangulate it.
  fn parse_face(&self, args: &[&str], line_no: usize, soup: &mut HalaTriangleSoup) -> Result<(), HalaGeometryError> {
    if args.len() < 3 {
      log::warn!("Line {}: face with {} corners skipped.", line_no, args.len());
      return Ok(());
    }

    let mut triangle = HalaTriangle::default();
    for (edge, token) in args.iter().enumerate() {
      let mut corner = parse_corner(token, line_no, soup)?;
      if self.barycentric {
        corner.barycentric = if edge < 3 { edge as u8 } else { ((1 + (edge + 1)) & 1) as u8 };
      }

      match edge {
        0 | 1 | 2 => {
          triangle.corners[edge] = corner;
          if edge == 2 {
            soup.triangles.push(triangle);
          }
        },
        _ => {
          triangle.corners[1] = triangle.corners[2];
          triangle.corners[2] = corner;
          soup.triangles.push(triangle);
        },
      }
    }
    Ok(())
  }

  /// Close the current group if it has triangles and start the next one.
  fn close_group(soup: &mut HalaTriangleSoup, group: &mut HalaGroup) {
    group.num_triangles = soup.triangles.len() as u32 - group.start_triangle;
    if group.num_triangles > 0 {
      soup.groups.push(group.clone());
      group.start_triangle = soup.triangles.len() as u32;
      group.num_triangles = 0;
    }
  }

  /// If any corner has a texture coordinate (normal), the missing ones become 0.
  fn fill_missing_indices(soup: &mut HalaTriangleSoup) {
    let has_texcoord = soup.triangles.iter()
      .any(|triangle| triangle.corners.iter().any(|corner| corner.texcoord.is_some()));
    let has_normal = soup.triangles.iter()
      .any(|triangle| triangle.corners.iter().any(|corner| corner.normal.is_some()));

    for triangle in soup.triangles.iter_mut() {
      for corner in triangle.corners.iter_mut() {
        if has_texcoord && corner.texcoord.is_none() {
          corner.texcoord = Some(0);
        }
        if has_normal && corner.normal.is_none() {
          corner.normal = Some(0);
        }
      }
    }
    soup.has_texcoord = has_texcoord;
    soup.has_normal = has_normal;
  }
}

fn parse_f32(args: &[&str], index: usize, line_no: usize) -> Result<f32, HalaGeometryError> {
  let token = args.get(index)
    .ok_or(HalaGeometryError::input(&format!("Line {}: missing component {}.", line_no, index)))?;
  token.parse::<f32>()
    .map_err(|_| HalaGeometryError::input(&format!("Line {}: \"{}\" is not a number.", line_no, token)))
}

/// Resolve a 1-based or negative relative OBJ index.
fn resolve_index(token: &str, count: usize, line_no: usize) -> Result<u32, HalaGeometryError> {
  let value = token.parse::<i64>()
    .map_err(|_| HalaGeometryError::input(&format!("Line {}: \"{}\" is not an index.", line_no, token)))?;
  let resolved = if value < 0 { count as i64 + value } else { value - 1 };
  u32::try_from(resolved)
    .map_err(|_| HalaGeometryError::input(&format!("Line {}: index {} out of range.", line_no, value)))
}

/// Parse a `p`, `p/t`, `p//n` or `p/t/n` face corner.
fn parse_corner(token: &str, line_no: usize, soup: &HalaTriangleSoup) -> Result<HalaVertexAttributeIndex, HalaGeometryError> {
  let mut parts = token.split('/');
  let position = resolve_index(parts.next().unwrap_or_default(), soup.positions.len(), line_no)?;
  let texcoord = match parts.next() {
    Some(tex) if !tex.is_empty() => Some(resolve_index(tex, soup.texcoords.len(), line_no)?),
    _ => None,
  };
  let normal = match parts.next() {
    Some(normal) if !normal.is_empty() => Some(resolve_index(normal, soup.normals.len(), line_no)?),
    _ => None,
  };
  Ok(HalaVertexAttributeIndex::new(position, texcoord, normal))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::HalaGeometryErrorKind;

  fn parse(text: &str) -> HalaTriangleSoup {
    HalaObjLoader::new(false).parse(text).unwrap()
  }

  fn positions(triangle: &HalaTriangle) -> [u32; 3] {
    triangle.corners.map(|corner| corner.position)
  }

  #[test]
  fn polygons_are_fan_triangulated() {
    let soup = parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 0 2 0\nf 1 2 3 4 5\n");
    assert_eq!(soup.triangles.len(), 3);
    assert_eq!(positions(&soup.triangles[0]), [0, 1, 2]);
    assert_eq!(positions(&soup.triangles[1]), [0, 2, 3]);
    assert_eq!(positions(&soup.triangles[2]), [0, 3, 4]);
    assert_eq!(soup.groups.len(), 1);
    assert_eq!(soup.groups[0].num_triangles, 3);
    assert_eq!(soup.num_source_items, 6);
  }

  #[test]
  fn relative_indices_and_corner_forms() {
    let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5 0.25\nvn 0 0 1\nf -3/1/1 -2//1 -1/-1\n";
    let soup = parse(text);
    let corners = soup.triangles[0].corners;
    assert_eq!(positions(&soup.triangles[0]), [0, 1, 2]);
    assert_eq!(corners[0].texcoord, Some(0));
    assert_eq!(corners[0].normal, Some(0));
    // Missing indices are filled with 0 once any corner has one.
    assert_eq!(corners[1].texcoord, Some(0));
    assert_eq!(corners[2].normal, Some(0));
    assert!(soup.has_texcoord);
    assert!(soup.has_normal);
    assert_eq!(soup.texcoords[0], Vec3::new(0.5, 0.25, 0.0));
  }

  #[test]
  fn no_attributes_means_position_only() {
    let soup = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    assert!(!soup.has_texcoord);
    assert!(!soup.has_normal);
    assert_eq!(soup.triangles[0].corners[0].texcoord, None);
  }

  #[test]
  fn homogeneous_positions_are_divided() {
    let soup = parse("v 2 4 6 2\n");
    assert_eq!(soup.positions[0], Vec3::new(1.0, 2.0, 3.0));
  }

  #[test]
  fn groups_follow_materials_and_vertex_lines() {
    let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
g body
usemtl wood
f 1 2 3
usemtl wood
f 1 2 3
usemtl metal
f 3 2 1
v 1 1 0
g head
f 1 2 4
";
    let soup = parse(text);
    assert_eq!(soup.groups.len(), 3);
    assert_eq!((soup.groups[0].name.as_str(), soup.groups[0].material.as_str()), ("body", "wood"));
    assert_eq!(soup.groups[0].num_triangles, 2);
    assert_eq!((soup.groups[1].name.as_str(), soup.groups[1].material.as_str()), ("body", "metal"));
    assert_eq!(soup.groups[1].start_triangle, 2);
    assert_eq!((soup.groups[2].name.as_str(), soup.groups[2].material.as_str()), ("head", "metal"));
    assert_eq!(soup.groups[2].start_triangle, 3);
  }

  #[test]
  fn barycentric_ids_alternate_past_the_third_corner() {
    let mut loader = HalaObjLoader::new(true);
    let soup = loader.parse("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nv 0 2 0\nf 1 2 3 4 5\n").unwrap();
    let ids = soup.triangles.iter().map(|t| t.corners.map(|c| c.barycentric)).collect::<Vec<_>>();
    assert_eq!(ids, vec![[0, 1, 2], [0, 2, 1], [0, 1, 0]]);
  }

  #[test]
  fn out_of_range_indices_are_input_errors() {
    let err = HalaObjLoader::new(false).parse("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
    assert_eq!(err.kind(), HalaGeometryErrorKind::Input);
    let err = HalaObjLoader::new(false).parse("v 0 0 0\nf -1 -2 -3\n").unwrap_err();
    assert_eq!(err.kind(), HalaGeometryErrorKind::Input);
    let err = HalaObjLoader::new(false).parse("v 0 zero 0\n").unwrap_err();
    assert_eq!(err.kind(), HalaGeometryErrorKind::Input);
  }

  #[test]
  fn unknown_tags_are_ignored() {
    let soup = parse("# comment\nmtllib a.mtl\no thing\ns 1\nvp 0.5\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    assert_eq!(soup.triangles.len(), 1);
    assert_eq!(soup.num_source_items, 9);
  }
}
