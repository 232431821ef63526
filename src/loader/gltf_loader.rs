use std::path::Path;

use glam::{
  Mat3,
  Mat4,
  Vec3,
  Vec4,
};

use crate::error::{
  HalaGeometryError,
  HalaGeometryErrorKind,
};
use crate::geometry::{
  HalaGroup,
  HalaTriangle,
  HalaTriangleSoup,
  HalaVertexAttributeIndex,
};

/// The glTF loader.
pub struct HalaGltfLoader;

/// The implementation of the glTF loader.
impl HalaGltfLoader {
  /// Load the glTF file from the given path.
  /// param path: The path of the glTF or GLB file.
  /// param barycentric: Whether to assign barycentric corner ids.
  /// return: The triangle soup.
  pub fn load<P: AsRef<Path>>(path: P, barycentric: bool) -> Result<HalaTriangleSoup, HalaGeometryError> {
    let path = path.as_ref();
    let (gltf, buffers, _) = gltf::import(path)
      .map_err(|err| HalaGeometryError::new(HalaGeometryErrorKind::Input, &format!("Load glTF file \"{:?}\" failed.", path), Some(Box::new(err))))?;
    Self::load_document(&gltf, &buffers, barycentric)
  }

  /// Flatten the default scene of a loaded document.
  /// param gltf: The glTF document.
  /// param buffers: The buffer data.
  /// param barycentric: Whether to assign barycentric corner ids.
  /// return: The triangle soup.
  pub fn load_document(gltf: &gltf::Document, buffers: &[gltf::buffer::Data], barycentric: bool) -> Result<HalaTriangleSoup, HalaGeometryError> {
    let scene = gltf.default_scene()
      .or_else(|| gltf.scenes().next())
      .ok_or(HalaGeometryError::input("No scene in glTF file."))?;
    if gltf.scenes().len() > 1 {
      log::warn!("More than one scene in glTF file. Only scene \"{}\" will be loaded.", scene.name().unwrap_or("<Unnamed>"));
    }
    log::debug!("Loading scene \"{}\".", scene.name().unwrap_or("<Unnamed>"));

    let mut soup = HalaTriangleSoup::default();
    let mut any_normal = false;
    let mut any_texcoord = false;

    let mut node_stack = scene.nodes().map(|node| (Mat4::IDENTITY, node)).collect::<Vec<_>>();
    node_stack.reverse();
    while let Some((parent_mtx, node)) = node_stack.pop() {
      let world_mtx = parent_mtx * Mat4::from_cols_array_2d(&node.transform().matrix());

      if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
          let (has_normal, has_texcoord) = Self::load_primitive(&mesh, &primitive, buffers, &world_mtx, barycentric, &mut soup)?;
          any_normal |= has_normal;
          any_texcoord |= has_texcoord;
        }
      }

      // Children are pushed in reverse so they are visited in document order.
      let children = node.children().collect::<Vec<_>>();
      node_stack.extend(children.into_iter().rev().map(|child| (world_mtx, child)));
    }

    Self::finish_attributes(&mut soup, any_normal, any_texcoord);
    if let Some(msg) = soup.find_invalid_corner() {
      return Err(HalaGeometryError::input(&format!("Invalid glTF primitive: {}.", msg)));
    }

    log::debug!("glTF loaded: {} primitives, {} positions, {} triangles.",
      soup.num_source_items, soup.positions.len(), soup.triangles.len());
    Ok(soup)
  }

  /// Append one mesh primitive as a group.
  /// return: Whether the primitive has normals and texture coordinates.
  fn load_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    world_mtx: &Mat4,
    barycentric: bool,
    soup: &mut HalaTriangleSoup,
  ) -> Result<(bool, bool), HalaGeometryError> {
    let mesh_name = mesh.name().unwrap_or("<Unnamed>");
    if primitive.mode() != gltf::mesh::Mode::Triangles {
      log::warn!("Primitive {} of mesh \"{}\" is {:?}, skipped.", primitive.index(), mesh_name, primitive.mode());
      return Ok((false, false));
    }
    log::debug!("Loading primitive {} from mesh \"{}\".", primitive.index(), mesh_name);
    soup.num_source_items += 1;

    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
    let positions = reader.read_positions()
      .ok_or(HalaGeometryError::input(&format!("Read positions from mesh \"{}\" failed.", mesh_name)))?
      .map(|position| world_mtx.transform_point3(Vec3::from(position)))
      .collect::<Vec<_>>();
    let num_vertices = positions.len();

    let normal_mtx = Mat3::from_mat4(*world_mtx).inverse().transpose();
    let normals = reader.read_normals()
      .map(|normals| normals.map(|normal| (normal_mtx * Vec3::from(normal)).normalize_or_zero()).collect::<Vec<_>>());
    let texcoords = reader.read_tex_coords(0)
      .map(|texcoords| texcoords.into_f32().map(|uv| Vec3::new(uv[0], uv[1], 0.0)).collect::<Vec<_>>());
    let colors = reader.read_colors(0)
      .map(|colors| colors.into_rgba_f32().map(Vec4::from).collect::<Vec<_>>());
    let indices = match reader.read_indices() {
      Some(indices) => indices.into_u32().collect::<Vec<_>>(),
      None => (0..num_vertices as u32).collect::<Vec<_>>(),
    };

    let has_normal = normals.as_ref().is_some_and(|normals| normals.len() == num_vertices);
    let has_texcoord = texcoords.as_ref().is_some_and(|texcoords| texcoords.len() == num_vertices);
    let has_color = colors.as_ref().is_some_and(|colors| colors.len() == num_vertices);

    // Every attribute array stays aligned with the positions.
    let base = soup.positions.len() as u32;
    soup.positions.extend(positions);
    match normals {
      Some(normals) if has_normal => soup.normals.extend(normals),
      _ => soup.normals.extend(std::iter::repeat(Vec3::ZERO).take(num_vertices)),
    }
    match texcoords {
      Some(texcoords) if has_texcoord => soup.texcoords.extend(texcoords),
      _ => soup.texcoords.extend(std::iter::repeat(Vec3::ZERO).take(num_vertices)),
    }
    match colors {
      Some(colors) if has_color => {
        soup.colors.extend(colors);
        soup.has_color = true;
      },
      _ => soup.colors.extend(std::iter::repeat(Vec4::ONE).take(num_vertices)),
    }

    if indices.len() % 3 != 0 {
      log::warn!("Mesh \"{}\" has {} indices, the trailing ones are ignored.", mesh_name, indices.len());
    }
    let start_triangle = soup.triangles.len() as u32;
    for tri_indices in indices.chunks_exact(3) {
      let mut triangle = HalaTriangle::default();
      for (edge, index) in tri_indices.iter().enumerate() {
        let index = base + index;
        let mut corner = HalaVertexAttributeIndex::new(index, Some(index), Some(index));
        if barycentric {
          corner.barycentric = edge as u8;
        }
        triangle.corners[edge] = corner;
      }
      soup.triangles.push(triangle);
    }

    let num_triangles = soup.triangles.len() as u32 - start_triangle;
    if num_triangles > 0 {
      soup.groups.push(HalaGroup {
        start_triangle,
        num_triangles,
        name: mesh_name.to_string(),
        material: primitive.material().name().unwrap_or_default().to_string(),
      });
    }
    Ok((has_normal, has_texcoord))
  }

  /// Drop the attribute arrays no primitive provided.
  fn finish_attributes(soup: &mut HalaTriangleSoup, has_normal: bool, has_texcoord: bool) {
    soup.has_normal = has_normal;
    soup.has_texcoord = has_texcoord;
    if !has_normal {
      soup.normals.clear();
    }
    if !has_texcoord {
      soup.texcoords.clear();
    }
    if !soup.has_color {
      soup.colors.clear();
    }
    for triangle in soup.triangles.iter_mut() {
      for corner in triangle.corners.iter_mut() {
        if !has_normal {
          corner.normal = None;
        }
        if !has_texcoord {
          corner.texcoord = None;
        }
      }
    }
  }
}
