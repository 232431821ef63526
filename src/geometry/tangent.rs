use glam::{
  Vec2,
  Vec3,
};

use super::layout::{
  HalaAttribute,
  HalaVertexLayout,
};

/// Compute per-vertex tangents from positions, normals and texture coordinates.
/// The tangent's w holds the bitangent handedness.
/// Does nothing when the layout has no tangent attribute.
/// param vertices: The packed vertices, tangents are written in place.
/// param num_vertices: The number of vertices.
/// param layout: The vertex layout.
/// param indices: The triangle list.
pub fn calc_tangents(vertices: &mut [u8], num_vertices: usize, layout: &HalaVertexLayout, indices: &[u16]) {
  if !layout.has(HalaAttribute::Tangent) {
    return;
  }
  let stride = layout.stride();
  let vertex = |vertices: &[u8], index: usize| -> (Vec3, Vec2) {
    let data = &vertices[index * stride..(index + 1) * stride];
    let position = layout.unpack(HalaAttribute::Position, data).unwrap_or_default();
    let uv = layout.unpack(HalaAttribute::TexCoord0, data).unwrap_or_default();
    (Vec3::new(position[0], position[1], position[2]), Vec2::new(uv[0], uv[1]))
  };

  let mut tangents = vec![(Vec3::ZERO, Vec3::ZERO); num_vertices];
  for tri_indices in indices.chunks_exact(3) {
    let (v0, uv0) = vertex(&*vertices, tri_indices[0] as usize);
    let (v1, uv1) = vertex(&*vertices, tri_indices[1] as usize);
    let (v2, uv2) = vertex(&*vertices, tri_indices[2] as usize);

    let delta_pos1 = v1 - v0;
    let delta_pos2 = v2 - v0;
    let delta_uv1 = uv1 - uv0;
    let delta_uv2 = uv2 - uv0;

    let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
    if det.abs() <= f32::EPSILON {
      continue;
    }
    let invdet = 1.0 / det;

    let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * invdet;
    let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * invdet;
    for &index in tri_indices.iter() {
      let (tanu, tanv) = &mut tangents[index as usize];
      *tanu += tangent;
      *tanv += bitangent;
    }
  }

  for (index, (tanu, tanv)) in tangents.into_iter().enumerate() {
    let data = &mut vertices[index * stride..(index + 1) * stride];
    let normal = layout.unpack(HalaAttribute::Normal, data).unwrap_or_default();
    let normal = Vec3::new(normal[0], normal[1], normal[2]);

    let tangent = (tanu - normal * normal.dot(tanu)).normalize_or_zero();
    let handedness = if normal.cross(tanu).dot(tanv) < 0.0 { -1.0 } else { 1.0 };
    layout.pack(HalaAttribute::Tangent, [tangent.x, tangent.y, tangent.z, handedness], data);
  }
}
