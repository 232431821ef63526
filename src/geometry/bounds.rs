use glam::{
  EulerRot,
  Mat3,
  Mat4,
  Vec3,
};
use rayon::prelude::*;

/// Read the positions of a packed vertex buffer.
/// The position is always the first attribute, 3 floats.
/// param vertices: The packed vertices.
/// param stride: The vertex stride.
/// return: The position iterator.
pub fn positions(vertices: &[u8], stride: usize) -> impl Iterator<Item = Vec3> + '_ {
  vertices.chunks_exact(stride).map(|vertex| {
    let read = |i: usize| f32::from_le_bytes([vertex[i * 4], vertex[i * 4 + 1], vertex[i * 4 + 2], vertex[i * 4 + 3]]);
    Vec3::new(read(0), read(1), read(2))
  })
}

/// Bounding sphere.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HalaSphere {
  pub center: Vec3,
  pub radius: f32,
}

/// Axis-aligned bounding box (AABB) representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaAabb {
  pub min: Vec3,
  pub max: Vec3,
}

/// Oriented bounding box, the transform of the unit cube [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaObb {
  pub mtx: Mat4,
}

impl Default for HalaAabb {
  fn default() -> Self {
    Self {
      min: Vec3::ZERO,
      max: Vec3::ZERO,
    }
  }
}

impl Default for HalaObb {
  fn default() -> Self {
    Self {
      mtx: Mat4::ZERO,
    }
  }
}

/// Implementation of HalaSphere.
impl HalaSphere {
  /// Sphere centered on the AABB center, reaching the farthest point.
  /// param vertices: The packed vertices.
  /// param stride: The vertex stride.
  /// return: The sphere.
  pub fn calc_max(vertices: &[u8], stride: usize) -> Self {
    let aabb = match HalaAabb::from_vertices(vertices, stride) {
      Some(aabb) => aabb,
      None => return Self::default(),
    };
    let center = aabb.get_center();
    let max_dist_sq = positions(vertices, stride)
      .fold(0f32, |acc, position| acc.max(position.distance_squared(center)));
    Self {
      center,
      radius: max_dist_sq.sqrt(),
    }
  }

  /// Ritter's approximation of the minimal enclosing sphere.
  /// param vertices: The packed vertices.
  /// param stride: The vertex stride.
  /// return: The sphere.
  pub fn calc_min(vertices: &[u8], stride: usize) -> Self {
    let first = match positions(vertices, stride).next() {
      Some(first) => first,
      None => return Self::default(),
    };
    let farthest_from = |origin: Vec3| {
      positions(vertices, stride).fold(origin, |best, position| {
        if position.distance_squared(origin) > best.distance_squared(origin) { position } else { best }
      })
    };
    let x = farthest_from(first);
    let y = farthest_from(x);

    let mut center = (x + y) * 0.5;
    let mut radius = x.distance(y) * 0.5;
    for position in positions(vertices, stride) {
      let dist = position.distance(center);
      if dist > radius {
        let new_radius = (radius + dist) * 0.5;
        center += (position - center) * ((new_radius - radius) / dist);
        radius = new_radius;
      }
    }

    Self {
      center,
      radius,
    }
  }

  /// Does the sphere contain the point?
  /// param point: The point.
  /// param epsilon: The relative tolerance.
  /// return: True if it does.
  pub fn contains(&self, point: Vec3, epsilon: f32) -> bool {
    point.distance(self.center) <= self.radius * (1.0 + epsilon) + epsilon
  }
}

/// Implementation of HalaAabb.
impl HalaAabb {
  /// Create a new HalaAabb instance.
  /// param min: The minimum corner.
  /// param max: The maximum corner.
  /// return: The new HalaAabb instance.
  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }

  /// The AABB of the packed vertices.
  /// param vertices: The packed vertices.
  /// param stride: The vertex stride.
  /// return: The AABB, None if there are no vertices.
  pub fn from_vertices(vertices: &[u8], stride: usize) -> Option<Self> {
    Self::from_points(positions(vertices, stride))
  }

  /// The AABB of a point set.
  /// param points: The points.
  /// return: The AABB, None if there are no points.
  pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
    let mut points = points.into_iter();
    let first = points.next()?;
    let mut aabb = Self::new(first, first);
    for point in points {
      aabb.encapsulate_point(point);
    }
    Some(aabb)
  }

  pub fn get_center(&self) -> Vec3 {
    (self.min + self.max) * 0.5
  }

  /// Get the extents (half size) of the AABB.
  pub fn get_extents(&self) -> Vec3 {
    (self.max - self.min) * 0.5
  }

  /// Get the surface area of the AABB.
  /// return: The area.
  pub fn get_area(&self) -> f32 {
    let size = self.max - self.min;
    2.0 * (size.x * size.y + size.y * size.z + size.z * size.x)
  }

  /// Grows the AABB to include the given point.
  /// param point: The point to include.
  pub fn encapsulate_point(&mut self, point: Vec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }
}

/// Implementation of HalaObb.
impl HalaObb {
  /// Oriented box of an AABB seen through a rotation.
  /// param aabb: The AABB in the rotated frame.
  /// param rotation: The rotation from that frame to world space.
  /// return: The OBB.
  pub fn from_rotated_aabb(aabb: &HalaAabb, rotation: Mat3) -> Self {
    Self {
      mtx: Mat4::from_mat3(rotation)
        * Mat4::from_translation(aabb.get_center())
        * Mat4::from_scale(aabb.get_extents()),
    }
  }

  /// Search a grid of rotations for the box of smallest surface area.
  /// param vertices: The packed vertices.
  /// param stride: The vertex stride.
  /// param steps: Number of angles per axis in [0, pi/2).
  /// return: The OBB.
  pub fn calc(vertices: &[u8], stride: usize, steps: u32) -> Self {
    let points = positions(vertices, stride).collect::<Vec<_>>();
    let aabb = match HalaAabb::from_points(points.iter().copied()) {
      Some(aabb) => aabb,
      None => return Self::default(),
    };
    let steps = steps.max(1);
    let angle_step = std::f32::consts::FRAC_PI_2 / steps as f32;

    let candidates = (0..steps).into_par_iter().map(|ii| {
      let ax = ii as f32 * angle_step;
      let mut best: Option<(f32, Mat3, HalaAabb)> = None;
      for jj in 0..steps {
        let ay = jj as f32 * angle_step;
        for kk in 0..steps {
          let az = kk as f32 * angle_step;
          let rotation = Mat3::from_euler(EulerRot::XYZ, ax, ay, az);
          let inverse = rotation.transpose();
          let rotated = HalaAabb::from_points(points.iter().map(|&point| inverse * point))
            .unwrap_or_default();
          let area = rotated.get_area();
          if best.map_or(true, |(best_area, _, _)| area < best_area) {
            best = Some((area, rotation, rotated));
          }
        }
      }
      best
    }).collect::<Vec<_>>();

    let mut min_area = aabb.get_area();
    let mut best = Self::from_rotated_aabb(&aabb, Mat3::IDENTITY);
    for (area, rotation, rotated) in candidates.into_iter().flatten() {
      if area < min_area {
        min_area = area;
        best = Self::from_rotated_aabb(&rotated, rotation);
      }
    }
    best
  }

  /// Transform a corner of the unit cube.
  /// param corner: The corner in [-1, 1].
  /// return: The world position.
  pub fn transform_point(&self, corner: Vec3) -> Vec3 {
    self.mtx.transform_point3(corner)
  }
}

/// The bounding volumes written in front of vertex data.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct HalaBoundingVolumes {
  pub sphere: HalaSphere,
  pub aabb: HalaAabb,
  pub obb: HalaObb,
}

impl HalaBoundingVolumes {
  /// Compute all bounding volumes, keeping the smaller of the two spheres.
  /// param vertices: The packed vertices.
  /// param stride: The vertex stride.
  /// param obb_steps: The OBB search steps.
  /// return: The bounding volumes.
  pub fn compute(vertices: &[u8], stride: usize, obb_steps: u32) -> Self {
    let max_sphere = HalaSphere::calc_max(vertices, stride);
    let min_sphere = HalaSphere::calc_min(vertices, stride);
    let sphere = if min_sphere.radius > max_sphere.radius { max_sphere } else { min_sphere };
    Self {
      sphere,
      aabb: HalaAabb::from_vertices(vertices, stride).unwrap_or_default(),
      obb: HalaObb::calc(vertices, stride, obb_steps),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pack(points: &[Vec3]) -> Vec<u8> {
    points.iter().flat_map(|p| p.to_array()).flat_map(|v| v.to_le_bytes()).collect()
  }

  fn box_points(min: Vec3, max: Vec3) -> Vec<Vec3> {
    let mut points = Vec::new();
    for i in 0..8 {
      points.push(Vec3::new(
        if i & 1 == 0 { min.x } else { max.x },
        if i & 2 == 0 { min.y } else { max.y },
        if i & 4 == 0 { min.z } else { max.z },
      ));
    }
    points
  }

  #[test]
  fn aabb_covers_points() {
    let points = vec![Vec3::new(1.0, -2.0, 3.0), Vec3::new(-1.0, 4.0, 0.0), Vec3::new(0.5, 0.0, -5.0)];
    let aabb = HalaAabb::from_vertices(&pack(&points), 12).unwrap();
    assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, -5.0));
    assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));
  }

  #[test]
  fn spheres_enclose_all_points() {
    let points = vec![
      Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 3.0, 0.0),
      Vec3::new(2.0, 2.0, 7.0), Vec3::new(-4.0, 1.0, -1.0),
    ];
    let data = pack(&points);
    let min_sphere = HalaSphere::calc_min(&data, 12);
    let max_sphere = HalaSphere::calc_max(&data, 12);
    for &point in points.iter() {
      assert!(min_sphere.contains(point, 1e-4));
      assert!(max_sphere.contains(point, 1e-4));
    }
  }

  #[test]
  fn smaller_sphere_is_kept() {
    let data = pack(&box_points(Vec3::splat(-1.0), Vec3::splat(1.0)));
    let volumes = HalaBoundingVolumes::compute(&data, 12, 2);
    let max_sphere = HalaSphere::calc_max(&data, 12);
    assert!(volumes.sphere.radius <= max_sphere.radius);
  }

  #[test]
  fn obb_of_axis_aligned_box_matches_aabb() {
    let data = pack(&box_points(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0)));
    let obb = HalaObb::calc(&data, 12, 5);
    let corner = obb.transform_point(Vec3::ONE).abs();
    assert!((corner - Vec3::new(1.0, 2.0, 3.0)).abs().max_element() < 1e-4);
  }

  #[test]
  fn obb_encloses_points() {
    let points = vec![
      Vec3::new(0.0, 0.0, 0.0), Vec3::new(3.0, 3.0, 0.0), Vec3::new(1.0, 0.0, 1.0), Vec3::new(4.0, 3.5, 1.0),
    ];
    let obb = HalaObb::calc(&pack(&points), 12, 8);
    let inverse = obb.mtx.inverse();
    for &point in points.iter() {
      let local = inverse.transform_point3(point);
      assert!(local.abs().max_element() <= 1.0 + 1e-3);
    }
  }

  #[test]
  fn empty_input_gives_zero_volumes() {
    let volumes = HalaBoundingVolumes::compute(&[], 12, 3);
    assert_eq!(volumes.sphere.radius, 0.0);
    assert_eq!(volumes.aabb, HalaAabb::default());
  }
}
