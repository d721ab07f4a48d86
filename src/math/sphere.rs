//! Bounding spheres for splat sets

use crate::core::types::Vec3;
use super::aabb::Aabb;

/// Sphere enclosing a set of splats (centers plus half their sizes)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere centered on the positions' AABB center whose radius covers
    /// every splat footprint, not just its center.
    ///
    /// Returns `None` when there are no positions.
    pub fn from_splats(positions: &[Vec3], sizes: &[f32]) -> Option<Self> {
        debug_assert_eq!(positions.len(), sizes.len());
        let aabb = Aabb::from_points(positions);
        if aabb.is_empty() {
            return None;
        }
        let center = aabb.center();
        let radius = positions
            .iter()
            .zip(sizes)
            .map(|(p, s)| p.distance(center) + s * 0.5)
            .fold(0.0f32, f32::max);
        Some(Self { center, radius })
    }

    /// True if `other` lies entirely inside this sphere, allowing `epsilon` slack
    pub fn contains_sphere(&self, other: &BoundingSphere, epsilon: f32) -> bool {
        self.center.distance(other.center) + other.radius <= self.radius + epsilon
    }

    /// Grow the radius (center fixed) until `other` is enclosed.
    /// Returns the amount the radius grew by.
    pub fn widen_to_contain(&mut self, other: &BoundingSphere) -> f32 {
        let needed = self.center.distance(other.center) + other.radius;
        if needed > self.radius {
            let grown = needed - self.radius;
            self.radius = needed;
            grown
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_includes_half_size() {
        let positions = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        let sizes = [0.5, 1.0];
        let sphere = BoundingSphere::from_splats(&positions, &sizes).unwrap();
        assert_eq!(sphere.center, Vec3::ZERO);
        assert!((sphere.radius - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_splats() {
        assert!(BoundingSphere::from_splats(&[], &[]).is_none());
    }

    #[test]
    fn test_widen_to_contain() {
        let mut parent = BoundingSphere::new(Vec3::ZERO, 1.0);
        let child = BoundingSphere::new(Vec3::new(2.0, 0.0, 0.0), 0.5);
        assert!(!parent.contains_sphere(&child, 0.0));
        let grown = parent.widen_to_contain(&child);
        assert!((grown - 1.5).abs() < 1e-6);
        assert!(parent.contains_sphere(&child, 1e-6));

        // Already enclosed: no growth
        let inner = BoundingSphere::new(Vec3::new(0.5, 0.0, 0.0), 0.1);
        assert_eq!(parent.widen_to_contain(&inner), 0.0);
    }
}
