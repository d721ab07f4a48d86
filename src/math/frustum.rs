//! View frustum and screen-coverage helpers for LOD selection

use crate::core::types::{Vec3, Vec4, Mat4};
use super::sphere::BoundingSphere;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from view-projection matrix (Gribb/Hartmann)
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let m = vp.to_cols_array_2d();
        let row = |r: usize| Vec4::new(m[0][r], m[1][r], m[2][r], m[3][r]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let left = Self::normalize_plane(r3 + r0);
        let right = Self::normalize_plane(r3 - r0);
        let bottom = Self::normalize_plane(r3 + r1);
        let top = Self::normalize_plane(r3 - r1);
        let near = Self::normalize_plane(r3 + r2);
        let far = Self::normalize_plane(r3 - r2);

        Self {
            planes: [near, far, left, right, top, bottom],
        }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = plane.truncate();
        let len = normal.length();
        if len > 0.0 {
            Plane {
                normal: normal / len,
                distance: plane.w / len,
            }
        } else {
            Plane::new(Vec3::ZERO, 0.0)
        }
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Sphere is visible unless it lies fully behind some plane
    /// (signed distance >= -radius for all six planes)
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }
}

/// Approximate on-screen size of a sphere, relative to the viewport height.
///
/// `(1 / tan(half_fov)) * r / sqrt(d^2 - r^2)`. When the eye is inside the
/// sphere the size is unbounded and `f32::INFINITY` is returned.
pub fn projected_sphere_size(eye: Vec3, half_fov: f32, sphere: &BoundingSphere) -> f32 {
    let dist_sq = eye.distance_squared(sphere.center);
    let radius_sq = sphere.radius * sphere.radius;
    if dist_sq <= radius_sq {
        return f32::INFINITY;
    }
    let cot = 1.0 / half_fov.tan();
    cot * sphere.radius / (dist_sq - radius_sq).sqrt()
}

/// Camera state a host renderer needs to answer culling and coverage queries
#[derive(Clone, Copy, Debug)]
pub struct ViewState {
    pub eye: Vec3,
    /// Half of the vertical field of view, in radians
    pub half_fov: f32,
    pub frustum: Frustum,
}

impl ViewState {
    /// Build from a right-handed look-at camera and perspective projection
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let proj = Mat4::perspective_rh(fov_y, aspect, near, far);
        Self {
            eye,
            half_fov: fov_y * 0.5,
            frustum: Frustum::from_view_projection(&(proj * view)),
        }
    }

    pub fn is_sphere_visible(&self, sphere: &BoundingSphere) -> bool {
        self.frustum.intersects_sphere(sphere)
    }

    pub fn projected_size(&self, sphere: &BoundingSphere) -> f32 {
        projected_sphere_size(self.eye, self.half_fov, sphere)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_view() -> ViewState {
        ViewState::look_at(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_3,
            1.0,
            0.1,
            100.0,
        )
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::Y, 0.0); // XZ plane
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_frustum_contains_point() {
        let view = test_view();
        assert!(view.frustum.contains_point(Vec3::ZERO));
        assert!(!view.frustum.contains_point(Vec3::new(0.0, 0.0, 20.0)));
    }

    #[test]
    fn test_sphere_in_front_visible() {
        let view = test_view();
        assert!(view.is_sphere_visible(&BoundingSphere::new(Vec3::ZERO, 1.0)));
    }

    #[test]
    fn test_sphere_behind_culled() {
        let view = test_view();
        assert!(!view.is_sphere_visible(&BoundingSphere::new(Vec3::new(0.0, 0.0, 30.0), 1.0)));
    }

    #[test]
    fn test_sphere_straddling_plane_visible() {
        let view = test_view();
        // Center is outside the left plane but the radius reaches back in
        let sphere = BoundingSphere::new(Vec3::new(-7.0, 0.0, 0.0), 3.0);
        assert!(view.is_sphere_visible(&sphere));
        let far_left = BoundingSphere::new(Vec3::new(-100.0, 0.0, 0.0), 1.0);
        assert!(!view.is_sphere_visible(&far_left));
    }

    #[test]
    fn test_projected_size_shrinks_with_distance() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 1.0);
        let near = projected_sphere_size(Vec3::new(0.0, 0.0, 5.0), 0.5, &sphere);
        let far = projected_sphere_size(Vec3::new(0.0, 0.0, 50.0), 0.5, &sphere);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn test_projected_size_formula() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 3.0);
        let half_fov = std::f32::consts::FRAC_PI_4; // tan = 1
        let size = projected_sphere_size(Vec3::new(5.0, 0.0, 0.0), half_fov, &sphere);
        // 3 / sqrt(25 - 9) = 0.75
        assert!((size - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_projected_size_inside_sphere() {
        let sphere = BoundingSphere::new(Vec3::ZERO, 10.0);
        let size = projected_sphere_size(Vec3::new(1.0, 0.0, 0.0), 0.5, &sphere);
        assert!(size.is_infinite());
    }
}
