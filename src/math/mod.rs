//! Geometric primitives used by the build and streaming sides

pub mod aabb;
pub mod sphere;
pub mod frustum;

pub use aabb::Aabb;
pub use sphere::BoundingSphere;
pub use frustum::{Plane, Frustum, ViewState, projected_sphere_size};
