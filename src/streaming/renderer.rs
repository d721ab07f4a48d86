//! Rendering collaborator

use crate::math::BoundingSphere;
use crate::points::PointBuffer;

/// Opaque handle to point data uploaded to the renderer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u64);

/// What one `render` call drew
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub nodes_drawn: u32,
    pub points_drawn: u64,
}

/// Host renderer the streaming controller drives.
///
/// The two geometric queries describe the current camera; `ViewState` in
/// `math::frustum` implements both for a perspective camera.
pub trait Renderer {
    /// Upload a node's points and return a handle for drawing it
    fn add_data(&mut self, points: &PointBuffer) -> RenderHandle;

    /// Release everything held for `handle`
    fn remove_node(&mut self, handle: RenderHandle);

    fn is_sphere_in_frustum(&self, sphere: &BoundingSphere) -> bool;

    /// Screen coverage of `sphere`; `f32::INFINITY` when the eye is inside it
    fn projected_sphere_size(&self, sphere: &BoundingSphere) -> f32;

    /// Draw the given nodes this frame
    fn render(&mut self, handles: &[RenderHandle]) -> RenderStats;
}
