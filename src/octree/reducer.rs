//! Grid-based splat merging
//!
//! Partitions a cube into `resolution^3` uniform cells and collapses every
//! occupied cell into a single weighted representative splat. Points are
//! bucketed with an intrusive "next index" chain, so the pass is O(N) with no
//! per-cell allocations.

use glam::{UVec3, Vec3};
use rand::Rng;

use crate::math::Aabb;
use crate::points::PointBuffer;

/// Chain terminator for the per-cell linked lists
const NONE: u32 = u32::MAX;

/// Lower bound on a normal's length before renormalizing
const NORMAL_EPSILON: f32 = 1e-12;

/// Integer cell of `pos` inside `cube`, shifted by `offset` cells.
///
/// Returns the clamped cell and whether clamping moved it by more than one
/// cell (a point that does not belong to this cube at all).
pub fn cell_coord(pos: Vec3, cube: &Aabb, resolution: u32, offset: Vec3) -> (UVec3, bool) {
    let cell_size = cube.max_extent() / resolution as f32;
    let rel = if cell_size > 0.0 {
        (pos - cube.min) / cell_size + offset
    } else {
        Vec3::ZERO
    };
    let max = (resolution - 1) as f32;
    let floored = rel.floor();
    let out_of_range = floored.min_element() < -1.0 || floored.max_element() > max + 1.0;
    let clamped = floored.clamp(Vec3::ZERO, Vec3::splat(max));
    (clamped.as_uvec3(), out_of_range)
}

/// Linear index of a cell coordinate (x fastest)
#[inline]
pub fn linear_cell(cell: UVec3, resolution: u32) -> usize {
    let r = resolution as usize;
    cell.x as usize + r * (cell.y as usize + r * cell.z as usize)
}

/// Merges splat clusters on a uniform subgrid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubgridReducer {
    resolution: u32,
    jitter: bool,
}

impl SubgridReducer {
    pub fn new(resolution: u32) -> Self {
        assert!(resolution > 0, "subgrid resolution must be positive");
        Self { resolution, jitter: false }
    }

    /// Enable the per-call random grid offset for `reduce_jittered`
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Reduce on the unshifted grid
    pub fn reduce(&self, points: &PointBuffer, cube: &Aabb) -> PointBuffer {
        self.reduce_with_offset(points, cube, Vec3::ZERO)
    }

    /// Reduce with one uniform grid offset in `[-0.5, 0.5)` cells drawn from
    /// `rng`, or on the plain grid when jitter is disabled
    pub fn reduce_jittered<R: Rng + ?Sized>(&self, points: &PointBuffer, cube: &Aabb, rng: &mut R) -> PointBuffer {
        let offset = if self.jitter {
            Vec3::new(
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
                rng.gen_range(-0.5..0.5),
            )
        } else {
            Vec3::ZERO
        };
        self.reduce_with_offset(points, cube, offset)
    }

    /// Core pass: bucket, then merge each occupied cell in first-seen order
    pub fn reduce_with_offset(&self, points: &PointBuffer, cube: &Aabb, offset: Vec3) -> PointBuffer {
        let n = points.len();
        if n == 0 {
            return PointBuffer::new();
        }

        let cell_count = (self.resolution as usize).pow(3);
        let mut head = vec![NONE; cell_count];
        let mut next = vec![NONE; n];
        let mut occupied: Vec<u32> = Vec::new();
        let mut stray = 0usize;

        for (i, pos) in points.positions.iter().enumerate() {
            let (cell, out_of_range) = cell_coord(*pos, cube, self.resolution, offset);
            if out_of_range {
                stray += 1;
            }
            let c = linear_cell(cell, self.resolution);
            if head[c] == NONE {
                occupied.push(c as u32);
            }
            next[i] = head[c];
            head[c] = i as u32;
        }

        if stray > 0 {
            log::warn!("{} points fell outside the reduction cube and were clamped", stray);
        }

        let cell_diagonal = cube.max_extent() / self.resolution as f32 * 3f32.sqrt();
        let mut out = PointBuffer::with_capacity(occupied.len());
        for &c in &occupied {
            self.merge_chain(points, &next, head[c as usize], cell_diagonal, &mut out);
        }
        out
    }

    fn merge_chain(&self, points: &PointBuffer, next: &[u32], first: u32, cell_diagonal: f32, out: &mut PointBuffer) {
        let mut weight_sum = 0.0f32;
        let mut position = Vec3::ZERO;
        let mut color = Vec3::ZERO;
        let mut normal = Vec3::ZERO;
        let mut size_sq_sum = 0.0f32;

        let mut i = first;
        while i != NONE {
            let idx = i as usize;
            let w = points.weight(idx);
            weight_sum += w;
            position += points.positions[idx] * w;
            color += points.colors[idx] * w;
            normal += points.normals[idx] * w;
            size_sq_sum += points.sizes[idx] * points.sizes[idx];
            i = next[idx];
        }

        let inv = 1.0 / weight_sum.max(f32::MIN_POSITIVE);
        let position = position * inv;
        let color = color * inv;
        let normal = normal / normal.length().max(NORMAL_EPSILON);

        // Footprint: farthest splat edge from the merged center
        let mut reach = 0.0f32;
        let mut i = first;
        while i != NONE {
            let idx = i as usize;
            reach = reach.max(position.distance(points.positions[idx]) + points.sizes[idx] * 0.5);
            i = next[idx];
        }

        let size = size_sq_sum.sqrt().min(2.0 * reach).min(cell_diagonal);

        out.positions.push(position);
        out.sizes.push(size);
        out.colors.push(color);
        out.normals.push(normal);
        out.weights.push(weight_sum);
    }
}
