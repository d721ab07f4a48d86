//! Single splat sample

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One splat: position, world-space diameter, linear RGB color, unit normal
/// and the number of raw samples it stands for.
///
/// 44 bytes, `Pod` so raw inputs can be cast straight from byte buffers.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Point {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 3],
    pub normal: [f32; 3],
    /// Raw samples absorbed into this one (1 for input data)
    pub weight: f32,
}

impl Point {
    /// Raw input sample with weight 1
    pub fn new(position: Vec3, size: f32, color: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            size,
            color: color.to_array(),
            normal: normal.to_array(),
            weight: 1.0,
        }
    }

    /// Sample at `position` with default size, mid-grey color and +Y normal
    pub fn at(position: Vec3) -> Self {
        Self::new(position, 0.01, Vec3::splat(0.5), Vec3::Y)
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_array(self.color)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<Point>(), 44);
    }

    #[test]
    fn test_cast_from_bytes() {
        let p = Point::new(Vec3::new(1.0, 2.0, 3.0), 0.5, Vec3::ONE, Vec3::Z);
        let bytes = bytemuck::bytes_of(&p);
        let back: &Point = bytemuck::from_bytes(bytes);
        assert_eq!(*back, p);
        assert_eq!(back.weight, 1.0);
    }
}
