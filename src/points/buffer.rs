//! Parallel-array point storage

use glam::Vec3;

use super::point::Point;

/// Struct-of-arrays splat storage.
///
/// `weights` may be empty, meaning every point has weight 1 (decoded
/// buffers never carry weights).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointBuffer {
    pub positions: Vec<Vec3>,
    pub sizes: Vec<f32>,
    pub colors: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub weights: Vec<f32>,
}

impl PointBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            sizes: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
            weights: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append one point. Weights are always recorded once any point is pushed.
    pub fn push(&mut self, point: &Point) {
        if self.weights.len() != self.positions.len() {
            // Fill implicit unit weights before mixing in explicit ones
            self.weights.resize(self.positions.len(), 1.0);
        }
        self.positions.push(point.position());
        self.sizes.push(point.size);
        self.colors.push(point.color());
        self.normals.push(point.normal());
        self.weights.push(point.weight);
    }

    pub fn extend_from(&mut self, other: &PointBuffer) {
        for i in 0..other.len() {
            self.push(&other.get(i));
        }
    }

    /// Weight of point `i`, 1 when weights were not recorded
    pub fn weight(&self, i: usize) -> f32 {
        self.weights.get(i).copied().unwrap_or(1.0)
    }

    /// Sum of all weights (the number of raw samples represented)
    pub fn total_weight(&self) -> f64 {
        (0..self.len()).map(|i| self.weight(i) as f64).sum()
    }

    /// Reassemble point `i`
    pub fn get(&self, i: usize) -> Point {
        Point {
            position: self.positions[i].to_array(),
            size: self.sizes[i],
            color: self.colors[i].to_array(),
            normal: self.normals[i].to_array(),
            weight: self.weight(i),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// Drop all points and release the allocation
    pub fn release(&mut self) {
        *self = Self::default();
    }

    /// Parallel arrays agree in length (weights may be omitted)
    pub fn is_consistent(&self) -> bool {
        let n = self.positions.len();
        self.sizes.len() == n
            && self.colors.len() == n
            && self.normals.len() == n
            && (self.weights.is_empty() || self.weights.len() == n)
    }
}

impl FromIterator<Point> for PointBuffer {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        let mut buffer = PointBuffer::new();
        for p in iter {
            buffer.push(&p);
        }
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut buf = PointBuffer::new();
        let p = Point::new(Vec3::new(1.0, 2.0, 3.0), 0.1, Vec3::X, Vec3::Y).with_weight(3.0);
        buf.push(&p);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.get(0), p);
        assert!(buf.is_consistent());
    }

    #[test]
    fn test_implicit_unit_weights() {
        let buf = PointBuffer {
            positions: vec![Vec3::ZERO, Vec3::ONE],
            sizes: vec![0.1, 0.1],
            colors: vec![Vec3::ONE; 2],
            normals: vec![Vec3::Y; 2],
            weights: Vec::new(),
        };
        assert!(buf.is_consistent());
        assert_eq!(buf.weight(1), 1.0);
        assert_eq!(buf.total_weight(), 2.0);
    }

    #[test]
    fn test_push_after_implicit_weights() {
        let mut buf = PointBuffer {
            positions: vec![Vec3::ZERO],
            sizes: vec![0.1],
            colors: vec![Vec3::ONE],
            normals: vec![Vec3::Y],
            weights: Vec::new(),
        };
        buf.push(&Point::at(Vec3::ONE).with_weight(4.0));
        assert_eq!(buf.weights, vec![1.0, 4.0]);
        assert_eq!(buf.total_weight(), 5.0);
    }

    #[test]
    fn test_release() {
        let mut buf: PointBuffer = (0..10).map(|i| Point::at(Vec3::splat(i as f32))).collect();
        assert_eq!(buf.len(), 10);
        buf.release();
        assert!(buf.is_empty());
        assert_eq!(buf.positions.capacity(), 0);
    }
}
