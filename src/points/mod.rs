//! Point samples and buffers

pub mod point;
pub mod buffer;

pub use point::Point;
pub use buffer::PointBuffer;
