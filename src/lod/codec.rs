//! Fixed-layout binary codec for a single LOD node
//!
//! Layout (all little-endian, 4-byte words):
//!
//! ```text
//! u32 version (= 1) | u32 id | u32 num_child_ids | u32 num_points
//! f32 center_x | f32 center_y | f32 center_z | f32 radius
//! u32 * num_child_ids            child ids
//! f32 * 3 * num_points           positions
//! f32 * num_points               sizes
//! f32 * 3 * num_points           colors
//! f32 * 3 * num_points           normals
//! ```
//!
//! Each node is an independent blob so trees can be loaded piecewise.
//! Point weights are build-time data and are not written.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use thiserror::Error;

use super::node::LodNode;
use crate::math::BoundingSphere;
use crate::points::PointBuffer;

/// Only layout this codec reads or writes
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header words before the child id list
const HEADER_WORDS: usize = 8;

/// f32 words per point: position(3) + size(1) + color(3) + normal(3)
const WORDS_PER_POINT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unsupported node format version {found} (expected {FORMAT_VERSION})")]
    InvalidVersion { found: u32 },

    #[error("node blob truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("node blob has {extra} trailing bytes")]
    TrailingData { extra: u64 },

    #[error("encoded header is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// Exact blob size for a node with the given counts
pub fn encoded_len(num_child_ids: usize, num_points: usize) -> u64 {
    4 * (HEADER_WORDS as u64 + num_child_ids as u64 + (WORDS_PER_POINT as u64) * num_points as u64)
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_vec3s(buf: &mut Vec<u8>, values: &[Vec3]) {
    for v in values {
        put_f32(buf, v.x);
        put_f32(buf, v.y);
        put_f32(buf, v.z);
    }
}

/// Serialize one node.
///
/// # Panics
/// If the written header length disagrees with the layout, which can only
/// happen through a bug in this function, or if the node's point arrays have
/// mismatched lengths.
pub fn encode(node: &LodNode) -> Vec<u8> {
    let points = &node.points;
    assert!(points.is_consistent(), "node {} has ragged point arrays", node.id);
    let n = points.len();

    let mut buf = Vec::with_capacity(encoded_len(node.child_ids.len(), n) as usize);
    put_u32(&mut buf, FORMAT_VERSION);
    put_u32(&mut buf, node.id);
    put_u32(&mut buf, node.child_ids.len() as u32);
    put_u32(&mut buf, n as u32);
    let sphere = &node.bounding_sphere;
    put_f32(&mut buf, sphere.center.x);
    put_f32(&mut buf, sphere.center.y);
    put_f32(&mut buf, sphere.center.z);
    put_f32(&mut buf, sphere.radius);
    for &id in &node.child_ids {
        put_u32(&mut buf, id);
    }

    let expected = 4 * (HEADER_WORDS + node.child_ids.len()) as u64;
    if buf.len() as u64 != expected {
        panic!("{}", CodecError::SizeMismatch { expected, actual: buf.len() as u64 });
    }

    put_vec3s(&mut buf, &points.positions);
    for &s in &points.sizes {
        put_f32(&mut buf, s);
    }
    put_vec3s(&mut buf, &points.colors);
    put_vec3s(&mut buf, &points.normals);

    debug_assert_eq!(buf.len() as u64, encoded_len(node.child_ids.len(), n));
    buf
}

fn read_vec3s(cursor: &mut Cursor<&[u8]>, count: usize) -> std::io::Result<Vec<Vec3>> {
    let mut flat = vec![0f32; count * 3];
    cursor.read_f32_into::<LittleEndian>(&mut flat)?;
    Ok(flat.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])).collect())
}

/// Parse one node blob. Never panics on malformed input.
pub fn decode(bytes: &[u8]) -> Result<LodNode, CodecError> {
    let actual = bytes.len() as u64;
    let truncated = |expected: u64| CodecError::Truncated { expected, actual };
    let header_len = 4 * HEADER_WORDS as u64;

    let mut cursor = Cursor::new(bytes);
    let version = cursor.read_u32::<LittleEndian>().map_err(|_| truncated(header_len))?;
    if version != FORMAT_VERSION {
        return Err(CodecError::InvalidVersion { found: version });
    }

    let mut header = [0u32; 3];
    cursor
        .read_u32_into::<LittleEndian>(&mut header)
        .map_err(|_| truncated(header_len))?;
    let [id, num_child_ids, num_points] = header;

    let expected = encoded_len(num_child_ids as usize, num_points as usize);
    if actual < expected {
        return Err(truncated(expected));
    }
    if actual > expected {
        return Err(CodecError::TrailingData { extra: actual - expected });
    }

    // Lengths are verified above, so the reads below cannot run short
    let read = |cursor: &mut Cursor<&[u8]>| -> std::io::Result<LodNode> {
        let mut sphere = [0f32; 4];
        cursor.read_f32_into::<LittleEndian>(&mut sphere)?;
        let mut child_ids = vec![0u32; num_child_ids as usize];
        cursor.read_u32_into::<LittleEndian>(&mut child_ids)?;

        let n = num_points as usize;
        let positions = read_vec3s(cursor, n)?;
        let mut sizes = vec![0f32; n];
        cursor.read_f32_into::<LittleEndian>(&mut sizes)?;
        let colors = read_vec3s(cursor, n)?;
        let normals = read_vec3s(cursor, n)?;

        Ok(LodNode {
            id,
            bounding_sphere: BoundingSphere::new(Vec3::new(sphere[0], sphere[1], sphere[2]), sphere[3]),
            points: PointBuffer { positions, sizes, colors, normals, weights: Vec::new() },
            child_ids,
        })
    };
    read(&mut cursor).map_err(|_| truncated(expected))
}
