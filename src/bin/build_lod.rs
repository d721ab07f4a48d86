//! LOD builder binary: turns a point cloud into per-node blobs on disk.
//!
//! Usage: cargo run --release --bin build_lod -- [OPTIONS]
//!
//! Options:
//!   --input <FILE>    Raw little-endian `Point` records (44 bytes each).
//!                     Without it a synthetic cloud is generated.
//!   --points <N>      Synthetic cloud size (default: 200000)
//!   --seed <SEED>     Synthetic cloud seed (default: 12345)
//!   --config <FILE>   BuildConfig JSON; missing fields use defaults
//!   --out <DIR>       Output directory (default: "assets/lod/cloud")
//!   --compress        Wrap blobs in LZ4
//!
//! Output structure:
//!   <out>/
//!     root.lod        # Entry point (copy of the root node)
//!     0.lod           # One blob per node id
//!     ...

use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::Instant;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pointlod::core::{Error, Result};
use pointlod::lod::build_lod_tree;
use pointlod::octree::BuildConfig;
use pointlod::points::Point;
use pointlod::streaming::{StoreConfig, save_tree};

#[tokio::main]
async fn main() -> Result<()> {
    pointlod::core::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let input = parse_str_arg(&args, "--input").map(PathBuf::from);
    let count = parse_usize_arg(&args, "--points").unwrap_or(200_000);
    let seed = parse_u64_arg(&args, "--seed").unwrap_or(12345);
    let out = parse_str_arg(&args, "--out").map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets/lod/cloud"));
    let compress = args.iter().any(|a| a == "--compress");

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => BuildConfig::from_json_file(Path::new(&path))?,
        None => BuildConfig::default(),
    };

    println!("=== Point LOD Builder ===");
    println!("Resolution: {}, max depth: {}, split threshold: {}",
        config.resolution, config.max_depth, config.split_threshold());
    println!("Output: {}{}", out.display(), if compress { " (lz4)" } else { "" });
    println!();

    let points = match &input {
        Some(path) => {
            let points = read_points(path)?;
            log::info!("read {} points from {}", points.len(), path.display());
            points
        }
        None => {
            log::info!("generating {} synthetic points (seed {})", count, seed);
            synthetic_cloud(count, seed)
        }
    };
    if points.is_empty() {
        return Err(Error::Build("no input points".to_string()));
    }

    let start = Instant::now();
    let tree = build_lod_tree(&points, &config);
    let build_time = start.elapsed();

    let start = Instant::now();
    let written = save_tree(&out, &tree, StoreConfig { compress }).await?;
    let save_time = start.elapsed();

    println!();
    println!("=== Done ===");
    println!("Input points:  {}", points.len());
    println!("LOD nodes:     {} (depth {})", tree.len(), tree.depth());
    println!("Stored points: {}", tree.total_points());
    println!("Root:          id {} radius {:.3}", tree.root_id(), tree.root().bounding_sphere.radius);
    println!("Build: {:.2}s, save: {:.2}s ({} blobs)",
        build_time.as_secs_f64(), save_time.as_secs_f64(), written);

    Ok(())
}

/// Read a file of packed `Point` records
fn read_points(path: &Path) -> Result<Vec<Point>> {
    let bytes = std::fs::read(path)?;
    let stride = std::mem::size_of::<Point>();
    if bytes.len() % stride != 0 {
        return Err(Error::Build(format!(
            "{}: {} bytes is not a multiple of the {}-byte point record",
            path.display(), bytes.len(), stride
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

/// Noisy shell around a ground plane: varied density and color so every
/// octree level has something to reduce
fn synthetic_cloud(count: usize, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(count);
    for i in 0..count {
        let point = if i % 4 == 0 {
            let p = Vec3::new(rng.gen_range(-50.0..50.0), 0.0, rng.gen_range(-50.0..50.0));
            let shade = 0.3 + 0.2 * rng.r#gen::<f32>();
            Point::new(p, 0.05, Vec3::new(shade, shade * 1.2, shade * 0.8), Vec3::Y)
        } else {
            let theta = rng.r#gen::<f32>() * TAU;
            let z = rng.gen_range(-1.0f32..1.0);
            let r = (1.0 - z * z).sqrt();
            let dir = Vec3::new(r * theta.cos(), z.abs(), r * theta.sin());
            let radius = 20.0 + rng.gen_range(-0.5..0.5);
            let color = Vec3::new(0.8, 0.4 + 0.4 * dir.y, 0.2);
            Point::new(dir * radius, 0.02, color, dir)
        };
        points.push(point);
    }
    points
}

fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
