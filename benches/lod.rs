use criterion::{criterion_group, criterion_main, Criterion, black_box};

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pointlod::lod::{build_lod_tree, decode, encode};
use pointlod::math::Aabb;
use pointlod::octree::{BuildConfig, SubgridReducer};
use pointlod::points::{Point, PointBuffer};

fn random_cloud(count: usize, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let p = Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            );
            Point::new(p, 0.02, Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen()), Vec3::Y)
        })
        .collect()
}

fn bench_build_lod_tree(c: &mut Criterion) {
    let points = random_cloud(50_000, 1);
    let config = BuildConfig { resolution: 8, ..Default::default() };

    c.bench_function("build_lod_tree_50k", |b| {
        b.iter(|| build_lod_tree(black_box(&points), black_box(&config)));
    });
}

fn bench_reduce(c: &mut Criterion) {
    let buffer: PointBuffer = random_cloud(20_000, 2).into_iter().collect();
    let cube = Aabb::new(Vec3::splat(-10.0), Vec3::splat(10.0));

    let reducer = SubgridReducer::new(16);
    c.bench_function("reduce_20k_res16", |b| {
        b.iter(|| reducer.reduce(black_box(&buffer), black_box(&cube)));
    });

    let jittered = SubgridReducer::new(16).with_jitter(true);
    let mut rng = StdRng::seed_from_u64(3);
    c.bench_function("reduce_jittered_20k_res16", |b| {
        b.iter(|| jittered.reduce_jittered(black_box(&buffer), black_box(&cube), &mut rng));
    });
}

fn bench_codec(c: &mut Criterion) {
    let points = random_cloud(20_000, 4);
    let tree = build_lod_tree(&points, &BuildConfig { resolution: 16, ..Default::default() });
    let root = tree.root();
    let blob = encode(root);

    c.bench_function("encode_root", |b| {
        b.iter(|| encode(black_box(root)));
    });

    c.bench_function("decode_root", |b| {
        b.iter(|| decode(black_box(&blob)));
    });
}

criterion_group!(
    benches,
    bench_build_lod_tree,
    bench_reduce,
    bench_codec,
);
criterion_main!(benches);
