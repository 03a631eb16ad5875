use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kestrel_core::math::{Aabb, Vec3, mat4_from_scale_rotation_translation, quat_from_rotation_y};
use kestrel_core::mesh::VertexSemantic;
use kestrel_core::mesh::generators::{generate_cylinder, generate_sphere};

// ---------------------------------------------------------------------------
// Mesh generation
// ---------------------------------------------------------------------------

fn bench_generate_sphere_low(c: &mut Criterion) {
    c.bench_function("generate_sphere_16x8", |b| {
        b.iter(|| generate_sphere(black_box(1.0), black_box(16), black_box(8)));
    });
}

fn bench_generate_sphere_high(c: &mut Criterion) {
    c.bench_function("generate_sphere_128x64", |b| {
        b.iter(|| generate_sphere(black_box(1.0), black_box(128), black_box(64)));
    });
}

fn bench_generate_cylinder(c: &mut Criterion) {
    c.bench_function("generate_cylinder_64", |b| {
        b.iter(|| generate_cylinder(black_box(0.5), black_box(1.0), black_box(64)));
    });
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

fn bench_geometry_extents(c: &mut Criterion) {
    let sphere = generate_sphere(1.0, 64, 32);
    c.bench_function("geometry_extents_sphere_64x32", |b| {
        b.iter(|| black_box(sphere.extents()));
    });
}

fn bench_aabb_transformed(c: &mut Criterion) {
    let bounds = Aabb::from_corners([-1.0; 3], [1.0; 3]);
    let transform = mat4_from_scale_rotation_translation(
        Vec3::repeat(2.0),
        quat_from_rotation_y(0.7),
        Vec3::new(3.0, 0.0, -2.0),
    );
    c.bench_function("aabb_transformed", |b| {
        b.iter(|| black_box(bounds).transformed(black_box(&transform)));
    });
}

fn bench_layout_offset_of(c: &mut Criterion) {
    let geometry = generate_sphere(1.0, 8, 4);
    c.bench_function("vertex_layout_offset_of", |b| {
        b.iter(|| geometry.layout().offset_of(black_box(VertexSemantic::Normal)));
    });
}

criterion_group!(
    benches,
    bench_generate_sphere_low,
    bench_generate_sphere_high,
    bench_generate_cylinder,
    bench_geometry_extents,
    bench_aabb_transformed,
    bench_layout_offset_of,
);

criterion_main!(benches);
