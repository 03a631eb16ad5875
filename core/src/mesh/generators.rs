//! Procedural geometry generators.
//!
//! These generators produce [`CpuGeometry`] values with the
//! `position_normal` layout and `u32` triangle-list indices. They are the
//! in-process geometry source used by the demo and by tests.

use std::f32::consts::PI;

use super::data::{CpuGeometry, VertexLayout};

fn push_vertex(vertices: &mut Vec<f32>, position: [f32; 3], normal: [f32; 3]) {
    vertices.extend_from_slice(&position);
    vertices.extend_from_slice(&normal);
}

/// Generate a single triangle in the XY plane.
pub fn generate_triangle(size: f32) -> CpuGeometry {
    let mut vertices = Vec::with_capacity(18);
    let n = [0.0, 0.0, 1.0];
    push_vertex(&mut vertices, [0.0, size, 0.0], n);
    push_vertex(&mut vertices, [-size, -size, 0.0], n);
    push_vertex(&mut vertices, [size, -size, 0.0], n);
    CpuGeometry::new(VertexLayout::position_normal(), vertices, vec![0, 1, 2])
        .with_label("triangle")
}

/// Generate a flat regular polygon (a fan around the center) in the XY plane.
///
/// `sides` is clamped to at least 3.
pub fn generate_polygon(radius: f32, sides: u32) -> CpuGeometry {
    let sides = sides.max(3);
    let n = [0.0, 0.0, 1.0];
    let mut vertices = Vec::with_capacity((sides as usize + 1) * 6);
    let mut indices = Vec::with_capacity(sides as usize * 3);

    push_vertex(&mut vertices, [0.0, 0.0, 0.0], n);
    for i in 0..sides {
        let angle = PI * 0.5 + i as f32 * 2.0 * PI / sides as f32;
        push_vertex(
            &mut vertices,
            [angle.cos() * radius, angle.sin() * radius, 0.0],
            n,
        );
    }
    for i in 0..sides {
        indices.extend_from_slice(&[0, 1 + i, 1 + (i + 1) % sides]);
    }

    CpuGeometry::new(VertexLayout::position_normal(), vertices, indices).with_label("polygon")
}

/// Generate a pentagon.
pub fn generate_pentagon(radius: f32) -> CpuGeometry {
    generate_polygon(radius, 5).with_label("pentagon")
}

/// Generate an axis-aligned cube centered at the origin.
///
/// Each face has its own four vertices so normals stay flat.
pub fn generate_cube(half_extent: f32) -> CpuGeometry {
    let h = half_extent;
    #[rustfmt::skip]
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([ 1.0, 0.0, 0.0], [[ h, -h, -h], [ h,  h, -h], [ h,  h,  h], [ h, -h,  h]]),
        ([-1.0, 0.0, 0.0], [[-h, -h,  h], [-h,  h,  h], [-h,  h, -h], [-h, -h, -h]]),
        ([ 0.0, 1.0, 0.0], [[-h,  h, -h], [-h,  h,  h], [ h,  h,  h], [ h,  h, -h]]),
        ([ 0.0,-1.0, 0.0], [[-h, -h,  h], [-h, -h, -h], [ h, -h, -h], [ h, -h,  h]]),
        ([ 0.0, 0.0, 1.0], [[-h, -h,  h], [ h, -h,  h], [ h,  h,  h], [-h,  h,  h]]),
        ([ 0.0, 0.0,-1.0], [[ h, -h, -h], [-h, -h, -h], [-h,  h, -h], [ h,  h, -h]]),
    ];

    let mut vertices = Vec::with_capacity(24 * 6);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, corners)) in faces.iter().enumerate() {
        let base = face as u32 * 4;
        for corner in corners {
            push_vertex(&mut vertices, *corner, *normal);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    CpuGeometry::new(VertexLayout::position_normal(), vertices, indices).with_label("cube")
}

/// Generate a UV sphere.
///
/// # Arguments
///
/// * `radius` - Sphere radius
/// * `segments` - Number of longitudinal segments (around the equator)
/// * `rings` - Number of latitudinal rings (from pole to pole)
pub fn generate_sphere(radius: f32, segments: u32, rings: u32) -> CpuGeometry {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize * 6);
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

    for ring in 0..=rings {
        let theta = ring as f32 * PI / rings as f32;
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        for segment in 0..=segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            let x = sin_theta * phi.cos();
            let y = cos_theta;
            let z = sin_theta * phi.sin();
            push_vertex(&mut vertices, [x * radius, y * radius, z * radius], [x, y, z]);
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    CpuGeometry::new(VertexLayout::position_normal(), vertices, indices).with_label("sphere")
}

/// Generate a capped cylinder along the Y axis.
pub fn generate_cylinder(radius: f32, height: f32, segments: u32) -> CpuGeometry {
    let segments = segments.max(3);
    let half = height * 0.5;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // Side wall: two vertices per segment boundary.
    for segment in 0..=segments {
        let phi = segment as f32 * 2.0 * PI / segments as f32;
        let (x, z) = (phi.cos(), phi.sin());
        push_vertex(&mut vertices, [x * radius, -half, z * radius], [x, 0.0, z]);
        push_vertex(&mut vertices, [x * radius, half, z * radius], [x, 0.0, z]);
    }
    for segment in 0..segments {
        let b = segment * 2;
        indices.extend_from_slice(&[b, b + 1, b + 2, b + 2, b + 1, b + 3]);
    }

    // Caps.
    for (y, ny) in [(half, 1.0), (-half, -1.0)] {
        let center = (vertices.len() / 6) as u32;
        push_vertex(&mut vertices, [0.0, y, 0.0], [0.0, ny, 0.0]);
        for segment in 0..segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            push_vertex(
                &mut vertices,
                [phi.cos() * radius, y, phi.sin() * radius],
                [0.0, ny, 0.0],
            );
        }
        for segment in 0..segments {
            let a = center + 1 + segment;
            let b = center + 1 + (segment + 1) % segments;
            if ny > 0.0 {
                indices.extend_from_slice(&[center, b, a]);
            } else {
                indices.extend_from_slice(&[center, a, b]);
            }
        }
    }

    CpuGeometry::new(VertexLayout::position_normal(), vertices, indices).with_label("cylinder")
}
