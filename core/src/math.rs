//! Math type aliases, bounding volumes and helper functions.
//!
//! All rendering math is `f32` and built on `nalgebra`.

pub use nalgebra;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32). Stored as `[x, y, z, w]` in memory.
pub type Quat = nalgebra::Quaternion<f32>;

/// Axis-aligned bounding box.
///
/// An empty box has `min > max` on every axis; the union of an empty box with
/// any other box is that other box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from its two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create a box from two `[x, y, z]` corners.
    pub fn from_corners(min: [f32; 3], max: [f32; 3]) -> Self {
        Self::new(Vec3::from(min), Vec3::from(max))
    }

    /// The empty box.
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point. Empty for an empty iterator.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        points.into_iter().fold(Self::empty(), |mut acc, p| {
            acc.extend_point(&p);
            acc
        })
    }

    /// Returns true if the box contains no point.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to contain `point`.
    pub fn extend_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns true if `other` lies entirely inside this box.
    pub fn contains(&self, other: &Aabb) -> bool {
        other.is_empty()
            || (self.min.x <= other.min.x
                && self.min.y <= other.min.y
                && self.min.z <= other.min.z
                && self.max.x >= other.max.x
                && self.max.y >= other.max.y
                && self.max.z >= other.max.z)
    }

    /// Center point. Meaningless for an empty box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Size along each axis, zero for an empty box.
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zeros()
        } else {
            self.max - self.min
        }
    }

    /// Box enclosing this box after transformation by `m`.
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let corners = (0..8).map(|i| {
            let x = if i & 1 == 0 { self.min.x } else { self.max.x };
            let y = if i & 2 == 0 { self.min.y } else { self.max.y };
            let z = if i & 4 == 0 { self.min.z } else { self.max.z };
            m.transform_point(&nalgebra::Point3::new(x, y, z)).coords
        });
        Aabb::from_points(corners)
    }

    /// Corners as `[min, max]` arrays, the layout GPU tables expect.
    pub fn to_arrays(&self) -> ([f32; 3], [f32; 3]) {
        (self.min.into(), self.max.into())
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

// ===== Helper functions =====

/// Build a 4x4 TRS matrix from scale, rotation (quaternion), and translation.
pub fn mat4_from_scale_rotation_translation(
    scale: Vec3,
    rotation: Quat,
    translation: Vec3,
) -> Mat4 {
    let r = nalgebra::UnitQuaternion::new_unchecked(rotation);
    let m = r.to_rotation_matrix();
    let rm = m.matrix();
    #[rustfmt::skip]
    let result = Mat4::new(
        rm[(0, 0)] * scale.x, rm[(0, 1)] * scale.y, rm[(0, 2)] * scale.z, translation.x,
        rm[(1, 0)] * scale.x, rm[(1, 1)] * scale.y, rm[(1, 2)] * scale.z, translation.y,
        rm[(2, 0)] * scale.x, rm[(2, 1)] * scale.y, rm[(2, 2)] * scale.z, translation.z,
        0.0,                  0.0,                  0.0,                  1.0,
    );
    result
}

/// Build a translation-only 4x4 matrix.
pub fn mat4_from_translation(t: Vec3) -> Mat4 {
    Mat4::new_translation(&t)
}

/// Create a quaternion from rotation around the Y axis.
pub fn quat_from_rotation_y(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angle).into_inner()
}

/// Build a right-handed orthographic projection with depth range [0, 1].
pub fn orthographic_rh(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rml = right - left;
    let tmb = top - bottom;
    let fmn = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 / rml, 0.0,       0.0,         -(right + left) / rml,
        0.0,       2.0 / tmb, 0.0,         -(top + bottom) / tmb,
        0.0,       0.0,       -1.0 / fmn,  -near / fmn,
        0.0,       0.0,       0.0,          1.0,
    );
    result
}

/// Right-handed look-at view matrix.
pub fn look_at_rh(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
    let eye_point = nalgebra::Point3::from(*eye);
    let target_point = nalgebra::Point3::from(*target);
    nalgebra::Isometry3::look_at_rh(&eye_point, &target_point, up).to_homogeneous()
}

/// Convert a 4x4 matrix to a column-major `[[f32; 4]; 4]` array.
pub fn mat4_to_cols_array_2d(m: &Mat4) -> [[f32; 4]; 4] {
    let s = m.as_slice();
    [
        [s[0], s[1], s[2], s[3]],
        [s[4], s[5], s[6], s[7]],
        [s[8], s[9], s[10], s[11]],
        [s[12], s[13], s[14], s[15]],
    ]
}
