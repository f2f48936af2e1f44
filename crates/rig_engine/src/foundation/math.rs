//! Math utilities and types
//!
//! Provides the fundamental math types used by the handle-based resource layer and the
//! skeletal animation runtime.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Column-major 4x4 matrix laid out the way shaders read it
pub type SkinMatrix = [[f32; 4]; 4];

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform from a translation vector
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (T * R * S)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Create a transform from a TRS transformation matrix
    ///
    /// Degenerate axes (zero scale) keep an identity rotation contribution instead of
    /// producing NaNs.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        if scale_x <= f32::EPSILON || scale_y <= f32::EPSILON || scale_z <= f32::EPSILON {
            return Self {
                position,
                rotation: Quat::identity(),
                scale,
            };
        }

        let rotation_matrix = Mat3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Blend two transforms: lerp for position and scale, shortest-arc slerp for rotation
    pub fn blend(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            position: lerp_vec3(&a.position, &b.position, t),
            rotation: slerp_shortest(&a.rotation, &b.rotation, t),
            scale: lerp_vec3(&a.scale, &b.scale, t),
        }
    }
}

/// Convert a matrix to the column-major array layout used for GPU upload
pub fn to_skin_matrix(matrix: &Mat4) -> SkinMatrix {
    (*matrix).into()
}

/// Component-wise linear interpolation of two vectors
pub fn lerp_vec3(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
    a + (b - a) * t
}

/// Build a unit quaternion from raw `x, y, z, w` coordinates
///
/// Zero-length input yields the identity rotation.
pub fn quat_from_coords(coords: &Vec4) -> Quat {
    let quaternion = Quaternion::from(*coords);
    if quaternion.norm_squared() <= f32::EPSILON {
        return Quat::identity();
    }
    Quat::new_normalize(quaternion)
}

/// Spherical linear interpolation along the shortest arc
///
/// Nearly parallel rotations fall back to normalized lerp.
pub fn slerp_shortest(a: &Quat, b: &Quat, t: f32) -> Quat {
    let target = if a.coords.dot(&b.coords) < 0.0 {
        Quat::new_unchecked(-b.into_inner())
    } else {
        *b
    };

    a.try_slerp(&target, t, 1.0e-6).unwrap_or_else(|| {
        let blended = a.coords + (target.coords - a.coords) * t;
        quat_from_coords(&blended)
    })
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

/// Math utility functions
pub mod utils {
    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}
