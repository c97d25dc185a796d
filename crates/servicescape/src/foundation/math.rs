//! Math utilities and types
//!
//! Provides the vector, matrix and quaternion aliases used across the crate,
//! plus the cached [`Transform`] that every scene node and entity owns.

use std::cell::Cell;

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion, Rotation3,
    Unit,
};
use thiserror::Error;

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = nalgebra::UnitQuaternion<f32>;

/// Basis vectors shorter than this are treated as degenerate
const BASIS_EPSILON: f32 = 1e-6;

/// Errors raised by transform operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    /// `look_at` was asked for a basis whose forward vector is zero or
    /// parallel to the up vector
    #[error("degenerate look-at basis: forward is zero or parallel to up")]
    DegenerateBasis,
}

/// Local position, rotation and scale with a lazily rebuilt matrix
///
/// Every mutator marks the cached matrix dirty. [`Transform::matrix`] rebuilds
/// it on the next read as `T * R * S` and clears the flag. The cache lives in
/// a [`Cell`] so reads work through a shared reference.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    matrix: Cell<Mat4>,
    dirty: Cell<bool>,
    revision: u64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            matrix: Cell::new(Mat4::identity()),
            dirty: Cell::new(false),
            revision: 0,
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.rotation == other.rotation
            && self.scale == other.scale
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        let mut transform = Self::default();
        transform.set_position(position);
        transform
    }

    /// Create a transform with position, rotation and scale
    pub fn from_parts(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        let mut transform = Self::default();
        transform.position = position;
        transform.rotation = rotation;
        transform.scale = scale;
        transform.mark_dirty();
        transform
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Whether the cached matrix needs rebuilding
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Counter bumped by every mutation; lets owners detect changes made
    /// through a `&mut Transform` they handed out.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the position
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.mark_dirty();
    }

    /// Replace the rotation
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
        self.mark_dirty();
    }

    /// Replace the scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.mark_dirty();
    }

    /// Offset the position by `delta`
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
        self.mark_dirty();
    }

    /// Pre-multiply the current rotation: `rotation = q * rotation`
    pub fn rotate(&mut self, q: Quat) {
        self.rotation = q * self.rotation;
        self.mark_dirty();
    }

    /// Apply an incremental rotation built from Euler angles (radians)
    pub fn rotate_euler(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.rotate(euler_quat(pitch, yaw, roll));
    }

    /// Replace the rotation with one built from Euler angles (radians)
    pub fn set_rotation_from_euler(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.set_rotation(euler_quat(pitch, yaw, roll));
    }

    /// Orient the transform so its local -Z axis points at `target`
    ///
    /// Fails with [`TransformError::DegenerateBasis`] when `target` coincides
    /// with the position or the view direction is parallel to `up`; the
    /// transform is left unchanged in that case.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) -> Result<(), TransformError> {
        let to_target = target - self.position;
        if to_target.norm() < BASIS_EPSILON {
            return Err(TransformError::DegenerateBasis);
        }
        let forward = to_target.normalize();
        let side = forward.cross(&up);
        if side.norm() < BASIS_EPSILON {
            return Err(TransformError::DegenerateBasis);
        }
        let right = side.normalize();
        let camera_up = right.cross(&forward);

        // Columns are the local X, Y, Z axes expressed in parent space
        let basis = Rotation3::from_basis_unchecked(&[right, camera_up, -forward]);
        self.set_rotation(Quat::from_rotation_matrix(&basis));
        Ok(())
    }

    /// Local forward direction (-Z rotated into parent space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 0.0, -1.0)
    }

    /// Local right direction (+X rotated into parent space)
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::x()
    }

    /// Local up direction (+Y rotated into parent space)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// Cached `T * R * S` matrix, rebuilt only when dirty
    pub fn matrix(&self) -> Mat4 {
        if self.dirty.get() {
            let matrix = Mat4::new_translation(&self.position)
                * self.rotation.to_homogeneous()
                * Mat4::new_nonuniform_scaling(&self.scale);
            self.matrix.set(matrix);
            self.dirty.set(false);
        }
        self.matrix.get()
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.matrix().transform_point(&point)
    }

    /// Interpolate between two transforms
    ///
    /// Position and scale are interpolated linearly, rotation by normalized
    /// lerp along the shorter arc. `t` is not clamped.
    pub fn lerp(a: &Transform, b: &Transform, t: f32) -> Transform {
        let from = a.rotation.quaternion();
        let mut to = *b.rotation.quaternion();
        if from.coords.dot(&to.coords) < 0.0 {
            to = -to;
        }
        let blended = from.lerp(&to, t);
        let rotation = if blended.norm() < BASIS_EPSILON {
            a.rotation
        } else {
            Quat::new_normalize(blended)
        };

        Transform::from_parts(
            a.position.lerp(&b.position, t),
            rotation,
            a.scale.lerp(&b.scale, t),
        )
    }

    fn mark_dirty(&mut self) {
        self.dirty.set(true);
        self.revision = self.revision.wrapping_add(1);
    }
}

/// Build `Rz(roll) * Ry(yaw) * Rx(pitch)`
pub fn euler_quat(pitch: f32, yaw: f32, roll: f32) -> Quat {
    let rx = Quat::from_axis_angle(&Vec3::x_axis(), pitch);
    let ry = Quat::from_axis_angle(&Vec3::y_axis(), yaw);
    let rz = Quat::from_axis_angle(&Vec3::z_axis(), roll);
    rz * ry * rx
}

/// Translation column of an affine matrix
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Math utility functions
pub mod utils {
    use std::f32::consts::PI;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * PI / 180.0
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * 180.0 / PI
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with view and projection constructors
///
/// All constructors target a right-handed view space looking down -Z and a
/// clip-space depth range of `[0, 1]`.
pub trait Mat4Ext {
    /// Create a perspective projection matrix
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        // P = [1/(a·tan(φ/2))  0            0            0          ]
        //     [0               1/tan(φ/2)   0            0          ]
        //     [0               0            f/(n-f)      nf/(n-f)   ]
        //     [0               0            -1           0          ]
        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = (near * far) / (near - far);
        result[(3, 2)] = -1.0;
        result
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / (right - left);
        result[(1, 1)] = 2.0 / (top - bottom);
        result[(2, 2)] = -1.0 / (far - near);
        result[(0, 3)] = -(right + left) / (right - left);
        result[(1, 3)] = -(top + bottom) / (top - bottom);
        result[(2, 3)] = -near / (far - near);
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new_translation(&-eye);

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_identity_defaults() {
        let transform = Transform::identity();
        assert_eq!(transform.position(), Vec3::zeros());
        assert_eq!(transform.scale(), Vec3::new(1.0, 1.0, 1.0));
        assert!(!transform.is_dirty());
        assert_relative_eq!(transform.matrix(), Mat4::identity());
    }

    #[test]
    fn test_mutators_mark_dirty_and_matrix_clears() {
        let mut transform = Transform::identity();
        transform.translate(Vec3::new(1.0, 2.0, 3.0));
        assert!(transform.is_dirty());

        let matrix = transform.matrix();
        assert!(!transform.is_dirty());
        assert_relative_eq!(translation_of(&matrix), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_matrix_is_trs() {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2);
        let transform = Transform::from_parts(
            Vec3::new(5.0, 0.0, 0.0),
            rotation,
            Vec3::new(2.0, 2.0, 2.0),
        );

        // Scale first, then rotate +X onto -Z, then translate
        let p = transform.transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Point3::new(5.0, 0.0, -2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_premultiplies() {
        let mut transform = Transform::identity();
        let first = Quat::from_axis_angle(&Vec3::x_axis(), 0.3);
        let second = Quat::from_axis_angle(&Vec3::y_axis(), 0.7);
        transform.set_rotation(first);
        transform.rotate(second);
        assert_relative_eq!(transform.rotation(), second * first, epsilon = 1e-6);
    }

    #[test]
    fn test_euler_order() {
        let mut transform = Transform::identity();
        transform.set_rotation_from_euler(0.1, 0.2, 0.3);
        let expected = Quat::from_axis_angle(&Vec3::z_axis(), 0.3)
            * Quat::from_axis_angle(&Vec3::y_axis(), 0.2)
            * Quat::from_axis_angle(&Vec3::x_axis(), 0.1);
        assert_relative_eq!(transform.rotation(), expected, epsilon = 1e-6);

        transform.rotate_euler(0.0, 0.5, 0.0);
        let expected = Quat::from_axis_angle(&Vec3::y_axis(), 0.5) * expected;
        assert_relative_eq!(transform.rotation(), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_look_at_faces_target() {
        let mut transform = Transform::from_position(Vec3::new(0.0, 0.0, 0.0));
        transform.look_at(Vec3::new(10.0, 0.0, 0.0), Vec3::y()).unwrap();
        assert_relative_eq!(transform.forward(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(transform.up(), Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_degenerate_is_rejected() {
        let mut transform = Transform::identity();
        let before = transform.rotation();
        assert_eq!(
            transform.look_at(Vec3::new(0.0, 5.0, 0.0), Vec3::y()),
            Err(TransformError::DegenerateBasis)
        );
        assert_eq!(
            transform.look_at(Vec3::zeros(), Vec3::y()),
            Err(TransformError::DegenerateBasis)
        );
        assert_eq!(transform.rotation(), before);
    }

    #[test]
    fn test_lerp_does_not_clamp() {
        let a = Transform::from_position(Vec3::zeros());
        let b = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));

        let mid = Transform::lerp(&a, &b, 0.5);
        assert_relative_eq!(mid.position(), Vec3::new(5.0, 0.0, 0.0));

        let beyond = Transform::lerp(&a, &b, 1.5);
        assert_relative_eq!(beyond.position(), Vec3::new(15.0, 0.0, 0.0));
    }

    #[test]
    fn test_lerp_rotation_endpoints() {
        let a = Transform::from_parts(Vec3::zeros(), Quat::identity(), Vec3::new(1.0, 1.0, 1.0));
        let target = Quat::from_axis_angle(&Vec3::y_axis(), 1.0);
        let b = Transform::from_parts(Vec3::zeros(), target, Vec3::new(3.0, 3.0, 3.0));

        let end = Transform::lerp(&a, &b, 1.0);
        assert_relative_eq!(end.rotation(), target, epsilon = 1e-5);
        assert_relative_eq!(end.scale(), Vec3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_perspective_depth_range() {
        let projection = Mat4::perspective(FRAC_PI_2, 1.0, 1.0, 100.0);
        let near = projection * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_depth_range() {
        let projection = Mat4::orthographic(-1.0, 1.0, -1.0, 1.0, 0.5, 10.0);
        let near = projection * Vec4::new(1.0, -1.0, -0.5, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -10.0, 1.0);
        assert_relative_eq!(near, Vec4::new(1.0, -1.0, 0.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }
}
