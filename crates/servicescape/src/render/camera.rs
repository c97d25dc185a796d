//! # 3D Camera System
//!
//! Camera abstraction producing view and projection matrices for the external
//! renderer and for visibility queries.
//!
//! ## Design Principles
//! - **Library-agnostic**: No graphics API dependencies in camera math
//! - **Lazy**: View and projection matrices are cached behind independent
//!   dirty flags and rebuilt on the next read after a relevant change
//! - **Read-only queries**: Matrix getters take `&self`; caches use [`Cell`]

use std::cell::Cell;

use crate::foundation::math::{Vec3, Mat4, Mat4Ext, utils};

/// Projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        /// Aspect ratio (width / height)
        aspect: f32,
        /// Distance to near clipping plane
        near: f32,
        /// Distance to far clipping plane
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Left clipping plane
        left: f32,
        /// Right clipping plane
        right: f32,
        /// Bottom clipping plane
        bottom: f32,
        /// Top clipping plane
        top: f32,
        /// Distance to near clipping plane
        near: f32,
        /// Distance to far clipping plane
        far: f32,
    },
}

impl Projection {
    fn to_matrix(self) -> Mat4 {
        match self {
            Self::Perspective { fov_y, aspect, near, far } => {
                Mat4::perspective(fov_y, aspect, near, far)
            }
            Self::Orthographic { left, right, bottom, top, near, far } => {
                Mat4::orthographic(left, right, bottom, top, near, far)
            }
        }
    }
}

/// 3D Camera for perspective and orthographic projections
///
/// # Coordinate System
/// Right-handed, Y-up view space with the camera looking down -Z. Clip-space
/// depth maps the near plane to 0 and the far plane to 1.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    target: Vec3,
    up: Vec3,
    projection: Projection,

    view_matrix: Cell<Mat4>,
    view_dirty: Cell<bool>,
    projection_matrix: Cell<Mat4>,
    projection_dirty: Cell<bool>,
}

impl Camera {
    /// Create a new perspective camera with standard Y-up orientation
    ///
    /// # Arguments
    /// * `position` - Camera position in world space
    /// * `fov_degrees` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height) of the viewport
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    ///
    /// The camera initially looks at the origin with +Y as up.
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::with_projection(
            position,
            Projection::Perspective {
                fov_y: utils::deg_to_rad(fov_degrees),
                aspect,
                near,
                far,
            },
        )
    }

    /// Create a new orthographic camera looking at the origin
    pub fn orthographic(
        position: Vec3,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self::with_projection(
            position,
            Projection::Orthographic { left, right, bottom, top, near, far },
        )
    }

    /// Create a camera from explicit projection parameters
    pub fn with_projection(position: Vec3, projection: Projection) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::y(),
            projection,
            view_matrix: Cell::new(Mat4::identity()),
            view_dirty: Cell::new(true),
            projection_matrix: Cell::new(Mat4::identity()),
            projection_dirty: Cell::new(true),
        }
    }

    /// Camera position in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Point the camera looks at
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Up vector
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Current projection parameters
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Update camera position in world space
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.view_dirty.set(true);
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Update camera target (look-at point)
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.view_dirty.set(true);
        log::trace!("Camera target updated to: {:?}", target);
    }

    /// Update the up vector
    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
        self.view_dirty.set(true);
    }

    /// Set target and up vector together
    ///
    /// The up vector does not need to be perpendicular to the view direction,
    /// but must not be parallel to it.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        self.view_dirty.set(true);
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Replace the projection parameters
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
        self.projection_dirty.set(true);
    }

    /// Switch to a perspective projection (field of view in degrees)
    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.set_projection(Projection::Perspective {
            fov_y: utils::deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        });
    }

    /// Switch to an orthographic projection
    pub fn set_orthographic(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.set_projection(Projection::Orthographic { left, right, bottom, top, near, far });
    }

    /// Update camera aspect ratio for viewport changes
    ///
    /// Only affects perspective projections. Logs changes larger than 0.01 to
    /// keep resize storms quiet.
    pub fn set_aspect_ratio(&mut self, new_aspect: f32) {
        if let Projection::Perspective { aspect, .. } = &mut self.projection {
            if (*aspect - new_aspect).abs() > 0.01 {
                log::info!("Camera aspect ratio changed: {:.3} -> {:.3}", *aspect, new_aspect);
            }
            *aspect = new_aspect;
            self.projection_dirty.set(true);
        }
    }

    /// Whether the view matrix will be rebuilt on the next read
    pub fn is_view_dirty(&self) -> bool {
        self.view_dirty.get()
    }

    /// Whether the projection matrix will be rebuilt on the next read
    pub fn is_projection_dirty(&self) -> bool {
        self.projection_dirty.get()
    }

    /// World-to-view matrix, rebuilt only after position/target/up changes
    pub fn view_matrix(&self) -> Mat4 {
        if self.view_dirty.get() {
            self.view_matrix.set(Mat4::look_at(self.position, self.target, self.up));
            self.view_dirty.set(false);
        }
        self.view_matrix.get()
    }

    /// View-to-clip matrix, rebuilt only after projection changes
    pub fn projection_matrix(&self) -> Mat4 {
        if self.projection_dirty.get() {
            self.projection_matrix.set(self.projection.to_matrix());
            self.projection_dirty.set(false);
        }
        self.projection_matrix.get()
    }

    /// Combined `P * V` matrix used for frustum tests
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

impl Default for Camera {
    /// Perspective camera above and behind the origin: position (0, 3, 3),
    /// 45 degree FOV, 16:9, near 0.1, far 1000
    fn default() -> Self {
        Self::with_projection(
            Vec3::new(0.0, 3.0, 3.0),
            Projection::Perspective {
                fov_y: std::f32::consts::FRAC_PI_4,
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 1000.0,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_moves_world_into_camera_space() {
        let mut camera = Camera::perspective(Vec3::new(0.0, 0.0, 10.0), 60.0, 1.0, 0.1, 100.0);
        camera.set_target(Vec3::zeros());

        let origin = camera.view_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(origin, Vec4::new(0.0, 0.0, -10.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_view_and_projection_dirty_independently() {
        let mut camera = Camera::default();
        let _ = camera.view_projection_matrix();
        assert!(!camera.is_view_dirty());
        assert!(!camera.is_projection_dirty());

        camera.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(camera.is_view_dirty());
        assert!(!camera.is_projection_dirty());
        let _ = camera.view_matrix();
        assert!(!camera.is_view_dirty());

        camera.set_aspect_ratio(1.0);
        assert!(camera.is_projection_dirty());
        assert!(!camera.is_view_dirty());
    }

    #[test]
    fn test_cached_matrix_reflects_changes() {
        let mut camera = Camera::default();
        let before = camera.projection_matrix();
        camera.set_perspective(90.0, 1.0, 0.5, 50.0);
        let after = camera.projection_matrix();
        assert!(before != after);
        assert_relative_eq!(after, Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.5, 50.0));
    }

    #[test]
    fn test_aspect_ignored_for_orthographic() {
        let mut camera = Camera::orthographic(Vec3::new(0.0, 0.0, 5.0), -1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        let _ = camera.projection_matrix();
        camera.set_aspect_ratio(2.0);
        assert!(!camera.is_projection_dirty());
    }
}
