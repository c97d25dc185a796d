//! Point-in-frustum classification
//!
//! Visibility is decided in clip space: a world point is multiplied by the
//! view-projection matrix, rejected when `w <= 0` (behind the eye or
//! degenerate), divided by `w`, and accepted iff the resulting NDC lies in
//! `|x| <= 1`, `|y| <= 1`, `0 <= z <= 1`.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::Camera;

/// Project a world-space point to normalized device coordinates
///
/// Returns `None` when the clip-space `w` is not positive.
pub fn project_to_ndc(view_projection: &Mat4, point: &Vec3) -> Option<Vec3> {
    let clip = view_projection * Vec4::new(point.x, point.y, point.z, 1.0);
    if clip.w <= 0.0 {
        return None;
    }
    Some(Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w))
}

/// Whether an NDC point lies inside the canonical view volume
pub fn ndc_inside(ndc: &Vec3) -> bool {
    ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && (0.0..=1.0).contains(&ndc.z)
}

/// Whether a world-space point is inside the frustum described by
/// `view_projection`
pub fn point_in_frustum(view_projection: &Mat4, point: &Vec3) -> bool {
    project_to_ndc(view_projection, point).is_some_and(|ndc| ndc_inside(&ndc))
}

/// Frustum snapshot taken from a camera
///
/// Holds the view-projection matrix so many points can be tested without
/// re-reading the camera.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    view_projection: Mat4,
}

impl Frustum {
    /// Wrap an explicit view-projection matrix
    pub fn from_matrix(view_projection: Mat4) -> Self {
        Self { view_projection }
    }

    /// Capture the camera's current view-projection matrix
    pub fn from_camera(camera: &Camera) -> Self {
        Self::from_matrix(camera.view_projection_matrix())
    }

    /// The wrapped matrix
    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    /// Point test
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point_in_frustum(&self.view_projection, point)
    }
}
