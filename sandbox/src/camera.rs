//! Camera functionality.

use glam::{Mat4, Vec3};
use mesh_extractor::Bounds;

#[derive(Default, Debug, Copy, Clone, PartialEq)]
#[must_use]
pub(crate) struct CameraData {
    pub(crate) view: Mat4,
    pub(crate) projection: Mat4,
    pub(crate) projection_view: Mat4,
}

#[derive(Debug, Copy, Clone, PartialEq)]
#[must_use]
pub(crate) struct Camera {
    position: Vec3,
    orientation: Vec3,
    up: Vec3,
    width: u32,
    height: u32,
}

impl Camera {
    /// Create a new `Camera` for a viewport, looking down -Z.
    pub(crate) fn new(width: u32, height: u32, position: impl Into<Vec3>) -> Self {
        Self {
            position: position.into(),
            orientation: Vec3::NEG_Z,
            up: Vec3::Y,
            width,
            height,
        }
    }

    #[inline]
    pub(crate) fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub(crate) fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// View, projection and combined matrices for a vertical field of view in degrees.
    pub(crate) fn matrices(&self, fov: f32, near_clip: f32, far_clip: f32) -> CameraData {
        let view = Mat4::look_at_rh(self.position, self.position + self.orientation, self.up);
        let projection =
            Mat4::perspective_rh_gl(fov.to_radians(), self.aspect_ratio(), near_clip, far_clip);
        CameraData {
            view,
            projection,
            projection_view: projection * view,
        }
    }

    /// Move the camera onto the +Z side of `bounds`, far enough back that its bounding sphere
    /// fits in a vertical field of view of `fov` degrees. Returns the distance to the far side
    /// of the sphere, the smallest far clip that keeps the whole model visible.
    pub(crate) fn frame(&mut self, bounds: &Bounds, fov: f32) -> f32 {
        let vertical = fov.to_radians() * 0.5;
        let horizontal = (vertical.tan() * self.aspect_ratio()).atan();
        let half_angle = vertical.min(horizontal);
        let radius = bounds.radius().max(f32::EPSILON);
        let center = Vec3::from(bounds.center());

        let distance = radius / half_angle.sin();
        self.orientation = Vec3::NEG_Z;
        self.position = center + Vec3::Z * distance;
        distance + radius
    }
}
