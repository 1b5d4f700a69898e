use glam::{Mat4, Quat, Vec3};

use crate::camera::PerspectiveCamera;

/// Size of the camera's near plane in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearPlane {
    pub width: f32,
    pub height: f32,
}

impl NearPlane {
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let width = camera.near * (camera.fov.to_radians() / 2.0).tan() * camera.aspect * 2.0;
        let height = width / camera.aspect;
        Self { width, height }
    }
}

/// Unit quad that is kept glued to the camera's near plane.
///
/// The quad spans `[-0.5, 0.5]` on its local X/Y axes, so scaling it by the
/// near-plane extents makes it cover the whole viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenQuad {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for ScreenQuad {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl ScreenQuad {
    pub fn new(camera: &PerspectiveCamera) -> Self {
        let mut quad = Self::default();
        quad.sync_to_camera(camera);
        quad
    }

    /// Rescales the quad to the camera's current near-plane extents.
    pub fn fit_to(&mut self, camera: &PerspectiveCamera) {
        let plane = NearPlane::from_camera(camera);
        self.scale = Vec3::new(plane.width, plane.height, 1.0);
    }

    /// Places the quad on the near plane, facing the camera.
    ///
    /// Must run after every camera change and before the frame is submitted.
    pub fn sync_to_camera(&mut self, camera: &PerspectiveCamera) {
        self.fit_to(camera);
        self.position = camera.position + camera.forward().normalize() * camera.near;
        self.rotation = camera.rotation;
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(fov: f32, aspect: f32) -> PerspectiveCamera {
        PerspectiveCamera::new(fov, aspect, 0.1, 100.0)
    }

    #[test]
    fn height_is_width_over_aspect() {
        for fov in [1.0_f32, 30.0, 75.0, 120.0, 179.0] {
            for aspect in [0.25_f32, 1.0, 16.0 / 9.0, 4.0] {
                let plane = NearPlane::from_camera(&camera(fov, aspect));
                assert!(plane.width > 0.0 && plane.height > 0.0);
                assert_eq!(plane.height, plane.width / aspect);
            }
        }
    }

    #[test]
    fn extents_match_closed_form() {
        let plane = NearPlane::from_camera(&camera(90.0, 2.0));
        // tan(45deg) == 1, so width = near * aspect * 2.
        assert!((plane.width - 0.4).abs() < 1e-6);
        assert!((plane.height - 0.2).abs() < 1e-6);
    }

    #[test]
    fn quad_sits_on_near_plane_for_any_pose() {
        let poses = [
            (Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO),
            (Vec3::new(-3.0, 4.0, 1.0), Vec3::new(1.0, 0.0, -2.0)),
            (Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO),
        ];
        for (position, target) in poses {
            let mut camera = camera(75.0, 1.5);
            camera.position = position;
            camera.look_at(target);
            let quad = ScreenQuad::new(&camera);
            let offset = quad.position - camera.position;
            assert!((offset.length() - camera.near).abs() < 1e-6);
            assert!(offset.normalize().dot(camera.forward()) > 1.0 - 1e-5);
            assert_eq!(quad.rotation, camera.rotation);
        }
    }

    #[test]
    fn quad_covers_the_viewport() {
        let mut camera = camera(75.0, 16.0 / 9.0);
        camera.position = Vec3::new(1.0, 2.0, 3.0);
        camera.look_at(Vec3::ZERO);
        let quad = ScreenQuad::new(&camera);
        let clip_from_local = camera.view_projection() * quad.model_matrix();
        for (corner, expected) in [
            (Vec3::new(0.5, 0.5, 0.0), (1.0, 1.0)),
            (Vec3::new(-0.5, -0.5, 0.0), (-1.0, -1.0)),
        ] {
            let ndc = clip_from_local.project_point3(corner);
            assert!((ndc.x - expected.0).abs() < 1e-4, "{ndc:?}");
            assert!((ndc.y - expected.1).abs() < 1e-4, "{ndc:?}");
        }
    }

    #[test]
    fn repeated_sync_does_not_drift() {
        let mut camera = camera(60.0, 1.25);
        camera.position = Vec3::new(2.0, 1.0, 4.0);
        camera.look_at(Vec3::ZERO);
        let mut quad = ScreenQuad::new(&camera);
        let first = quad.clone();
        quad.sync_to_camera(&camera);
        assert_eq!(first, quad);
    }
}
