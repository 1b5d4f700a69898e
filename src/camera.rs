use glam::{Mat3, Mat4, Quat, Vec3};

/// Perspective camera looking down its local -Z axis.
///
/// The projection matrix and its inverse are cached and must be refreshed
/// through [`PerspectiveCamera::update_projection_matrix`] whenever one of the
/// lens parameters changes. The setters do this automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub rotation: Quat,
    projection: Mat4,
    projection_inverse: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            projection: Mat4::IDENTITY,
            projection_inverse: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Recomputes the projection pair from the lens parameters.
    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far);
        self.projection_inverse = self.projection.inverse();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
        self.update_projection_matrix();
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.update_projection_matrix();
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn projection_matrix_inverse(&self) -> Mat4 {
        self.projection_inverse
    }

    /// Camera-to-world transform.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    /// World-space viewing direction (unit length).
    pub fn forward(&self) -> Vec3 {
        (self.rotation * Vec3::NEG_Z).normalize()
    }

    /// Orients the camera so that it faces `target`, keeping world +Y as up.
    pub fn look_at(&mut self, target: Vec3) {
        let Some(forward) = (target - self.position).try_normalize() else {
            return;
        };
        // Looking straight up or down leaves +Y parallel to the view axis.
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = PerspectiveCamera::new(75.0, 1.5, 0.1, 100.0);
        assert_vec_close(camera.forward(), Vec3::NEG_Z);
    }

    #[test]
    fn look_at_points_forward_at_target() {
        let mut camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(3.0, 2.0, -4.0);
        camera.look_at(Vec3::new(0.0, 1.0, 0.0));
        let expected = (Vec3::new(0.0, 1.0, 0.0) - camera.position).normalize();
        assert_vec_close(camera.forward(), expected);
    }

    #[test]
    fn look_at_straight_down_is_finite() {
        let mut camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(0.0, 5.0, 0.0);
        camera.look_at(Vec3::ZERO);
        assert_vec_close(camera.forward(), Vec3::NEG_Y);
    }

    #[test]
    fn set_aspect_refreshes_inverse_projection() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        let before = camera.projection_matrix_inverse();
        camera.set_aspect(2.0);
        assert_ne!(before, camera.projection_matrix_inverse());
        let identity = camera.projection_matrix() * camera.projection_matrix_inverse();
        assert!(identity.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn view_matrix_inverts_world_matrix() {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(1.0, -2.0, 3.0);
        camera.look_at(Vec3::new(4.0, 0.0, 0.0));
        let product = camera.view_matrix() * camera.world_matrix();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
}
