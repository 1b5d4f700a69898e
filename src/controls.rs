use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;

const MIN_POLAR: f32 = 1e-4;
const MIN_RADIUS: f32 = 1e-3;

/// Tuning for [`OrbitControls`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSettings {
    /// Fraction of the pending motion applied each frame; `1.0` disables damping.
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            damping: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
        }
    }
}

/// Orbits the camera around a target point using spherical coordinates
/// (Y up). Input accumulates into pending deltas that [`OrbitControls::update`]
/// bleeds into the camera a little every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub settings: OrbitSettings,
    radius: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
    /// Polar angle from +Y.
    phi: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_zoom: f32,
}

impl OrbitControls {
    /// Starts orbiting from the camera's current position.
    pub fn new(camera: &PerspectiveCamera, target: Vec3, settings: OrbitSettings) -> Self {
        let offset = camera.position - target;
        let radius = offset.length().max(MIN_RADIUS);
        let theta = offset.x.atan2(offset.z);
        let phi = (offset.y / radius).clamp(-1.0, 1.0).acos();
        Self {
            target,
            settings,
            radius,
            theta,
            phi: phi.clamp(MIN_POLAR, PI - MIN_POLAR),
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_zoom: 1.0,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Queues a rotation from a pointer drag measured in pixels.
    pub fn rotate(&mut self, drag: Vec2, viewport_height: f32) {
        if viewport_height <= 0.0 {
            return;
        }
        let scale = TAU * self.settings.rotate_speed / viewport_height;
        self.pending_theta -= drag.x * scale;
        self.pending_phi -= drag.y * scale;
    }

    /// Queues a dolly; positive `scroll` moves towards the target.
    pub fn zoom(&mut self, scroll: f32) {
        self.pending_zoom *= 0.95_f32.powf(self.settings.zoom_speed * scroll);
    }

    /// Applies one frame of pending motion and re-aims the camera.
    ///
    /// Returns `true` while motion is still decaying.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let damping = self.settings.damping.clamp(f32::EPSILON, 1.0);

        self.theta += self.pending_theta * damping;
        self.phi = (self.phi + self.pending_phi * damping).clamp(MIN_POLAR, PI - MIN_POLAR);
        let zoom_step = self.pending_zoom.powf(damping);
        self.radius = (self.radius * zoom_step).max(MIN_RADIUS);

        self.pending_theta *= 1.0 - damping;
        self.pending_phi *= 1.0 - damping;
        self.pending_zoom /= zoom_step;

        let sin_phi = self.phi.sin();
        let offset = Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        );
        camera.position = self.target + offset;
        camera.look_at(self.target);

        self.pending_theta.abs() > 1e-6
            || self.pending_phi.abs() > 1e-6
            || (self.pending_zoom - 1.0).abs() > 1e-6
    }
}
