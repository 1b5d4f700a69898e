//! CPU reference implementation of the ray-march shader.
//!
//! Every function here has a WGSL twin in [`crate::render::shared`]; the two
//! must stay in lockstep so that headless previews and tests describe what the
//! GPU draws.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// What the marcher outputs when the step budget runs out before a hit or miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExhaustionPolicy {
    /// Treat the ray as a miss and output the clear colour.
    #[default]
    Background,
    /// Shade the last sampled point as if it were a hit.
    ShadeLast,
}

impl ExhaustionPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "background" | "miss" => Some(Self::Background),
            "shade-last" | "shade_last" | "last" => Some(Self::ShadeLast),
            _ => None,
        }
    }

    /// Encoding used by the `exhaust_policy` uniform.
    pub fn as_uniform(self) -> u32 {
        match self {
            Self::Background => 0,
            Self::ShadeLast => 1,
        }
    }
}

/// Termination thresholds for the march loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarchSettings {
    pub epsilon: f32,
    pub max_distance: f32,
    pub max_steps: u32,
    pub on_exhaustion: ExhaustionPolicy,
}

impl Default for MarchSettings {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            max_distance: 1000.0,
            max_steps: 100,
            on_exhaustion: ExhaustionPolicy::Background,
        }
    }
}

/// Phong coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadingSettings {
    pub diffuse: f32,
    pub specular: f32,
    pub ambient: f32,
    pub shininess: f32,
}

impl Default for ShadingSettings {
    fn default() -> Self {
        Self {
            diffuse: 0.5,
            specular: 3.0,
            ambient: 0.15,
            shininess: 16.0,
        }
    }
}

/// Directional light; `direction` points from the surface towards the light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::Z,
            color: Vec3::ONE,
        }
    }
}

/// Shortest camera-to-pixel offset that still defines a ray direction.
const MIN_RAY_LENGTH: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Rebuilds the view ray through a pixel given in normalized device
    /// coordinates, using the camera's inverse projection and world matrix.
    pub fn from_ndc(
        ndc: Vec2,
        inv_projection: Mat4,
        camera_to_world: Mat4,
        camera_position: Vec3,
    ) -> Self {
        let view = inv_projection * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        let view = view.truncate() / view.w;
        let world = camera_to_world.transform_point3(view);
        let offset = world - camera_position;
        let length = offset.length();
        // Same cut-off as the shader's `select`.
        let direction = if length < MIN_RAY_LENGTH || !length.is_finite() {
            camera_to_world
                .transform_vector3(Vec3::NEG_Z)
                .normalize_or_zero()
        } else {
            offset / length
        };
        Self {
            origin: camera_position,
            direction,
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Implicit surface described by a signed distance (negative inside).
pub trait DistanceField {
    fn distance(&self, point: Vec3) -> f32;

    /// Surface normal from the central-difference gradient.
    fn normal(&self, point: Vec3, h: f32) -> Vec3 {
        let dx = Vec3::new(h, 0.0, 0.0);
        let dy = Vec3::new(0.0, h, 0.0);
        let dz = Vec3::new(0.0, 0.0, h);
        Vec3::new(
            self.distance(point + dx) - self.distance(point - dx),
            self.distance(point + dy) - self.distance(point - dy),
            self.distance(point + dz) - self.distance(point - dz),
        )
        .normalize_or_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl DistanceField for Sphere {
    fn distance(&self, point: Vec3) -> f32 {
        (point - self.center).length() - self.radius
    }
}

/// Half-space bounded by the plane `dot(p, normal) + offset = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl DistanceField for Plane {
    fn distance(&self, point: Vec3) -> f32 {
        point.dot(self.normal) + self.offset
    }
}

/// Polynomial smooth minimum of two fields with blend radius `k`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothUnion<A, B> {
    pub a: A,
    pub b: B,
    pub k: f32,
}

impl<A: DistanceField, B: DistanceField> DistanceField for SmoothUnion<A, B> {
    fn distance(&self, point: Vec3) -> f32 {
        smooth_min(self.a.distance(point), self.b.distance(point), self.k)
    }
}

pub fn smooth_min(a: f32, b: f32, k: f32) -> f32 {
    if k <= 0.0 {
        return a.min(b);
    }
    let h = (0.5 + 0.5 * (b - a) / k).clamp(0.0, 1.0);
    a * h + b * (1.0 - h) - k * h * (1.0 - h)
}

/// The animated scene drawn by the shader: a unit sphere at the origin
/// blended with a small satellite sphere that orbits it over time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemoScene {
    pub time: f32,
}

impl DemoScene {
    pub const BLEND: f32 = 0.4;

    pub fn satellite(&self) -> Sphere {
        let t = self.time;
        Sphere {
            center: Vec3::new(t.cos() * 1.6, (t * 0.7).sin() * 0.6, t.sin() * 1.6),
            radius: 0.45,
        }
    }
}

impl DistanceField for DemoScene {
    fn distance(&self, point: Vec3) -> f32 {
        let body = Sphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        SmoothUnion {
            a: body,
            b: self.satellite(),
            k: Self::BLEND,
        }
        .distance(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarchStatus {
    Hit,
    Miss,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarchResult {
    pub status: MarchStatus,
    /// Distance travelled along the ray when the loop stopped.
    pub distance: f32,
    pub steps: u32,
    /// Size of the final advance; zero when the loop stopped on a hit.
    pub last_step: f32,
}

pub fn march<F: DistanceField + ?Sized>(
    field: &F,
    ray: &Ray,
    settings: &MarchSettings,
) -> MarchResult {
    let mut distance = 0.0;
    let mut last_step = 0.0;
    for step in 0..settings.max_steps {
        let sample = field.distance(ray.at(distance));
        if sample < settings.epsilon {
            return MarchResult {
                status: MarchStatus::Hit,
                distance,
                steps: step + 1,
                last_step: 0.0,
            };
        }
        distance += sample;
        last_step = sample;
        if distance > settings.max_distance {
            return MarchResult {
                status: MarchStatus::Miss,
                distance,
                steps: step + 1,
                last_step,
            };
        }
    }
    MarchResult {
        status: MarchStatus::Exhausted,
        distance,
        steps: settings.max_steps,
        last_step,
    }
}

/// Ambient + diffuse + specular response at `point`, clamped to `[0, 1]`.
pub fn shade<F: DistanceField + ?Sized>(
    field: &F,
    point: Vec3,
    view_direction: Vec3,
    light: &DirectionalLight,
    shading: &ShadingSettings,
    epsilon: f32,
) -> Vec3 {
    let normal = field.normal(point, epsilon);
    let to_light = light.direction.normalize_or_zero();
    let diffuse = normal.dot(to_light).max(0.0) * shading.diffuse;
    let reflected = reflect(-to_light, normal);
    let to_eye = -view_direction;
    let specular = reflected.dot(to_eye).max(0.0).powf(shading.shininess) * shading.specular;
    (light.color * (shading.ambient + diffuse + specular)).clamp(Vec3::ZERO, Vec3::ONE)
}

fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

/// Bundles everything needed to turn a ray into a colour.
pub struct Tracer<'a, F: DistanceField + ?Sized> {
    pub field: &'a F,
    pub march: &'a MarchSettings,
    pub shading: &'a ShadingSettings,
    pub light: &'a DirectionalLight,
    pub clear_color: Vec3,
}

impl<F: DistanceField + ?Sized> Tracer<'_, F> {
    pub fn trace(&self, ray: &Ray) -> (MarchResult, Vec3) {
        let result = march(self.field, ray, self.march);
        let color = match result.status {
            MarchStatus::Hit => self.shade_at(ray, result.distance),
            MarchStatus::Miss => self.clear_color,
            MarchStatus::Exhausted => match self.march.on_exhaustion {
                ExhaustionPolicy::Background => self.clear_color,
                ExhaustionPolicy::ShadeLast => self.shade_at(ray, result.distance),
            },
        };
        (result, color)
    }

    fn shade_at(&self, ray: &Ray, distance: f32) -> Vec3 {
        shade(
            self.field,
            ray.at(distance),
            ray.direction,
            self.light,
            self.shading,
            self.march.epsilon,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_SPHERE: Sphere = Sphere {
        center: Vec3::ZERO,
        radius: 1.0,
    };

    #[test]
    fn ray_aimed_at_sphere_hits_at_surface_distance() {
        let settings = MarchSettings::default();
        for (origin, radius) in [
            (Vec3::new(0.0, 0.0, 5.0), 1.0),
            (Vec3::new(3.0, -4.0, 0.0), 2.0),
            (Vec3::new(-7.0, 2.0, 9.0), 0.5),
        ] {
            let sphere = Sphere {
                center: Vec3::ZERO,
                radius,
            };
            let ray = Ray::new(origin, -origin);
            let result = march(&sphere, &ray, &settings);
            assert_eq!(result.status, MarchStatus::Hit);
            let expected = origin.length() - radius;
            assert!((result.distance - expected).abs() <= settings.epsilon);
        }
    }

    #[test]
    fn ray_pointing_away_misses_without_overshooting_more_than_a_step() {
        let settings = MarchSettings::default();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        let result = march(&UNIT_SPHERE, &ray, &settings);
        assert_eq!(result.status, MarchStatus::Miss);
        assert!(result.distance > settings.max_distance);
        assert!(result.distance - settings.max_distance <= result.last_step);
    }

    #[test]
    fn miss_outputs_clear_color() {
        let clear = Vec3::new(0.2, 0.6, 0.93);
        let settings = MarchSettings::default();
        let tracer = Tracer {
            field: &UNIT_SPHERE,
            march: &settings,
            shading: &ShadingSettings::default(),
            light: &DirectionalLight::default(),
            clear_color: clear,
        };
        let (result, color) = tracer.trace(&Ray::new(Vec3::new(0.0, 3.0, 5.0), Vec3::Z));
        assert_eq!(result.status, MarchStatus::Miss);
        assert_eq!(color, clear);
    }

    #[test]
    fn step_budget_exhaustion_follows_policy() {
        // A grazing ray creeps along the surface and burns through the budget.
        let mut settings = MarchSettings {
            max_steps: 3,
            ..MarchSettings::default()
        };
        let ray = Ray::new(Vec3::new(-5.0, 1.0005, 0.0), Vec3::X);
        let clear = Vec3::new(0.1, 0.2, 0.3);
        let light = DirectionalLight::default();
        let shading = ShadingSettings::default();

        let tracer = Tracer {
            field: &UNIT_SPHERE,
            march: &settings,
            shading: &shading,
            light: &light,
            clear_color: clear,
        };
        let (result, color) = tracer.trace(&ray);
        assert_eq!(result.status, MarchStatus::Exhausted);
        assert_eq!(result.steps, 3);
        assert_eq!(color, clear);

        settings.on_exhaustion = ExhaustionPolicy::ShadeLast;
        let tracer = Tracer {
            field: &UNIT_SPHERE,
            march: &settings,
            shading: &shading,
            light: &light,
            clear_color: clear,
        };
        let (_, color) = tracer.trace(&ray);
        assert_ne!(color, clear);
    }

    #[test]
    fn lit_side_is_brighter_than_dark_side() {
        let light = DirectionalLight::default();
        let shading = ShadingSettings::default();
        let lit = shade(&UNIT_SPHERE, Vec3::Z, Vec3::NEG_Z, &light, &shading, 1e-3);
        let dark = shade(&UNIT_SPHERE, Vec3::NEG_Z, Vec3::Z, &light, &shading, 1e-3);
        assert!(lit.x > dark.x);
        assert!((dark.x - shading.ambient).abs() < 1e-4);
    }

    #[test]
    fn sphere_normal_points_outwards() {
        let normal = UNIT_SPHERE.normal(Vec3::new(0.0, 1.0, 0.0), 1e-3);
        assert!((normal - Vec3::Y).length() < 1e-3);
    }

    #[test]
    fn smooth_min_never_exceeds_hard_min() {
        for (a, b) in [(0.0, 1.0), (0.3, 0.35), (-1.0, 2.0), (5.0, 5.0)] {
            assert!(smooth_min(a, b, 0.4) <= a.min(b) + 1e-6);
        }
        assert_eq!(smooth_min(0.2, 3.0, 0.4), 0.2);
    }

    #[test]
    fn plane_distance_is_signed() {
        let ground = Plane {
            normal: Vec3::Y,
            offset: 1.0,
        };
        assert_eq!(ground.distance(Vec3::ZERO), 1.0);
        assert_eq!(ground.distance(Vec3::new(0.0, -2.0, 0.0)), -1.0);
    }

    #[test]
    fn center_ray_reconstructs_forward_direction() {
        let projection = Mat4::perspective_rh(75f32.to_radians(), 1.5, 0.1, 100.0);
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let origin = Vec3::new(0.0, 0.0, 5.0);
        let ray = Ray::from_ndc(Vec2::ZERO, projection.inverse(), world, origin);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-5);
        assert_eq!(ray.origin, origin);
    }

    #[test]
    fn degenerate_pixel_falls_back_to_camera_forward() {
        // The unprojected pixel coincides with the camera position.
        let world = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let ray = Ray::from_ndc(Vec2::ZERO, Mat4::IDENTITY, world, Vec3::ZERO);
        assert!((ray.direction - Vec3::NEG_X).length() < 1e-5);
        assert_eq!(ray.origin, Vec3::ZERO);
    }

    #[test]
    fn demo_scene_contains_the_origin() {
        let scene = DemoScene { time: 1.3 };
        assert!(scene.distance(Vec3::ZERO) < 0.0);
        assert!(scene.distance(Vec3::new(0.0, 0.0, 10.0)) > 0.0);
    }
}
