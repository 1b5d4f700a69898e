use glam::{Vec2, Vec3};
use log::debug;

use crate::camera::PerspectiveCamera;
use crate::controls::OrbitControls;
use crate::march::{
    DemoScene, DirectionalLight, MarchResult, MarchSettings, MarchStatus, Ray, ShadingSettings,
    Tracer,
};
use crate::plane::{NearPlane, ScreenQuad};
use crate::scene::SceneConfig;
use crate::uniforms::{QuadTransform, RayMarchUniforms};

/// Scene state shared by the frame loop: camera, the quad glued to its near
/// plane, orbit controls and the static shading configuration.
#[derive(Debug, Clone)]
pub struct SceneContext {
    pub camera: PerspectiveCamera,
    pub quad: ScreenQuad,
    pub controls: OrbitControls,
    pub light: DirectionalLight,
    pub march: MarchSettings,
    pub shading: ShadingSettings,
    pub clear_color: Vec3,
    /// Cap on the surface's physical pixels per logical pixel.
    pub max_pixel_ratio: f32,
    elapsed: f32,
}

impl SceneContext {
    pub fn new(config: &SceneConfig, width: u32, height: u32) -> Self {
        let aspect = aspect_ratio(width, height).unwrap_or(1.0);
        let lens = &config.camera;
        let mut camera = PerspectiveCamera::new(lens.fov, aspect, lens.near, lens.far);
        camera.position = lens.position;
        camera.look_at(lens.target);

        let controls = OrbitControls::new(&camera, lens.target, config.controls);
        let quad = ScreenQuad::new(&camera);

        Self {
            camera,
            quad,
            controls,
            light: config.light,
            march: config.march,
            shading: config.shading,
            clear_color: config.background.0,
            max_pixel_ratio: config.max_pixel_ratio,
            elapsed: 0.0,
        }
    }

    /// Advances the scene by `dt` seconds: settles the orbit controls, glues
    /// the quad to the camera and moves the shader clock.
    pub fn update(&mut self, dt: f32) {
        self.controls.update(&mut self.camera);
        self.quad.sync_to_camera(&self.camera);
        self.elapsed += dt.max(0.0);
    }

    /// Adapts the camera and quad to a new viewport. Zero-sized viewports are
    /// ignored and reported as `false`.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let Some(aspect) = aspect_ratio(width, height) else {
            return false;
        };
        // Extents depend on the aspect ratio, so the projection goes first.
        self.camera.set_aspect(aspect);
        self.quad.fit_to(&self.camera);
        debug!(
            "viewport resized to {width}x{height}, near plane {:?}",
            self.near_plane()
        );
        true
    }

    pub fn rotate_view(&mut self, drag: Vec2, viewport_height: f32) {
        if drag != Vec2::ZERO {
            self.controls.rotate(drag, viewport_height);
        }
    }

    pub fn zoom_view(&mut self, scroll: f32) {
        if scroll != 0.0 {
            self.controls.zoom(scroll);
        }
    }

    /// Seconds of scene time accumulated through [`SceneContext::update`].
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn near_plane(&self) -> NearPlane {
        NearPlane::from_camera(&self.camera)
    }

    pub fn field(&self) -> DemoScene {
        DemoScene { time: self.elapsed }
    }

    pub fn uniforms(&self) -> RayMarchUniforms {
        RayMarchUniforms {
            cam_to_world: self.camera.world_matrix().to_cols_array_2d(),
            cam_inv_proj: self.camera.projection_matrix_inverse().to_cols_array_2d(),
            cam_pos: self.camera.position.to_array(),
            eps: self.march.epsilon,
            clear_color: self.clear_color.to_array(),
            max_dis: self.march.max_distance,
            light_dir: self.light.direction.to_array(),
            max_steps: self.march.max_steps,
            light_color: self.light.color.to_array(),
            time: self.elapsed,
            diff_intensity: self.shading.diffuse,
            spec_intensity: self.shading.specular,
            ambient_intensity: self.shading.ambient,
            shininess: self.shading.shininess,
            exhaust_policy: self.march.on_exhaustion.as_uniform(),
            _padding: [0; 3],
        }
    }

    pub fn quad_transform(&self) -> QuadTransform {
        QuadTransform {
            model: self.quad.model_matrix().to_cols_array_2d(),
            view_proj: self.camera.view_projection().to_cols_array_2d(),
        }
    }

    /// Traces the pixel at `ndc` on the CPU, exactly as the shader would.
    pub fn trace_ndc(&self, ndc: Vec2) -> (MarchResult, Vec3) {
        let ray = Ray::from_ndc(
            ndc,
            self.camera.projection_matrix_inverse(),
            self.camera.world_matrix(),
            self.camera.position,
        );
        let field = self.field();
        let tracer = Tracer {
            field: &field,
            march: &self.march,
            shading: &self.shading,
            light: &self.light,
            clear_color: self.clear_color,
        };
        tracer.trace(&ray)
    }

    /// Renders a small frame on the CPU, sampling pixel centres.
    pub fn render_preview(&self, width: u32, height: u32) -> Preview {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        let mut hits = 0;
        for y in 0..height {
            for x in 0..width {
                let ndc = Vec2::new(
                    (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
                    1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
                );
                let (result, color) = self.trace_ndc(ndc);
                if result.status == MarchStatus::Hit {
                    hits += 1;
                }
                pixels.push(color);
            }
        }
        Preview {
            width,
            height,
            pixels,
            hits,
        }
    }
}

/// CPU-rendered frame, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec3>,
    pub hits: usize,
}

impl Preview {
    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec3> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        self.pixels.get(index).copied()
    }

    /// Coarse text rendering: `#` for hits brighter than ambient, `+` for
    /// shaded hits in shadow, `.` for background.
    pub fn to_ascii(&self, clear_color: Vec3) -> String {
        let mut out = String::with_capacity((self.width as usize + 1) * self.height as usize);
        for row in self.pixels.chunks(self.width.max(1) as usize) {
            for color in row {
                let glyph = if *color == clear_color {
                    '.'
                } else if color.max_element() > 0.5 {
                    '#'
                } else {
                    '+'
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}

fn aspect_ratio(width: u32, height: u32) -> Option<f32> {
    (width > 0 && height > 0).then(|| width as f32 / height as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SceneContext {
        SceneContext::new(&SceneConfig::default(), 1280, 720)
    }

    #[test]
    fn update_twice_leaves_quad_unchanged() {
        let mut ctx = context();
        ctx.update(0.016);
        let quad = ctx.quad.clone();
        let camera = ctx.camera.clone();
        ctx.update(0.016);
        assert_eq!(ctx.camera, camera);
        assert_eq!(ctx.quad, quad);
    }

    #[test]
    fn update_accumulates_time() {
        let mut ctx = context();
        ctx.update(0.5);
        ctx.update(0.25);
        ctx.update(-1.0);
        assert!((ctx.elapsed() - 0.75).abs() < 1e-6);
        assert_eq!(ctx.uniforms().time, ctx.elapsed());
    }

    #[test]
    fn resize_updates_aspect_before_extents() {
        let mut ctx = context();
        assert!(ctx.resize(800, 800));
        assert_eq!(ctx.camera.aspect, 1.0);

        let mut fresh = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0);
        fresh.update_projection_matrix();
        let expected = NearPlane::from_camera(&fresh);
        assert_eq!(ctx.quad.scale, Vec3::new(expected.width, expected.height, 1.0));
        assert_eq!(
            ctx.camera.projection_matrix_inverse(),
            fresh.projection_matrix_inverse()
        );
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut ctx = context();
        let before = ctx.camera.aspect;
        assert!(!ctx.resize(0, 600));
        assert_eq!(ctx.camera.aspect, before);
    }

    #[test]
    fn uniforms_track_the_camera() {
        let mut ctx = context();
        ctx.rotate_view(Vec2::new(300.0, 50.0), 720.0);
        for _ in 0..30 {
            ctx.update(1.0 / 60.0);
        }
        let uniforms = ctx.uniforms();
        assert_eq!(uniforms.cam_pos, ctx.camera.position.to_array());
        assert_eq!(
            uniforms.cam_to_world,
            ctx.camera.world_matrix().to_cols_array_2d()
        );
        assert_eq!(uniforms.eps, 0.001);
        assert_eq!(uniforms.max_steps, 100);
        assert_eq!(uniforms.shininess, 16.0);
    }

    #[test]
    fn centre_pixel_hits_the_sphere() {
        let ctx = context();
        let (result, color) = ctx.trace_ndc(Vec2::ZERO);
        assert_eq!(result.status, MarchStatus::Hit);
        assert!(result.distance < 5.0);
        assert_ne!(color, ctx.clear_color);
    }

    #[test]
    fn corner_pixel_shows_background() {
        let ctx = context();
        let (result, color) = ctx.trace_ndc(Vec2::new(1.0, 1.0));
        assert_eq!(result.status, MarchStatus::Miss);
        assert_eq!(color, ctx.clear_color);
    }

    #[test]
    fn preview_has_hits_and_background() {
        let ctx = context();
        let preview = ctx.render_preview(32, 18);
        assert_eq!(preview.pixels.len(), 32 * 18);
        assert!(preview.hits > 0 && preview.hits < preview.pixels.len());
        assert_eq!(preview.pixel(0, 0), Some(ctx.clear_color));
        assert_eq!(preview.pixel(32, 0), None);
        let ascii = preview.to_ascii(ctx.clear_color);
        assert_eq!(ascii.lines().count(), 18);
        assert!(ascii.contains('#'));
    }

    #[test]
    fn pixel_lookup_handles_large_dimensions() {
        let preview = Preview {
            width: u32::MAX,
            height: 2,
            pixels: Vec::new(),
            hits: 0,
        };
        assert_eq!(preview.pixel(5, 1), None);
        assert_eq!(preview.pixel(u32::MAX - 1, 1), None);
    }
}
