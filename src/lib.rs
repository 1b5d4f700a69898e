//! Ray-marched scene rendered on a quad glued to the camera's near plane.
//!
//! The scene itself lives entirely in a fragment shader: every pixel of the
//! quad reconstructs its eye ray from the inverse projection and the camera
//! transform, marches a signed distance field and shades the hit with a
//! Phong model. The CPU side keeps the camera, the quad and the uniforms in
//! sync, and mirrors the shader so scenes can be inspected headless.

pub mod app;
pub mod camera;
pub mod context;
pub mod controls;
pub mod input;
pub mod march;
pub mod plane;
pub mod render;
pub mod scene;
pub mod uniforms;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{surface_size, App, FrameClock};
pub use camera::PerspectiveCamera;
pub use context::{Preview, SceneContext};
pub use controls::{OrbitControls, OrbitSettings};
pub use input::{MouseButton, PointerState};
pub use march::{
    march, shade, DemoScene, DirectionalLight, DistanceField, ExhaustionPolicy, MarchResult,
    MarchSettings, MarchStatus, Ray, ShadingSettings, Tracer,
};
pub use plane::{NearPlane, ScreenQuad};
pub use render::Renderer;
pub use scene::{Background, CameraConfig, SceneConfig};
pub use uniforms::{validate_shader_layout, LayoutError, QuadTransform, RayMarchUniforms};
