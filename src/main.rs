use std::env;
use std::fmt;
use std::fs;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::Event;
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use raymarch_plane::{surface_size, App, Renderer, SceneConfig, SceneContext};

const WINDOW_SIZE: (u32, u32) = (1280, 720);
const PREVIEW_SIZE: (u32, u32) = (48, 20);

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = match options.path.as_deref() {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read scene file {path}"))?;
            SceneConfig::from_xml(&xml)
                .with_context(|| format!("failed to parse scene file {path}"))?
        }
        None => SceneConfig::default(),
    };

    if options.summary_only {
        return run_headless(&config);
    }

    match run_interactive(&config) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!("{err}. Falling back to --summary-only mode.");
            run_headless(&config)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(config: &SceneConfig) -> Result<()> {
    let mut context = SceneContext::new(config, WINDOW_SIZE.0, WINDOW_SIZE.1);
    context.update(0.0);
    print_summary(&context);

    let (width, height) = PREVIEW_SIZE;
    let preview = context.render_preview(width, height);
    println!(
        "Preview {width}x{height}: {} of {} rays hit the surface",
        preview.hits,
        preview.pixels.len()
    );
    print!("{}", preview.to_ascii(context.clear_color));
    Ok(())
}

fn print_summary(context: &SceneContext) {
    let camera = &context.camera;
    let march = &context.march;
    let shading = &context.shading;
    let plane = context.near_plane();
    println!(
        "Camera fov={:.1} aspect={:.3} near={} far={} pos=({:.2}, {:.2}, {:.2})",
        camera.fov,
        camera.aspect,
        camera.near,
        camera.far,
        camera.position.x,
        camera.position.y,
        camera.position.z
    );
    println!("Near plane {:.4} x {:.4}", plane.width, plane.height);
    println!(
        "March eps={} max_dis={} max_steps={} on_exhaustion={:?}",
        march.epsilon, march.max_distance, march.max_steps, march.on_exhaustion
    );
    println!(
        "Shading diffuse={} specular={} ambient={} shininess={}",
        shading.diffuse, shading.specular, shading.ambient, shading.shininess
    );
}

fn run_interactive(config: &SceneConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Ray March Plane")
            .with_inner_size(LogicalSize::new(WINDOW_SIZE.0, WINDOW_SIZE.1))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let size = surface_size(
        window.inner_size(),
        window.scale_factor(),
        config.max_pixel_ratio,
    );
    let renderer = block_on(Renderer::new(Arc::clone(&window), size))?;
    let context = SceneContext::new(config, size.width, size.height);
    let mut app = App::new(context, renderer, now_seconds);
    info!(
        "rendering {}x{} with near plane {:?}",
        size.width,
        size.height,
        app.context().near_plane()
    );

    let mut last_error = None;
    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            match event {
                Event::WindowEvent { event, window_id }
                    if window_id == app.renderer().window_id() =>
                {
                    if let Err(err) = app.handle_window_event(&event, elwt) {
                        error!("frame failed: {err:?}");
                        last_error = Some(err);
                        elwt.exit();
                    }
                }
                Event::AboutToWait => app.about_to_wait(),
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop failed: {err}"))?;

    match last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn now_seconds() -> f64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs_f64()
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

struct CliOptions {
    path: Option<String>,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut path = None;
        let mut summary_only = false;
        for arg in env::args().skip(1) {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "-h" | "--help" => {
                    return Err(anyhow!("Usage: raymarch-plane [scene.xml] [--summary-only]"));
                }
                other if other.starts_with("--") => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected a scene path or --summary-only"
                    ));
                }
                other => {
                    if path.replace(other.to_string()).is_some() {
                        return Err(anyhow!("Only one scene file may be given"));
                    }
                }
            }
        }
        Ok(Self { path, summary_only })
    }
}
