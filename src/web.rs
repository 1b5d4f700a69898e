#![cfg(target_arch = "wasm32")]

use std::sync::Arc;

use log::{error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use winit::dpi::LogicalSize;
use winit::event::Event;
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::web::{EventLoopExtWebSys, WindowBuilderExtWebSys};
use winit::window::WindowBuilder;

use crate::{surface_size, App, Renderer, SceneConfig, SceneContext};

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// Starts the demo inside the canvas with id `canvas_id`. `scene_xml` may
/// carry a `<scene>` document; the stock scene is used otherwise.
#[wasm_bindgen]
pub async fn run(canvas_id: String, scene_xml: Option<String>) -> Result<(), JsValue> {
    let config = match scene_xml.as_deref() {
        Some(xml) => SceneConfig::from_xml(xml)
            .map_err(|err| JsValue::from_str(&format!("failed to parse scene XML: {err:#}")))?,
        None => SceneConfig::default(),
    };

    let browser = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
    let document = browser
        .document()
        .ok_or_else(|| JsValue::from_str("missing document"))?;
    let element = document
        .get_element_by_id(&canvas_id)
        .ok_or_else(|| JsValue::from_str("canvas element not found"))?;
    let canvas: web_sys::HtmlCanvasElement = element
        .dyn_into()
        .map_err(|_| JsValue::from_str("element is not a canvas"))?;
    // The canvas tracks the viewport; winit reports its resizes.
    let style = canvas.style();
    style.set_property("display", "block")?;
    style.set_property("width", "100vw")?;
    style.set_property("height", "100vh")?;

    let pixel_ratio = browser.device_pixel_ratio();
    let viewport = viewport_size(&browser)?.to_physical::<u32>(pixel_ratio);
    let size = surface_size(viewport, pixel_ratio, config.max_pixel_ratio);

    let event_loop = EventLoop::new()
        .map_err(|err| JsValue::from_str(&format!("failed to create event loop: {err}")))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_canvas(Some(canvas))
            .with_title("Ray March Plane")
            .build(&event_loop)
            .map_err(|err| JsValue::from_str(&format!("window error: {err}")))?,
    );

    let renderer = Renderer::new(Arc::clone(&window), size)
        .await
        .map_err(|err| JsValue::from_str(&format!("renderer error: {err:#}")))?;
    let context = SceneContext::new(&config, size.width, size.height);
    let mut app = App::new(context, renderer, now_seconds);
    info!(
        "canvas {canvas_id} ready, near plane {:?}",
        app.context().near_plane()
    );

    event_loop.spawn(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, window_id }
                if window_id == app.renderer().window_id() =>
            {
                if let Err(err) = app.handle_window_event(&event, elwt) {
                    error!("frame failed: {err:?}");
                    elwt.exit();
                }
            }
            Event::AboutToWait => app.about_to_wait(),
            _ => {}
        }
    });

    Ok(())
}

/// Browser viewport in CSS pixels.
fn viewport_size(browser: &web_sys::Window) -> Result<LogicalSize<f64>, JsValue> {
    let width = browser.inner_width()?.as_f64().unwrap_or(1.0);
    let height = browser.inner_height()?.as_f64().unwrap_or(1.0);
    Ok(LogicalSize::new(width.max(1.0), height.max(1.0)))
}

fn now_seconds() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|performance| performance.now() / 1000.0)
        .unwrap_or(0.0)
}
