use anyhow::{anyhow, Result};
use glam::Vec2;
use log::{info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::EventLoopWindowTarget;

use crate::context::SceneContext;
use crate::input::{MouseButton, PointerState};
use crate::render::Renderer;

/// Wheel pixels that count as one line on touchpads and browsers.
const PIXELS_PER_LINE: f32 = 100.0;

/// Longest frame step fed to the scene; stalls (debugger, hidden tab) are
/// clamped so the clock does not leap.
const MAX_FRAME_DELTA: f32 = 0.25;

/// Scales a window's physical size so that at most `max_pixel_ratio`
/// physical pixels back each logical pixel. Zero sizes and unusable scale
/// factors pass through unchanged.
pub fn surface_size(
    physical: PhysicalSize<u32>,
    scale_factor: f64,
    max_pixel_ratio: f32,
) -> PhysicalSize<u32> {
    let max_pixel_ratio = f64::from(max_pixel_ratio);
    if physical.width == 0 || physical.height == 0 || !(scale_factor > max_pixel_ratio) {
        return physical;
    }
    let ratio = max_pixel_ratio / scale_factor;
    let scale = |extent: u32| ((f64::from(extent) * ratio).round() as u32).max(1);
    PhysicalSize::new(scale(physical.width), scale(physical.height))
}

/// Converts monotonically increasing timestamps (seconds) into frame deltas.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the seconds elapsed since the previous tick; the first tick is
    /// zero.
    pub fn tick(&mut self, now: f64) -> f32 {
        let delta = match self.last {
            Some(last) => (now - last).max(0.0) as f32,
            None => 0.0,
        };
        self.last = Some(now);
        delta.min(MAX_FRAME_DELTA)
    }
}

/// Owns the scene, the renderer and the input gathered between frames, and
/// turns window events into updates and draws.
pub struct App {
    context: SceneContext,
    renderer: Renderer,
    pointer: PointerState,
    clock: FrameClock,
    now: fn() -> f64,
}

impl App {
    /// `now` supplies a monotonic timestamp in seconds for the frame clock.
    pub fn new(mut context: SceneContext, renderer: Renderer, now: fn() -> f64) -> Self {
        let size = renderer.size();
        context.resize(size.width, size.height);
        Self {
            context,
            renderer,
            pointer: PointerState::new(),
            clock: FrameClock::new(),
            now,
        }
    }

    pub fn context(&self) -> &SceneContext {
        &self.context
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn handle_window_event(
        &mut self,
        event: &WindowEvent,
        elwt: &EventLoopWindowTarget<()>,
    ) -> Result<()> {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => self.resize(*size),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self.renderer.window().inner_size();
                self.resize(size);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = map_mouse_button(*button);
                match state {
                    ElementState::Pressed => self.pointer.set_button_down(button),
                    ElementState::Released => self.pointer.set_button_up(button),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer
                    .move_to(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.pointer.leave(),
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_LINE,
                };
                self.pointer.scroll(lines);
            }
            WindowEvent::RedrawRequested => self.redraw()?,
            _ => {}
        }
        Ok(())
    }

    /// Called once all pending events were handled.
    pub fn about_to_wait(&self) {
        self.renderer.window().request_redraw();
    }

    /// Resizes the scene first, then the surface. `size` is the window's
    /// physical size; the surface gets the pixel-ratio capped size.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        let scale_factor = self.renderer.window().scale_factor();
        let size = surface_size(size, scale_factor, self.context.max_pixel_ratio);
        if self.context.resize(size.width, size.height) {
            self.renderer.resize(size);
        }
    }

    /// Runs one frame: input, scene update, uniform upload, draw.
    pub fn redraw(&mut self) -> Result<()> {
        let dt = self.clock.tick((self.now)());

        let viewport_height = self.renderer.size().height as f32;
        self.context
            .rotate_view(self.pointer.take_drag(), viewport_height);
        self.context.zoom_view(self.pointer.take_scroll());
        self.context.update(dt);

        self.renderer
            .update_uniforms(&self.context.uniforms(), &self.context.quad_transform());
        match self.renderer.render(self.context.clear_color) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                info!("surface lost or outdated; reconfiguring");
                let size = self.renderer.window().inner_size();
                self.resize(size);
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("GPU is out of memory")),
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
                Ok(())
            }
        }
    }
}

pub fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    let index = match button {
        WinitMouseButton::Left => 0,
        WinitMouseButton::Right => 1,
        WinitMouseButton::Middle => 2,
        WinitMouseButton::Back => 3,
        WinitMouseButton::Forward => 4,
        WinitMouseButton::Other(value) => value.min(u8::MAX as u16) as u8,
    };
    MouseButton::new(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(12.5), 0.0);
        assert!((clock.tick(12.516) - 0.016).abs() < 1e-5);
    }

    #[test]
    fn backwards_time_yields_zero() {
        let mut clock = FrameClock::new();
        clock.tick(3.0);
        assert_eq!(clock.tick(2.0), 0.0);
    }

    #[test]
    fn long_stalls_are_clamped() {
        let mut clock = FrameClock::new();
        clock.tick(0.0);
        assert_eq!(clock.tick(10.0), MAX_FRAME_DELTA);
    }

    #[test]
    fn surface_size_caps_pixel_ratio() {
        let window = PhysicalSize::new(2560, 1440);
        assert_eq!(surface_size(window, 3.0, 2.0), PhysicalSize::new(1707, 960));
        assert_eq!(surface_size(window, 4.0, 1.0), PhysicalSize::new(640, 360));
    }

    #[test]
    fn surface_size_keeps_low_density_windows() {
        let window = PhysicalSize::new(1920, 1080);
        assert_eq!(surface_size(window, 1.0, 2.0), window);
        assert_eq!(surface_size(window, 2.0, 2.0), window);
        assert_eq!(surface_size(window, f64::NAN, 2.0), window);
        let empty = PhysicalSize::new(0, 900);
        assert_eq!(surface_size(empty, 3.0, 2.0), empty);
    }

    #[test]
    fn surface_size_never_collapses_to_zero() {
        let sliver = PhysicalSize::new(1, 300);
        assert_eq!(surface_size(sliver, 8.0, 1.0), PhysicalSize::new(1, 38));
    }

    #[test]
    fn winit_buttons_map_to_indices() {
        assert_eq!(map_mouse_button(WinitMouseButton::Left), MouseButton::LEFT);
        assert_eq!(map_mouse_button(WinitMouseButton::Middle), MouseButton::MIDDLE);
        assert_eq!(map_mouse_button(WinitMouseButton::Other(900)).index(), u8::MAX);
    }
}
