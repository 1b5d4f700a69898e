use std::collections::HashSet;

use glam::Vec2;

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Pointer snapshot gathered between two frames.
///
/// Drag motion and wheel travel accumulate until the frame consumes them with
/// [`PointerState::take_drag`] and [`PointerState::take_scroll`].
#[derive(Debug, Default)]
pub struct PointerState {
    buttons: HashSet<MouseButton>,
    position: Option<Vec2>,
    drag: Vec2,
    scroll: f32,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button_down(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    pub fn set_button_up(&mut self, button: MouseButton) {
        self.buttons.remove(&button);
    }

    pub fn is_button_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    /// Records a cursor move; motion counts as drag while the left button is held.
    pub fn move_to(&mut self, position: Vec2) {
        if let Some(previous) = self.position {
            if self.is_button_down(MouseButton::LEFT) {
                self.drag += position - previous;
            }
        }
        self.position = Some(position);
    }

    /// Cursor left the surface; the next move must not count as a jump.
    pub fn leave(&mut self) {
        self.position = None;
    }

    /// Adds wheel travel in lines; positive values zoom in.
    pub fn scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    pub fn position(&self) -> Option<Vec2> {
        self.position
    }

    pub fn take_drag(&mut self) -> Vec2 {
        std::mem::take(&mut self.drag)
    }

    pub fn take_scroll(&mut self) -> f32 {
        std::mem::take(&mut self.scroll)
    }
}
