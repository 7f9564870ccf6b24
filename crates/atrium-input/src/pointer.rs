//! Frame-coherent pointer state tracker.
//!
//! Accumulates pointer motion, button, and scroll events during a frame
//! for the camera code to read: drag deltas drive the orbit camera's
//! yaw/pitch, scroll drives its distance.

use glam::Vec2;

use crate::keyboard::PressPhase;

/// Pointer buttons the cameras care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

fn button_index(button: PointerButton) -> usize {
    match button {
        PointerButton::Primary => 0,
        PointerButton::Secondary => 1,
        PointerButton::Middle => 2,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonFrame {
    pressed: bool,
    just_pressed: bool,
    just_released: bool,
}

/// Frame-coherent pointer state.
///
/// # Usage
///
/// 1. Forward native events via the `on_*` methods during event
///    collection.
/// 2. Query state with the public accessors.
/// 3. Call [`clear_transients`](Self::clear_transients) at end of frame.
#[derive(Debug, Clone, Default)]
pub struct PointerState {
    position: Vec2,
    delta: Vec2,
    buttons: [ButtonFrame; 3],
    scroll: f32,
}

impl PointerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a pointer-moved event with the new position.
    pub fn on_moved(&mut self, x: f32, y: f32) {
        let new_pos = Vec2::new(x, y);
        self.delta += new_pos - self.position;
        self.position = new_pos;
    }

    /// Process a button event.
    pub fn on_button(&mut self, button: PointerButton, phase: PressPhase) {
        let idx = button_index(button);
        match phase {
            PressPhase::Pressed => {
                self.buttons[idx].pressed = true;
                self.buttons[idx].just_pressed = true;
            }
            PressPhase::Released => {
                self.buttons[idx].pressed = false;
                self.buttons[idx].just_released = true;
            }
        }
    }

    /// Process a scroll event, in line units (positive = scroll up).
    pub fn on_scroll(&mut self, lines: f32) {
        self.scroll += lines;
    }

    /// Clears per-frame transients: delta, scroll, just_* flags.
    pub fn clear_transients(&mut self) {
        self.delta = Vec2::ZERO;
        self.scroll = 0.0;
        for b in &mut self.buttons {
            b.just_pressed = false;
            b.just_released = false;
        }
    }

    /// Current pointer position in window-logical coordinates.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Motion accumulated since the last frame clear.
    #[must_use]
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    /// Motion accumulated this frame, but only while `button` is held.
    /// This is the drag signal the orbit camera consumes.
    #[must_use]
    pub fn drag_delta(&self, button: PointerButton) -> Vec2 {
        if self.is_button_pressed(button) {
            self.delta
        } else {
            Vec2::ZERO
        }
    }

    /// Scroll lines accumulated this frame.
    #[must_use]
    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    #[must_use]
    pub fn is_button_pressed(&self, button: PointerButton) -> bool {
        self.buttons[button_index(button)].pressed
    }

    #[must_use]
    pub fn just_button_pressed(&self, button: PointerButton) -> bool {
        self.buttons[button_index(button)].just_pressed
    }

    #[must_use]
    pub fn just_button_released(&self, button: PointerButton) -> bool {
        self.buttons[button_index(button)].just_released
    }
}
