//! Frame-coherent keyboard state tracker.
//!
//! [`KeyboardState`] accumulates key events during a frame and answers
//! three questions for any key: is it held, was it just pressed this
//! frame, and was it just released this frame.
//!
//! Keys are physical positions, not characters, so WASD movement works
//! identically regardless of the user's keyboard layout.

use std::collections::HashSet;

/// Physical keys the application reacts to. Hosts drop anything else
/// before it reaches the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    KeyE,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Space,
    Enter,
    Escape,
}

/// Whether a key or button went down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressPhase {
    Pressed,
    Released,
}

/// Minimal description of a key event for processing.
#[derive(Debug, Clone, Copy)]
pub struct RawKeyEvent {
    /// The physical key involved.
    pub key: Key,
    /// Whether the key was pressed or released.
    pub phase: PressPhase,
    /// Whether this is an OS auto-repeat event.
    pub repeat: bool,
}

/// Tracks per-frame keyboard state.
///
/// # Usage
///
/// 1. Forward every native key event as a [`RawKeyEvent`] to
///    [`process_raw`](Self::process_raw).
/// 2. Query state with [`is_pressed`](Self::is_pressed),
///    [`just_pressed`](Self::just_pressed),
///    [`just_released`](Self::just_released).
/// 3. Call [`clear_transients`](Self::clear_transients) at the end of
///    each frame.
#[derive(Debug, Clone)]
pub struct KeyboardState {
    pressed: HashSet<Key>,
    just_pressed: HashSet<Key>,
    just_released: HashSet<Key>,
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardState {
    /// Creates a new `KeyboardState` with no keys pressed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pressed: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
        }
    }

    /// Processes a raw key event, updating internal state.
    ///
    /// - **Pressed** (non-repeat): inserts into `pressed` and `just_pressed`.
    /// - **Released**: removes from `pressed`, inserts into `just_released`.
    /// - Repeat events are ignored.
    pub fn process_raw(&mut self, event: RawKeyEvent) {
        if event.repeat {
            return;
        }
        match event.phase {
            PressPhase::Pressed => {
                self.pressed.insert(event.key);
                self.just_pressed.insert(event.key);
            }
            PressPhase::Released => {
                self.pressed.remove(&event.key);
                self.just_released.insert(event.key);
            }
        }
    }

    /// Returns `true` while the key is held down.
    #[must_use]
    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    /// Returns `true` only during the frame the key transitioned to pressed.
    #[must_use]
    pub fn just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Returns `true` only during the frame the key transitioned to released.
    #[must_use]
    pub fn just_released(&self, key: Key) -> bool {
        self.just_released.contains(&key)
    }

    /// Clears `just_pressed` and `just_released`. Call at end of frame.
    pub fn clear_transients(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(key: Key, phase: PressPhase, repeat: bool) -> RawKeyEvent {
        RawKeyEvent { key, phase, repeat }
    }

    #[test]
    fn test_initial_state_no_keys_pressed() {
        let kb = KeyboardState::new();
        for k in [Key::KeyW, Key::KeyA, Key::Space, Key::Escape] {
            assert!(!kb.is_pressed(k));
            assert!(!kb.just_pressed(k));
            assert!(!kb.just_released(k));
        }
    }

    #[test]
    fn test_press_event_sets_pressed() {
        let mut kb = KeyboardState::new();
        kb.process_raw(raw(Key::KeyW, PressPhase::Pressed, false));
        assert!(kb.is_pressed(Key::KeyW));
        assert!(kb.just_pressed(Key::KeyW));
    }

    #[test]
    fn test_release_clears_pressed() {
        let mut kb = KeyboardState::new();
        kb.process_raw(raw(Key::KeyW, PressPhase::Pressed, false));
        kb.process_raw(raw(Key::KeyW, PressPhase::Released, false));
        assert!(!kb.is_pressed(Key::KeyW));
        assert!(kb.just_released(Key::KeyW));
    }

    #[test]
    fn test_just_pressed_true_for_one_frame_only() {
        let mut kb = KeyboardState::new();
        kb.process_raw(raw(Key::Space, PressPhase::Pressed, false));
        assert!(kb.just_pressed(Key::Space));
        kb.clear_transients();
        assert!(!kb.just_pressed(Key::Space));
        assert!(kb.is_pressed(Key::Space));
    }

    #[test]
    fn test_multiple_keys_tracked_independently() {
        let mut kb = KeyboardState::new();
        kb.process_raw(raw(Key::KeyW, PressPhase::Pressed, false));
        kb.process_raw(raw(Key::KeyD, PressPhase::Pressed, false));
        kb.process_raw(raw(Key::KeyW, PressPhase::Released, false));

        assert!(!kb.is_pressed(Key::KeyW));
        assert!(kb.is_pressed(Key::KeyD));
        assert!(kb.just_released(Key::KeyW));
        assert!(kb.just_pressed(Key::KeyD));
    }

    #[test]
    fn test_repeat_events_ignored() {
        let mut kb = KeyboardState::new();
        kb.process_raw(raw(Key::KeyA, PressPhase::Pressed, false));
        kb.process_raw(raw(Key::KeyA, PressPhase::Pressed, true));
        assert!(kb.just_pressed(Key::KeyA));
        assert!(kb.is_pressed(Key::KeyA));
    }
}
