//! Frame-coherent input state trackers.
//!
//! The host windowing layer translates its native events into the raw
//! event types here; everything downstream (movement, cameras, emotes)
//! reads the accumulated state and never touches a platform API. That
//! keeps the sync loop testable with hand-built event sequences.

mod keyboard;
mod pointer;

pub use keyboard::{Key, KeyboardState, PressPhase, RawKeyEvent};
pub use pointer::{PointerButton, PointerState};
