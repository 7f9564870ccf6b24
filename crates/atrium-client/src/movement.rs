//! Camera-relative movement intent.
//!
//! Converts held movement keys plus the active camera yaw into a unit
//! direction on the ground plane. The proposed step and the avatar's
//! facing both derive from this direction; vertical motion never does,
//! because avatars stay pinned to the ground.

use atrium_input::{Key, KeyboardState};
use glam::Vec3;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Avatar walk speed in meters per second.
pub const WALK_SPEED: f32 = 3.0;

// ---------------------------------------------------------------------------
// Direction helpers
// ---------------------------------------------------------------------------

/// Ground-plane view forward for a camera yaw. Yaw 0 looks along -Z.
pub fn forward_from_yaw(view_yaw: f32) -> Vec3 {
    Vec3::new(-view_yaw.sin(), 0.0, -view_yaw.cos())
}

/// Unit movement direction for the held keys, relative to the camera.
///
/// W/S walk along the camera's ground-plane forward, A/D strafe, and the
/// arrow keys alias WASD. Opposing keys cancel; the result is zero when
/// nothing (net) is held.
pub fn movement_direction(keyboard: &KeyboardState, view_yaw: f32) -> Vec3 {
    let forward = forward_from_yaw(view_yaw);
    let right = forward.cross(Vec3::Y);

    let mut direction = Vec3::ZERO;
    if keyboard.is_pressed(Key::KeyW) || keyboard.is_pressed(Key::ArrowUp) {
        direction += forward;
    }
    if keyboard.is_pressed(Key::KeyS) || keyboard.is_pressed(Key::ArrowDown) {
        direction -= forward;
    }
    if keyboard.is_pressed(Key::KeyD) || keyboard.is_pressed(Key::ArrowRight) {
        direction += right;
    }
    if keyboard.is_pressed(Key::KeyA) || keyboard.is_pressed(Key::ArrowLeft) {
        direction -= right;
    }
    direction.normalize_or_zero()
}

/// Facing yaw for a nonzero movement direction. Yaw 0 faces +Z, so an
/// avatar walking toward the default camera faces it.
pub fn facing_from_direction(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
