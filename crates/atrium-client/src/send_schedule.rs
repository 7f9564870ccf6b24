//! Fixed-cadence outbound move scheduling.
//!
//! Rendering runs at whatever rate the host manages; outbound moves go
//! out on a fixed cadence decoupled from it. Frames between slots send
//! nothing, and a due slot sends nothing when the pose has not changed
//! since the last transmission.

use atrium_room::MoveUpdate;
use glam::Vec3;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Outbound move messages per second.
pub const SEND_RATE_HZ: f32 = 20.0;

// ---------------------------------------------------------------------------
// SendSchedule
// ---------------------------------------------------------------------------

/// Frame-time accumulator that gates outbound moves.
///
/// Fires at most once per poll. When a long frame covers several send
/// intervals the overflow is drained rather than queued, since every
/// send carries the complete latest pose and the repeats would be
/// identical.
#[derive(Debug)]
pub struct SendSchedule {
    interval: f32,
    accumulator: f32,
    last_sent: Option<(Vec3, f32)>,
}

impl SendSchedule {
    pub fn new() -> Self {
        Self::with_rate(SEND_RATE_HZ)
    }

    /// Schedule firing `rate_hz` times per second.
    pub fn with_rate(rate_hz: f32) -> Self {
        Self {
            interval: 1.0 / rate_hz,
            accumulator: 0.0,
            last_sent: None,
        }
    }

    /// Advance by `dt`. When a send slot is due and the pose changed
    /// since the last send, returns the full pose to transmit.
    pub fn poll(&mut self, dt: f32, position: Vec3, yaw: f32) -> Option<MoveUpdate> {
        self.accumulator += dt;
        if self.accumulator < self.interval {
            return None;
        }
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
        }
        if self.last_sent == Some((position, yaw)) {
            return None;
        }
        self.last_sent = Some((position, yaw));
        Some(MoveUpdate {
            x: Some(position.x),
            y: Some(position.y),
            z: Some(position.z),
            ry: Some(yaw),
        })
    }

    /// Forget the last transmitted pose so the next due slot sends
    /// unconditionally. Called after a (re)join, when the server has no
    /// fresh pose for this session.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.last_sent = None;
    }
}

impl Default for SendSchedule {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
