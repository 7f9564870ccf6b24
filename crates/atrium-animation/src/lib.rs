//! Per-avatar animation state machine.
//!
//! Tracks the state machine for each rig: idle ↔ walk driven by movement,
//! plus a one-shot wave override triggered by emotes. The machine owns
//! the transition rules and pushes playback commands through an
//! [`AnimationDriver`], so it runs identically against a real mixer and
//! against the recording fake used in tests.

use tracing::debug;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Cross-fade duration between the base idle/walk states.
pub const BASE_FADE_SECONDS: f32 = 0.2;

/// Faster fade into the wave one-shot so the gesture reads as immediate.
pub const WAVE_FADE_SECONDS: f32 = 0.08;

// ---------------------------------------------------------------------------
// AnimState
// ---------------------------------------------------------------------------

/// Named animation states every avatar asset provides clips for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimState {
    /// Standing still, looped.
    Idle,
    /// Moving, looped.
    Walk,
    /// One-shot emote override; clamps its final pose until completion.
    Wave,
}

impl AnimState {
    /// Clip name as it appears in the avatar asset.
    pub fn clip_name(self) -> &'static str {
        match self {
            AnimState::Idle => "idle",
            AnimState::Walk => "walk",
            AnimState::Wave => "wave",
        }
    }

    /// Base states loop; the wave plays once.
    pub fn looped(self) -> bool {
        !matches!(self, AnimState::Wave)
    }

    /// Inverse of [`clip_name`](Self::clip_name), for routing clip
    /// completion reports from the host engine back to a state.
    pub fn from_clip(name: &str) -> Option<AnimState> {
        match name {
            "idle" => Some(AnimState::Idle),
            "walk" => Some(AnimState::Walk),
            "wave" => Some(AnimState::Wave),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationDriver
// ---------------------------------------------------------------------------

/// Playback surface the state machine drives. Implemented over the host
/// engine's animation mixer for a live rig.
pub trait AnimationDriver {
    /// Cross-fade to `state`'s clip over `fade_seconds`. When
    /// `clamp_end` is set the clip holds its final pose after finishing
    /// instead of snapping back to frame zero.
    fn crossfade(&mut self, state: AnimState, fade_seconds: f32, looped: bool, clamp_end: bool);
}

// ---------------------------------------------------------------------------
// AnimationStateMachine
// ---------------------------------------------------------------------------

/// One machine per rig, local and remote alike.
///
/// Movement feeds [`set_moving`](Self::set_moving) every frame; emotes
/// feed [`trigger_wave`](Self::trigger_wave); the mixer's completion
/// callback feeds [`clip_finished`](Self::clip_finished). While a wave
/// is active the base transitions are suppressed, so a held movement
/// key cannot cancel the gesture halfway.
#[derive(Debug)]
pub struct AnimationStateMachine {
    current: AnimState,
    wave_active: bool,
}

impl AnimationStateMachine {
    pub fn new() -> Self {
        Self {
            current: AnimState::Idle,
            wave_active: false,
        }
    }

    /// Starts the idle loop. Called once when the rig is created.
    pub fn begin(&mut self, driver: &mut impl AnimationDriver) {
        self.current = AnimState::Idle;
        self.wave_active = false;
        driver.crossfade(AnimState::Idle, 0.0, true, false);
    }

    pub fn current(&self) -> AnimState {
        self.current
    }

    pub fn wave_active(&self) -> bool {
        self.wave_active
    }

    /// Per-frame movement feedback: true if a move was applied this
    /// frame. Drives the idle ↔ walk pair; ignored while waving.
    pub fn set_moving(&mut self, moving: bool, driver: &mut impl AnimationDriver) {
        if self.wave_active {
            return;
        }
        let target = if moving {
            AnimState::Walk
        } else {
            AnimState::Idle
        };
        if self.current == target {
            return;
        }
        debug!(from = ?self.current, to = ?target, "animation transition");
        self.current = target;
        driver.crossfade(target, BASE_FADE_SECONDS, target.looped(), false);
    }

    /// Starts the wave one-shot. Returns false (and does nothing) if a
    /// wave is already playing, so duplicate emote deliveries are
    /// harmless.
    pub fn trigger_wave(&mut self, driver: &mut impl AnimationDriver) -> bool {
        if self.wave_active {
            return false;
        }
        debug!(from = ?self.current, "wave triggered");
        self.wave_active = true;
        self.current = AnimState::Wave;
        driver.crossfade(AnimState::Wave, WAVE_FADE_SECONDS, false, true);
        true
    }

    /// Completion callback from the mixer. Only a finishing wave changes
    /// anything; looping clips report completions we don't care about.
    pub fn clip_finished(&mut self, state: AnimState, driver: &mut impl AnimationDriver) {
        if state != AnimState::Wave || !self.wave_active {
            return;
        }
        debug!("wave finished, returning to idle");
        self.wave_active = false;
        self.current = AnimState::Idle;
        driver.crossfade(AnimState::Idle, BASE_FADE_SECONDS, true, false);
    }
}

impl Default for AnimationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
