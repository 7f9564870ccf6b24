//! Orbit and first-person camera controllers.
//!
//! Both cameras share one view-yaw convention: yaw 0 looks along -Z, so
//! either camera's yaw feeds [`movement_direction`](crate::movement::movement_direction)
//! directly and toggling modes keeps the walk direction stable.

use atrium_input::{PointerButton, PointerState};
use glam::Vec3;

use atrium_math::{smooth_vec3, wrap_angle};

// ---------------------------------------------------------------------------
// OrbitCamera
// ---------------------------------------------------------------------------

/// Third-person orbit camera: drag to orbit, scroll to zoom, and a
/// smoothed follow point kept above the avatar.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Horizontal orbit angle in radians. 0 puts the camera behind a
    /// target that faces -Z.
    pub yaw: f32,
    /// Elevation above the horizon in radians.
    pub pitch: f32,
    /// Distance from the focus point in meters.
    pub distance: f32,
    /// Zoom limits in meters.
    pub distance_min: f32,
    pub distance_max: f32,
    /// Raises the focus point above the avatar origin, in meters.
    pub height_offset: f32,
    /// Radians of orbit per pixel of drag.
    pub orbit_sensitivity: f32,
    /// Meters of zoom per scroll line.
    pub zoom_sensitivity: f32,
    /// Exponential follow rate per second. Higher snaps harder.
    pub follow_rate: f32,
    /// Pitch limits in radians.
    pub pitch_min: f32,
    pub pitch_max: f32,
    focus: Vec3,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 20.0_f32.to_radians(),
            distance: 4.0,
            distance_min: 1.5,
            distance_max: 12.0,
            height_offset: 1.5,
            orbit_sensitivity: 0.005,
            zoom_sensitivity: 0.5,
            follow_rate: 10.0,
            pitch_min: -10.0_f32.to_radians(),
            pitch_max: 80.0_f32.to_radians(),
            focus: Vec3::ZERO,
        }
    }
}

impl OrbitCamera {
    /// Orbit from a primary-button drag. Horizontal drag adjusts yaw,
    /// vertical drag adjusts pitch within the configured limits.
    pub fn apply_pointer(&mut self, pointer: &PointerState) {
        let drag = pointer.drag_delta(PointerButton::Primary);
        if drag != glam::Vec2::ZERO {
            self.yaw = wrap_angle(self.yaw - drag.x * self.orbit_sensitivity);
            self.pitch = (self.pitch - drag.y * self.orbit_sensitivity)
                .clamp(self.pitch_min, self.pitch_max);
        }

        let scroll = pointer.scroll();
        if scroll.abs() > 1e-6 {
            self.distance = (self.distance - scroll * self.zoom_sensitivity)
                .clamp(self.distance_min, self.distance_max);
        }
    }

    /// Glide the focus point toward `target` (plus the height offset).
    /// The blend is time-normalized, so frame rate does not change how
    /// fast the camera settles.
    pub fn update(&mut self, target: Vec3, dt: f32) {
        let desired = target + Vec3::new(0.0, self.height_offset, 0.0);
        self.focus = smooth_vec3(self.focus, desired, self.follow_rate, dt);
    }

    /// Snap the focus point without gliding. Called when the avatar
    /// first spawns or teleports.
    pub fn snap_to(&mut self, target: Vec3) {
        self.focus = target + Vec3::new(0.0, self.height_offset, 0.0);
    }

    /// World position from the spherical offset around the focus point.
    /// Yaw 0 and pitch 0 put the camera at +Z of the focus.
    pub fn position(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        let offset = Vec3::new(
            self.distance * cos_pitch * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * cos_pitch * self.yaw.cos(),
        );
        self.focus + offset
    }

    /// Point the camera looks at.
    pub fn focus(&self) -> Vec3 {
        self.focus
    }

    /// Ground-plane yaw of the view direction, for the movement basis.
    pub fn view_yaw(&self) -> f32 {
        self.yaw
    }
}

// ---------------------------------------------------------------------------
// FirstPersonCamera
// ---------------------------------------------------------------------------

/// Head-locked mouse-look camera.
#[derive(Debug, Clone)]
pub struct FirstPersonCamera {
    /// Horizontal view angle in radians, same convention as the orbit
    /// camera's yaw.
    pub yaw: f32,
    /// Vertical view angle in radians. Positive looks up.
    pub pitch: f32,
    /// Radians of rotation per pixel of pointer delta.
    pub look_sensitivity: f32,
    /// Eye height above the avatar origin, in meters.
    pub head_height: f32,
    /// Pitch is clamped to plus or minus this limit.
    pub pitch_limit: f32,
}

impl Default for FirstPersonCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            look_sensitivity: 0.003,
            head_height: 1.6,
            pitch_limit: 89.0_f32.to_radians(),
        }
    }
}

impl FirstPersonCamera {
    /// Apply a pointer delta to yaw and pitch, clamping pitch.
    pub fn apply_pointer(&mut self, pointer: &PointerState) {
        let delta = pointer.delta();
        self.yaw = wrap_angle(self.yaw - delta.x * self.look_sensitivity);
        self.pitch =
            (self.pitch - delta.y * self.look_sensitivity).clamp(-self.pitch_limit, self.pitch_limit);
    }

    /// Eye position for an avatar standing at `avatar_position`.
    pub fn position(&self, avatar_position: Vec3) -> Vec3 {
        avatar_position + Vec3::new(0.0, self.head_height, 0.0)
    }

    /// Full 3D view direction.
    pub fn forward(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        Vec3::new(
            -self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            -self.yaw.cos() * cos_pitch,
        )
    }

    /// Ground-plane yaw of the view direction, for the movement basis.
    pub fn view_yaw(&self) -> f32 {
        self.yaw
    }
}

// ---------------------------------------------------------------------------
// CameraRig
// ---------------------------------------------------------------------------

/// Which camera currently drives the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Orbit,
    FirstPerson,
}

/// Holds both cameras and the active mode. Each keeps its own pitch and
/// zoom; the view yaw carries across a toggle so the walk direction does
/// not jump.
#[derive(Debug)]
pub struct CameraRig {
    pub mode: CameraMode,
    pub orbit: OrbitCamera,
    pub first_person: FirstPersonCamera,
}

impl CameraRig {
    pub fn new() -> Self {
        Self {
            mode: CameraMode::Orbit,
            orbit: OrbitCamera::default(),
            first_person: FirstPersonCamera::default(),
        }
    }

    /// Switch between orbit and first person, carrying the view yaw.
    pub fn toggle_mode(&mut self) -> CameraMode {
        self.mode = match self.mode {
            CameraMode::Orbit => {
                self.first_person.yaw = self.orbit.yaw;
                CameraMode::FirstPerson
            }
            CameraMode::FirstPerson => {
                self.orbit.yaw = self.first_person.yaw;
                CameraMode::Orbit
            }
        };
        self.mode
    }

    pub fn is_first_person(&self) -> bool {
        self.mode == CameraMode::FirstPerson
    }

    /// View yaw of whichever camera is active.
    pub fn view_yaw(&self) -> f32 {
        match self.mode {
            CameraMode::Orbit => self.orbit.view_yaw(),
            CameraMode::FirstPerson => self.first_person.view_yaw(),
        }
    }
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_input::PressPhase;

    fn dragging_pointer(dx: f32, dy: f32) -> PointerState {
        let mut pointer = PointerState::new();
        pointer.on_button(PointerButton::Primary, PressPhase::Pressed);
        pointer.on_moved(100.0, 100.0);
        pointer.clear_transients();
        pointer.on_moved(100.0 + dx, 100.0 + dy);
        pointer
    }

    #[test]
    fn test_drag_orbits_yaw() {
        let mut camera = OrbitCamera::default();
        camera.apply_pointer(&dragging_pointer(40.0, 0.0));
        assert!((camera.yaw - (-40.0 * camera.orbit_sensitivity)).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_clamps_to_limits() {
        let mut camera = OrbitCamera::default();
        camera.apply_pointer(&dragging_pointer(0.0, -100_000.0));
        assert!((camera.pitch - camera.pitch_max).abs() < 1e-6);
        camera.apply_pointer(&dragging_pointer(0.0, 100_000.0));
        assert!((camera.pitch - camera.pitch_min).abs() < 1e-6);
    }

    #[test]
    fn test_scroll_zooms_within_limits() {
        let mut camera = OrbitCamera::default();
        let mut pointer = PointerState::new();
        pointer.on_scroll(100.0);
        camera.apply_pointer(&pointer);
        assert!((camera.distance - camera.distance_min).abs() < 1e-6);

        let mut pointer = PointerState::new();
        pointer.on_scroll(-100.0);
        camera.apply_pointer(&pointer);
        assert!((camera.distance - camera.distance_max).abs() < 1e-6);
    }

    #[test]
    fn test_undragged_pointer_leaves_orbit_alone() {
        let mut camera = OrbitCamera::default();
        let mut pointer = PointerState::new();
        pointer.on_moved(50.0, 50.0);
        camera.apply_pointer(&pointer);
        assert_eq!(camera.yaw, 0.0);
        assert_eq!(camera.pitch, OrbitCamera::default().pitch);
    }

    #[test]
    fn test_follow_converges_on_target() {
        let mut camera = OrbitCamera::default();
        camera.snap_to(Vec3::ZERO);
        let target = Vec3::new(6.0, 0.0, -2.0);
        for _ in 0..120 {
            camera.update(target, 1.0 / 60.0);
        }
        let expected = target + Vec3::new(0.0, camera.height_offset, 0.0);
        assert!(camera.focus().distance(expected) < 0.01);
    }

    #[test]
    fn test_follow_rate_is_frame_rate_independent() {
        let target = Vec3::new(10.0, 0.0, 0.0);

        let mut fast = OrbitCamera::default();
        fast.snap_to(Vec3::ZERO);
        for _ in 0..120 {
            fast.update(target, 1.0 / 120.0);
        }

        let mut slow = OrbitCamera::default();
        slow.snap_to(Vec3::ZERO);
        for _ in 0..30 {
            slow.update(target, 1.0 / 30.0);
        }

        // Both simulated one wall-clock second.
        assert!(fast.focus().distance(slow.focus()) < 0.05);
    }

    #[test]
    fn test_camera_sits_behind_default_target() {
        let mut camera = OrbitCamera::default();
        camera.snap_to(Vec3::ZERO);
        let position = camera.position();
        assert!(position.z > 0.0);
        assert!(position.y > camera.height_offset);
    }

    #[test]
    fn test_first_person_look_clamps_pitch() {
        let mut camera = FirstPersonCamera::default();
        let mut pointer = PointerState::new();
        pointer.on_moved(0.0, -100_000.0);
        camera.apply_pointer(&pointer);
        assert!((camera.pitch - camera.pitch_limit).abs() < 1e-6);
    }

    #[test]
    fn test_first_person_eye_height() {
        let camera = FirstPersonCamera::default();
        let eye = camera.position(Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(eye, Vec3::new(1.0, camera.head_height, 2.0));
    }

    #[test]
    fn test_first_person_forward_matches_yaw_convention() {
        let camera = FirstPersonCamera::default();
        assert!(camera.forward().distance(Vec3::new(0.0, 0.0, -1.0)) < 1e-6);
    }

    #[test]
    fn test_toggle_carries_view_yaw() {
        let mut rig = CameraRig::new();
        rig.orbit.yaw = 1.2;
        rig.toggle_mode();
        assert!(rig.is_first_person());
        assert!((rig.view_yaw() - 1.2).abs() < 1e-6);

        rig.first_person.yaw = -0.4;
        rig.toggle_mode();
        assert_eq!(rig.mode, CameraMode::Orbit);
        assert!((rig.view_yaw() - (-0.4)).abs() < 1e-6);
    }
}
