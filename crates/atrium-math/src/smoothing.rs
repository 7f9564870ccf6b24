//! Exponential smoothing parameterized by elapsed time rather than a
//! fixed per-frame factor, so convergence speed does not depend on the
//! caller's frame rate.

use glam::Vec3;

/// Blend weight for one smoothing step of `dt` seconds at the given
/// per-second decay rate: `1 - exp(-rate * dt)`, clamped to [0, 1].
///
/// Two steps of `dt/2` compose to the same total blend as one step of
/// `dt`, which is the whole point.
pub fn decay_blend(rate: f32, dt: f32) -> f32 {
    if rate <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt).exp()
}

/// Moves `current` toward `target` by one smoothing step.
pub fn smooth_f32(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current + (target - current) * decay_blend(rate, dt)
}

/// Moves `current` toward `target` by one smoothing step.
pub fn smooth_vec3(current: Vec3, target: Vec3, rate: f32, dt: f32) -> Vec3 {
    current + (target - current) * decay_blend(rate, dt)
}

/// Wraps an angle in radians to the range [-PI, PI].
pub fn wrap_angle(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let wrapped = angle.rem_euclid(two_pi);
    if wrapped > std::f32::consts::PI {
        wrapped - two_pi
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in [-PI, PI].
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Smooths an angle toward a target along the shortest arc, so a yaw
/// crossing the ±PI seam never spins the long way round.
pub fn smooth_angle(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    wrap_angle(current + shortest_arc(current, target) * decay_blend(rate, dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_decay_blend_range() {
        let b = decay_blend(10.0, 1.0 / 60.0);
        assert!(b > 0.0 && b < 1.0);
        assert_eq!(decay_blend(10.0, 0.0), 0.0);
        assert_eq!(decay_blend(0.0, 0.5), 0.0);
    }

    #[test]
    fn test_two_half_steps_equal_one_full_step() {
        let rate = 8.0;
        let full = smooth_f32(0.0, 1.0, rate, 0.1);
        let half = smooth_f32(0.0, 1.0, rate, 0.05);
        let two = smooth_f32(half, 1.0, rate, 0.05);
        assert!((full - two).abs() < EPS, "full={full} two={two}");
    }

    #[test]
    fn test_smooth_vec3_converges() {
        let mut p = Vec3::ZERO;
        let target = Vec3::new(3.0, 0.0, -4.0);
        for _ in 0..300 {
            p = smooth_vec3(p, target, 12.0, 1.0 / 60.0);
        }
        assert!((p - target).length() < 1e-3);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(0.0)).abs() < EPS);
        assert!((wrap_angle(3.0 * PI) - PI).abs() < EPS);
        assert!((wrap_angle(-3.0 * PI) - PI).abs() < EPS);
        assert!((wrap_angle(PI / 2.0) - PI / 2.0).abs() < EPS);
    }

    #[test]
    fn test_shortest_arc_crosses_seam() {
        // 170° to -170° is 20° forward, not 340° back.
        let from = 170.0_f32.to_radians();
        let to = -170.0_f32.to_radians();
        let arc = shortest_arc(from, to);
        assert!((arc - 20.0_f32.to_radians()).abs() < EPS);
    }

    #[test]
    fn test_smooth_angle_takes_short_way() {
        let from = 170.0_f32.to_radians();
        let to = -170.0_f32.to_radians();
        let stepped = smooth_angle(from, to, 10.0, 0.05);
        // Must move toward +PI (and possibly wrap), never back toward 0.
        assert!(stepped > from || stepped < to + EPS);
        let mut a = from;
        for _ in 0..200 {
            a = smooth_angle(a, to, 10.0, 1.0 / 60.0);
        }
        assert!(shortest_arc(a, to).abs() < 1e-3);
    }
}
