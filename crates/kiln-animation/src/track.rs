//! Keyframe tracks and their sampling

use glam::{Quat, Vec3};

/// How values between two keys are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Hold the earlier key
    Step,
    #[default]
    Linear,
}

/// Bracketing keys for a sample time. `fraction` is 0 when clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPosition {
    pub prev: usize,
    pub next: usize,
    pub fraction: f32,
}

/// Locate `time` in a sorted timestamp array with a linear scan.
///
/// Times at or before the first key clamp to it, times at or after the last
/// key clamp to the last, both with fraction 0 (no extrapolation).
/// `times` must not be empty.
pub fn find_keyframe(times: &[f32], time: f32) -> KeyPosition {
    let last = times.len().saturating_sub(1);
    if time <= times[0] {
        return KeyPosition {
            prev: 0,
            next: 0,
            fraction: 0.0,
        };
    }
    if time >= times[last] {
        return KeyPosition {
            prev: last,
            next: last,
            fraction: 0.0,
        };
    }

    for i in 0..last {
        let (t0, t1) = (times[i], times[i + 1]);
        if time >= t0 && time < t1 {
            let span = t1 - t0;
            let fraction = if span > 0.0 { (time - t0) / span } else { 0.0 };
            return KeyPosition {
                prev: i,
                next: i + 1,
                fraction,
            };
        }
    }

    // Unsorted timestamps; hold the last key
    KeyPosition {
        prev: last,
        next: last,
        fraction: 0.0,
    }
}

/// Values that can be blended between two keys
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        quat_slerp(a, b, t)
    }
}

/// One property of one bone over time
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    pub times: Vec<f32>,
    pub values: Vec<T>,
    pub interpolation: Interpolation,
}

impl<T> Default for Track<T> {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            interpolation: Interpolation::Linear,
        }
    }
}

impl<T: Interpolate> Track<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>, interpolation: Interpolation) -> Self {
        Self {
            times,
            values,
            interpolation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty() || self.values.is_empty()
    }

    pub fn last_time(&self) -> Option<f32> {
        self.times.last().copied()
    }

    /// Sample the track; `None` when it has no keys
    pub fn sample(&self, time: f32) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let key = find_keyframe(&self.times, time);
        let prev = *self.values.get(key.prev)?;
        if key.prev == key.next || self.interpolation == Interpolation::Step {
            return Some(prev);
        }
        let next = *self.values.get(key.next)?;
        Some(T::interpolate(prev, next, key.fraction))
    }
}

/// Quaternion spherical linear interpolation with shortest-path correction.
///
/// The result is normalized.
pub fn quat_slerp(a: Quat, b: Quat, t: f32) -> Quat {
    let mut b = b;
    let mut dot = a.dot(b);

    // Shortest path: if dot < 0, negate b
    if dot < 0.0 {
        b = -b;
        dot = -dot;
    }

    // Nearly parallel: lerp to avoid dividing by sin(~0)
    let (scale_a, scale_b) = if dot > 0.9995 {
        (1.0 - t, t)
    } else {
        let theta = dot.acos();
        let sin_theta = theta.sin();
        (
            ((1.0 - t) * theta).sin() / sin_theta,
            (t * theta).sin() / sin_theta,
        )
    };

    let r = a * scale_a + b * scale_b;
    let len = r.length();
    if len < 1e-10 {
        return Quat::IDENTITY;
    }
    r / len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_keyframe_clamps_with_zero_fraction() {
        let times = [0.5, 1.5];
        assert_eq!(
            find_keyframe(&times, 0.5),
            KeyPosition { prev: 0, next: 0, fraction: 0.0 }
        );
        assert_eq!(
            find_keyframe(&times, -3.0),
            KeyPosition { prev: 0, next: 0, fraction: 0.0 }
        );
        assert_eq!(
            find_keyframe(&times, 1.5),
            KeyPosition { prev: 1, next: 1, fraction: 0.0 }
        );
        assert_eq!(
            find_keyframe(&times, 9.0),
            KeyPosition { prev: 1, next: 1, fraction: 0.0 }
        );
    }

    #[test]
    fn find_keyframe_interior_fraction() {
        let times = [0.0, 1.0, 3.0];
        let key = find_keyframe(&times, 2.0);
        assert_eq!((key.prev, key.next), (1, 2));
        assert!((key.fraction - 0.5).abs() < 1e-6);

        let key = find_keyframe(&times, 1.0);
        assert_eq!((key.prev, key.next), (1, 2));
        assert_eq!(key.fraction, 0.0);
    }

    #[test]
    fn find_keyframe_single_key() {
        let key = find_keyframe(&[2.0], 5.0);
        assert_eq!((key.prev, key.next, key.fraction), (0, 0, 0.0));
    }

    #[test]
    fn track_boundary_values() {
        let track = Track::new(
            vec![0.0, 1.0],
            vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
            Interpolation::Linear,
        );
        assert_eq!(track.sample(0.0), Some(Vec3::ZERO));
        assert_eq!(track.sample(1.0), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(track.sample(4.0), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(track.sample(0.25), Some(Vec3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn step_track_holds_previous() {
        let track = Track::new(
            vec![0.0, 1.0],
            vec![Vec3::ONE, Vec3::splat(2.0)],
            Interpolation::Step,
        );
        assert_eq!(track.sample(0.99), Some(Vec3::ONE));
        assert_eq!(track.sample(1.0), Some(Vec3::splat(2.0)));
    }

    #[test]
    fn empty_track_samples_none() {
        let track: Track<Vec3> = Track::default();
        assert_eq!(track.sample(0.3), None);
    }

    #[test]
    fn slerp_identity_at_endpoints() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);

        assert!(quat_slerp(a, b, 0.0).abs_diff_eq(a, 1e-4));
        assert!(quat_slerp(a, b, 1.0).abs_diff_eq(b, 1e-4));
    }

    #[test]
    fn slerp_midpoint_is_half_angle() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mid = quat_slerp(a, b, 0.5);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn slerp_takes_shortest_path() {
        let a = Quat::IDENTITY;
        // Same rotation as b, opposite hemisphere
        let b = -Quat::from_rotation_z(0.5);
        let mid = quat_slerp(a, b, 0.5);
        let expected = Quat::from_rotation_z(0.25);
        assert!(mid.abs_diff_eq(expected, 1e-4) || mid.abs_diff_eq(-expected, 1e-4));
        assert!(mid.w > 0.0);
    }
}
