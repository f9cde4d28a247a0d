//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;
use std::ops::{Add, Mul};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Smooth (cosine) interpolation between `a` and `b` for `t` in `[0, 1]`.
///
/// Has zero first derivative at both ends, so joint-space moves built on it
/// start and finish at rest.
pub fn smooth_step<T>(a: T, b: T, t: f64) -> T
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    let t = clamp(t, 0.0, 1.0);
    let s = 0.5 - 0.5 * (std::f64::consts::PI * t).cos();
    a * (1.0 - s) + b * s
}

/// Evaluate a quartic Bézier curve at `t` in `[0, 1]`.
///
/// Used for swing trajectories: the extra control node over a cubic gives
/// independent control of lift-off and touch-down tangents and apex height.
pub fn quartic_bezier<T>(nodes: &[T; 5], t: f64) -> T
where
    T: Copy + Add<Output = T> + Mul<f64, Output = T>,
{
    let t = clamp(t, 0.0, 1.0);
    let s = 1.0 - t;

    nodes[0] * (s * s * s * s)
        + nodes[1] * (4.0 * s * s * s * t)
        + nodes[2] * (6.0 * s * s * t * t)
        + nodes[3] * (4.0 * s * t * t * t)
        + nodes[4] * (t * t * t * t)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() {
        r + rhs.abs()
    } else {
        r
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 1.0), (0.0, 10.0), 0.5), 5.0);
        assert_eq!(lin_map((-1.0, 1.0), (0.0, 1.0), 0.0), 0.5);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.7, 0.0, 1.0), 0.7);
    }

    #[test]
    fn test_smooth_step_endpoints() {
        assert!((smooth_step(1.0, 3.0, 0.0) - 1.0).abs() < 1e-12);
        assert!((smooth_step(1.0, 3.0, 1.0) - 3.0).abs() < 1e-12);
        assert!((smooth_step(1.0, 3.0, 0.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_quartic_bezier_endpoints() {
        let nodes = [0.0, 0.1, 0.5, 0.9, 1.0];
        assert!((quartic_bezier(&nodes, 0.0) - 0.0).abs() < 1e-12);
        assert!((quartic_bezier(&nodes, 1.0) - 1.0).abs() < 1e-12);

        // Symmetric nodes peak at the midpoint
        let arc = [0.0, 0.0, 1.0, 0.0, 0.0];
        let apex = quartic_bezier(&arc, 0.5);
        assert!(apex > quartic_bezier(&arc, 0.25));
        assert!(apex > quartic_bezier(&arc, 0.75));
    }

    #[test]
    fn test_rem_euclid() {
        assert_eq!(rem_euclid(5.0, 4.0), 1.0);
        assert_eq!(rem_euclid(-1.0, 4.0), 3.0);
    }
}
