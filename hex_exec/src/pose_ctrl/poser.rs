//! Per-leg pose sub-state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use util::maths::quartic_bezier;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Pose sub-state of one leg: the pose-modified tip position plus the
/// transition bookkeeping used by choreographed moves.
#[derive(Debug, Clone, Default)]
pub struct LegPoser {
    /// Pose-modified tip position, the input to IK.
    pub current_tip_position: Vector3<f64>,

    /// Target of the transition in progress, if any.
    pub target_tip_position: Vector3<f64>,

    /// Progress of the transition in progress, `[0, 1]`.
    pub transition_progress: f64,

    /// Tip position captured when the transition started.
    origin_tip_position: Option<Vector3<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LegPoser {
    /// Advance a step of the tip towards `target` along a lifted Bézier arc,
    /// by one tick. Returns the transition progress; `1.0` means the tip is
    /// at the target and the transition state has been cleared.
    ///
    /// The origin is captured on the first call of a transition; calling
    /// again with the tip already at the target is a completed no-op, so
    /// sequence drivers may call this every tick without re-triggering a
    /// finished step.
    pub fn step_to_position(
        &mut self,
        target: Vector3<f64>,
        lift_height: f64,
        time_to_step: f64,
        time_delta: f64,
    ) -> f64 {
        if self.origin_tip_position.is_none() {
            if (target - self.current_tip_position).norm() < 1e-9 {
                return 1.0;
            }
            self.origin_tip_position = Some(self.current_tip_position);
            self.transition_progress = 0.0;
        }
        self.target_tip_position = target;

        let origin = self.origin_tip_position.unwrap();
        self.transition_progress =
            (self.transition_progress + time_delta / time_to_step).min(1.0);

        let lift = Vector3::new(0.0, 0.0, lift_height);
        let mid = (origin + target) * 0.5;
        let nodes = [origin, origin + lift, mid + lift * 1.333, target + lift, target];
        self.current_tip_position = quartic_bezier(&nodes, self.transition_progress);

        if self.transition_progress >= 1.0 {
            self.current_tip_position = target;
            self.origin_tip_position = None;
        }

        self.transition_progress
    }

    /// Abandon any transition in progress.
    pub fn reset_transition(&mut self) {
        self.origin_tip_position = None;
        self.transition_progress = 0.0;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_reaches_target() {
        let mut poser = LegPoser::default();
        poser.current_tip_position = Vector3::new(0.1, 0.0, -0.15);
        let target = Vector3::new(0.15, 0.02, -0.15);

        let mut progress = 0.0;
        for _ in 0..60 {
            progress = poser.step_to_position(target, 0.05, 1.0, 0.02);
            if progress >= 1.0 {
                break;
            }
        }

        assert_eq!(progress, 1.0);
        assert!((poser.current_tip_position - target).norm() < 1e-12);
    }

    #[test]
    fn test_completed_step_is_noop() {
        let mut poser = LegPoser::default();
        let target = Vector3::new(0.15, 0.02, -0.15);
        poser.current_tip_position = target;

        // Already there: returns complete without lifting the tip
        let progress = poser.step_to_position(target, 0.05, 1.0, 0.02);
        assert_eq!(progress, 1.0);
        assert!((poser.current_tip_position - target).norm() < 1e-12);
    }

    #[test]
    fn test_step_lifts_tip_midway() {
        let mut poser = LegPoser::default();
        poser.current_tip_position = Vector3::new(0.1, 0.0, -0.15);
        let target = Vector3::new(0.2, 0.0, -0.15);

        let mut max_z = f64::NEG_INFINITY;
        loop {
            let progress = poser.step_to_position(target, 0.06, 1.0, 0.02);
            max_z = max_z.max(poser.current_tip_position.z);
            if progress >= 1.0 {
                break;
            }
        }

        assert!(max_z > -0.15 + 0.04, "tip should lift, peak z was {}", max_z);
        assert!(max_z <= -0.15 + 0.06 + 1e-9);
    }
}
