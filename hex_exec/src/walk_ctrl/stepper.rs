//! Per-leg walk sub-state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Step cycle state of a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// On the ground, sliding backwards in the body frame.
    Stance,

    /// Airborne, tracing the swing arc.
    Swing,

    /// Held at the default position while the walker stops.
    ForceStance,

    /// Parked at the default position, walker stopped.
    ForceStop,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Walk sub-state of one leg, owned by the leg and driven by the walk
/// controller.
#[derive(Debug, Clone)]
pub struct LegStepper {
    pub step_state: StepState,

    /// Absolute phase within the gait cycle, `[0, cycle_length)`.
    pub phase: f64,

    /// This leg's phase offset for the current gait.
    pub phase_offset: f64,

    /// Progress through the current swing, `[0, 1]`. Zero when not swinging.
    pub swing_progress: f64,

    /// Progress through the current stance, `[0, 1]`. Zero when not in
    /// stance.
    pub stance_progress: f64,

    /// Current tip position in the walker (unposed body) frame.
    pub current_tip_position: Vector3<f64>,

    /// Default (neutral stance) tip position for the current parameters.
    pub default_tip_position: Vector3<f64>,

    /// Planar tip displacement over one full stance for the current
    /// commanded velocity.
    pub stride_vector: Vector3<f64>,

    /// Tip position captured at lift-off, start node of the swing arc.
    pub swing_origin: Vector3<f64>,

    /// Swing progress at which the current arc started. Nonzero only when a
    /// leg joins the cycle partway through its swing window, so the arc can
    /// be re-parameterised over the remaining window.
    pub swing_origin_progress: f64,

    /// True once the leg has completed a full swing since the walker
    /// started.
    pub completed_first_step: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for LegStepper {
    fn default() -> Self {
        Self {
            step_state: StepState::ForceStop,
            phase: 0.0,
            phase_offset: 0.0,
            swing_progress: 0.0,
            stance_progress: 0.0,
            current_tip_position: Vector3::zeros(),
            default_tip_position: Vector3::zeros(),
            stride_vector: Vector3::zeros(),
            swing_origin: Vector3::zeros(),
            swing_origin_progress: 0.0,
            completed_first_step: false,
        }
    }
}

impl LegStepper {
    /// Park the stepper at the default tip position.
    pub fn park(&mut self) {
        self.step_state = StepState::ForceStop;
        self.phase = 0.0;
        self.swing_progress = 0.0;
        self.stance_progress = 0.0;
        self.swing_origin_progress = 0.0;
        self.stride_vector = Vector3::zeros();
        self.current_tip_position = self.default_tip_position;
        self.completed_first_step = false;
    }

    /// True if the tip is planar-close to its default position.
    pub fn at_default_position(&self, tolerance: f64) -> bool {
        let offset = self.current_tip_position - self.default_tip_position;
        (offset.x * offset.x + offset.y * offset.y).sqrt() < tolerance
    }
}
