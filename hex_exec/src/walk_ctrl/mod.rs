//! Walk controller module
//!
//! Generates per-leg tip trajectories in the walker frame from a commanded
//! body velocity, using the selected gait's phase tables. Each leg's
//! [`LegStepper`] cycles between stance (tip on the ground, sliding
//! backwards) and swing (tip tracing a lifted Bézier arc).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod gait;
mod stepper;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector2, Vector3};
use serde::Serialize;

// Internal
pub use gait::*;
pub use stepper::*;

use crate::model::{LegState, Model};
use crate::params::{HexParams, ParamsError};
use util::maths::{clamp, quartic_bezier};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Commanded speeds below this magnitude are treated as zero.
const VELOCITY_TOLERANCE: f64 = 1e-4;

/// Planar distance below which a tip counts as at its default position.
const TIP_POSITION_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Aggregate state of the walk cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Starting,
    Moving,
    Stopping,
    Stopped,
}

/// Interpretation of the velocity inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VelocityInputMode {
    /// Inputs are in [-1, 1] and scaled by the maximum achievable speed.
    Throttle,

    /// Inputs are in meters/second and radians/second.
    Real,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Status report for walk controller processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WalkStatusReport {
    /// The commanded linear velocity step was clamped by the acceleration
    /// limit.
    pub linear_velocity_clamped: bool,

    /// The commanded angular velocity step was clamped by the acceleration
    /// limit.
    pub angular_velocity_clamped: bool,

    /// At least one leg's stride was clamped by the workspace radius.
    pub stride_clamped: bool,
}

/// The walk controller.
pub struct WalkController {
    walk_state: WalkState,
    gait: Gait,

    time_delta: f64,
    step_frequency: f64,
    step_clearance: f64,
    step_depth: f64,
    leg_span_scale: f64,
    footprint_downscale: f64,
    velocity_input_mode: VelocityInputMode,

    /// Acceleration limits. Negative values disable the clamp.
    max_linear_acceleration: f64,
    max_angular_acceleration: f64,

    /// Configured limits, restored after an unlimited window ends.
    configured_max_linear_acceleration: f64,
    configured_max_angular_acceleration: f64,

    /// Minimum over all legs of the fully extended leg height.
    max_body_height: f64,

    /// Nominal body height, `body_clearance * max_body_height`.
    body_height: f64,

    /// Usable footfall radius around the default tip position.
    workspace_radius: f64,

    /// Largest planar distance of a default tip position from the body
    /// origin, used to bound the angular speed.
    max_stance_radius: f64,

    desired_linear_velocity: Vector2<f64>,
    desired_angular_velocity: f64,

    /// Gait phase accumulated since the walker left STOPPED, wrapped into
    /// the cycle. Drives auto compensation.
    master_phase: f64,

    /// Phase accumulated during STARTING; the walker promotes itself to
    /// MOVING after one full cycle.
    starting_phase_elapsed: f64,

    report: WalkStatusReport,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WalkController {
    /// Create the walk controller and initialise every leg stepper.
    pub fn new(params: &HexParams, model: &mut Model) -> Result<Self, ParamsError> {
        let gait_params = params.current_gait()?;
        let gait = Gait::from_params(&params.walk.gait_type, gait_params);

        let velocity_input_mode = match params.walk.velocity_input_mode.as_str() {
            "throttle" => VelocityInputMode::Throttle,
            "real" => VelocityInputMode::Real,
            other => {
                return Err(ParamsError::Invalid(format!(
                    "Unknown velocity_input_mode: {}",
                    other
                )))
            }
        };

        let mut walker = Self {
            walk_state: WalkState::Stopped,
            gait,
            time_delta: params.control.time_delta,
            step_frequency: params.walk.step_frequency.get(),
            step_clearance: params.walk.step_clearance.get(),
            step_depth: params.walk.step_depth,
            leg_span_scale: params.walk.leg_span_scale.get(),
            footprint_downscale: params.walk.footprint_downscale,
            velocity_input_mode,
            max_linear_acceleration: params.walk.max_linear_acceleration,
            max_angular_acceleration: params.walk.max_angular_acceleration,
            configured_max_linear_acceleration: params.walk.max_linear_acceleration,
            configured_max_angular_acceleration: params.walk.max_angular_acceleration,
            max_body_height: 0.0,
            body_height: 0.0,
            workspace_radius: 0.0,
            max_stance_radius: 0.0,
            desired_linear_velocity: Vector2::zeros(),
            desired_angular_velocity: 0.0,
            master_phase: 0.0,
            starting_phase_elapsed: 0.0,
            report: WalkStatusReport::default(),
        };

        walker.init(params, model)?;
        Ok(walker)
    }

    /// Re-derive the stance geometry and gait tables from the parameters.
    ///
    /// Called at construction, after a gait change and after adjusting a
    /// parameter that affects the stance. The walker must be stopped.
    pub fn init(&mut self, params: &HexParams, model: &mut Model) -> Result<(), ParamsError> {
        let gait_params = params.current_gait()?;
        self.gait = Gait::from_params(&params.walk.gait_type, gait_params);

        self.step_frequency = params.walk.step_frequency.get();
        self.step_clearance = params.walk.step_clearance.get();
        self.leg_span_scale = params.walk.leg_span_scale.get();

        // Maximum body height is bounded by the shortest leg
        self.max_body_height = model
            .legs()
            .iter()
            .map(|leg| leg.max_leg_height())
            .fold(f64::INFINITY, f64::min);
        self.body_height = params.walk.body_clearance.get() * self.max_body_height;

        // Default stance positions and the usable workspace annulus
        let stance_z = -self.body_height;
        let mut workspace_radius = f64::INFINITY;
        let mut max_stance_radius: f64 = 0.0;

        for leg in model.legs_mut() {
            let reach = leg.max_leg_height();
            let planar_reach = (reach * reach - stance_z * stance_z).max(0.0).sqrt();
            let radius = leg.coxa_length() + self.leg_span_scale * planar_reach;

            let outer_margin = leg.coxa_length() + planar_reach - radius;
            let inner_margin = radius - leg.coxa_length();
            workspace_radius = workspace_radius.min(outer_margin.min(inner_margin));

            let yaw = leg.stance_yaw();
            let default_tip = leg.root_position()
                + Vector3::new(radius * yaw.cos(), radius * yaw.sin(), stance_z);

            leg.stepper.default_tip_position = default_tip;
            leg.stepper.phase_offset = self.gait.leg_offset(leg.id_number());

            max_stance_radius = max_stance_radius
                .max((default_tip.x * default_tip.x + default_tip.y * default_tip.y).sqrt());
        }

        self.workspace_radius = workspace_radius * self.footprint_downscale;
        self.max_stance_radius = max_stance_radius;

        Ok(())
    }

    // ---- ACCESSORS ----

    pub fn walk_state(&self) -> WalkState {
        self.walk_state
    }

    pub fn body_height(&self) -> f64 {
        self.body_height
    }

    pub fn max_body_height(&self) -> f64 {
        self.max_body_height
    }

    pub fn workspace_radius(&self) -> f64 {
        self.workspace_radius
    }

    pub fn step_frequency(&self) -> f64 {
        self.step_frequency
    }

    /// Swing lift height for the current parameters.
    pub fn step_clearance_height(&self) -> f64 {
        self.step_clearance * self.max_body_height
    }

    pub fn gait_name(&self) -> &str {
        &self.gait.name
    }

    pub fn desired_linear_velocity(&self) -> Vector2<f64> {
        self.desired_linear_velocity
    }

    pub fn desired_angular_velocity(&self) -> f64 {
        self.desired_angular_velocity
    }

    /// Current gait cycle fraction, `[0, 1)`.
    pub fn cycle_fraction(&self) -> f64 {
        self.master_phase / self.gait.cycle_length()
    }

    pub fn report(&self) -> WalkStatusReport {
        self.report
    }

    /// Maximum achievable linear speed for the current gait geometry: the
    /// stride over a full stance must fit inside the workspace circle.
    pub fn max_linear_speed(&self) -> f64 {
        2.0 * self.workspace_radius * self.step_frequency / self.gait.stance_ratio()
    }

    /// Maximum achievable angular speed, bounded by the outermost leg.
    pub fn max_angular_speed(&self) -> f64 {
        self.max_linear_speed() / self.max_stance_radius
    }

    /// Disable the acceleration clamps until the walker next stops.
    ///
    /// Used immediately after a gait change so the stance can adopt the new
    /// phase tables without a limited transient.
    pub fn set_acceleration_limits_unlimited(&mut self) {
        self.max_linear_acceleration = -1.0;
        self.max_angular_acceleration = -1.0;
    }

    // ---- CYCLIC PROCESSING ----

    /// Advance every walking leg's step cycle by one tick.
    pub fn update_walk(
        &mut self,
        model: &mut Model,
        linear_input: Vector2<f64>,
        angular_input: f64,
    ) {
        self.report = WalkStatusReport::default();

        // Scale and bound the commanded velocity
        let (mut v_in, mut w_in) = match self.velocity_input_mode {
            VelocityInputMode::Throttle => (
                linear_input * self.max_linear_speed(),
                angular_input * self.max_angular_speed(),
            ),
            VelocityInputMode::Real => (linear_input, angular_input),
        };

        let max_lin = self.max_linear_speed();
        if v_in.norm() > max_lin {
            v_in *= max_lin / v_in.norm();
        }
        w_in = clamp(w_in, -self.max_angular_speed(), self.max_angular_speed());

        // Acceleration clamp (negative limit means unlimited)
        if self.max_linear_acceleration >= 0.0 {
            let max_delta = self.max_linear_acceleration * self.time_delta;
            let delta = v_in - self.desired_linear_velocity;
            if delta.norm() > max_delta {
                v_in = self.desired_linear_velocity + delta * (max_delta / delta.norm());
                self.report.linear_velocity_clamped = true;
            }
        }
        if self.max_angular_acceleration >= 0.0 {
            let max_delta = self.max_angular_acceleration * self.time_delta;
            let delta = w_in - self.desired_angular_velocity;
            if delta.abs() > max_delta {
                w_in = self.desired_angular_velocity + delta.signum() * max_delta;
                self.report.angular_velocity_clamped = true;
            }
        }

        self.desired_linear_velocity = v_in;
        self.desired_angular_velocity = w_in;

        let has_command = self.desired_linear_velocity.norm() > VELOCITY_TOLERANCE
            || self.desired_angular_velocity.abs() > VELOCITY_TOLERANCE;

        // Walk state machine
        match self.walk_state {
            WalkState::Stopped if has_command => {
                self.walk_state = WalkState::Starting;
                self.starting_phase_elapsed = 0.0;
                self.master_phase = 0.0;
                for leg in model.legs_mut() {
                    if leg.leg_state() != LegState::Walking {
                        continue;
                    }
                    let stepper = &mut leg.stepper;
                    stepper.phase = stepper.phase_offset;
                    stepper.step_state = if self.gait.in_swing(stepper.phase) {
                        stepper.swing_origin = stepper.current_tip_position;
                        stepper.swing_origin_progress =
                            (stepper.phase - self.gait.stance_phase) / self.gait.swing_phase;
                        StepState::Swing
                    } else {
                        StepState::Stance
                    };
                    stepper.completed_first_step = false;
                }
            }
            WalkState::Starting if !has_command => self.walk_state = WalkState::Stopping,
            WalkState::Moving if !has_command => self.walk_state = WalkState::Stopping,
            WalkState::Stopping if has_command => {
                self.walk_state = WalkState::Moving;
                for leg in model.legs_mut() {
                    if leg.stepper.step_state == StepState::ForceStance {
                        leg.stepper.step_state = StepState::Stance;
                    }
                }
            }
            _ => (),
        }

        if self.walk_state == WalkState::Stopped {
            return;
        }

        let cycle = self.gait.cycle_length();
        let phase_step = cycle * self.step_frequency * self.time_delta;
        let on_ground_time = self.gait.stance_ratio() / self.step_frequency;

        self.master_phase = (self.master_phase + phase_step) % cycle;

        if self.walk_state == WalkState::Starting {
            self.starting_phase_elapsed += phase_step;
            if self.starting_phase_elapsed >= cycle {
                self.walk_state = WalkState::Moving;
            }
        }

        let mut all_parked = true;

        for leg in model.legs_mut() {
            if leg.leg_state() != LegState::Walking {
                continue;
            }
            let stepper = &mut leg.stepper;

            // Stride for the current command: tips move opposite to the body
            let r = stepper.default_tip_position;
            let tip_velocity = Vector2::new(
                -(self.desired_linear_velocity.x - self.desired_angular_velocity * r.y),
                -(self.desired_linear_velocity.y + self.desired_angular_velocity * r.x),
            );
            let mut stride = tip_velocity * on_ground_time;
            let max_stride = 2.0 * self.workspace_radius;
            if stride.norm() > max_stride {
                stride *= max_stride / stride.norm();
                self.report.stride_clamped = true;
            }
            stepper.stride_vector = Vector3::new(stride.x, stride.y, 0.0);

            if stepper.step_state == StepState::ForceStance {
                stepper.current_tip_position = stepper.default_tip_position;
                stepper.swing_progress = 0.0;
                stepper.stance_progress = 0.0;
                continue;
            }

            let was_swinging = stepper.step_state == StepState::Swing;
            let old_phase = stepper.phase;
            stepper.phase = (stepper.phase + phase_step) % cycle;
            let now_swinging = self.gait.in_swing(stepper.phase);

            // Boundary transitions
            if !was_swinging && now_swinging {
                if self.walk_state == WalkState::Stopping
                    && stepper.at_default_position(TIP_POSITION_TOLERANCE)
                {
                    stepper.step_state = StepState::ForceStance;
                    stepper.phase = 0.0;
                    stepper.current_tip_position = stepper.default_tip_position;
                    stepper.swing_progress = 0.0;
                    stepper.stance_progress = 0.0;
                    continue;
                }
                stepper.step_state = StepState::Swing;
                stepper.swing_origin = stepper.current_tip_position;
                stepper.swing_origin_progress = 0.0;
            } else if was_swinging && !now_swinging {
                // Touchdown lands exactly on the target
                stepper.current_tip_position =
                    stepper.default_tip_position + stepper.stride_vector * 0.5;
                stepper.current_tip_position.z = stepper.default_tip_position.z;
                stepper.completed_first_step = true;
                stepper.swing_progress = 0.0;
                if self.walk_state == WalkState::Stopping
                    && stepper.at_default_position(TIP_POSITION_TOLERANCE)
                {
                    stepper.step_state = StepState::ForceStance;
                    stepper.phase = 0.0;
                    stepper.current_tip_position = stepper.default_tip_position;
                    stepper.stance_progress = 0.0;
                    continue;
                }
                stepper.step_state = StepState::Stance;
            }

            match stepper.step_state {
                StepState::Stance => {
                    stepper.stance_progress = stepper.phase / self.gait.stance_phase;
                    stepper.swing_progress = 0.0;

                    // Until a leg has taken its first swing it holds its
                    // position rather than sliding from an unreached
                    // touchdown point.
                    if stepper.completed_first_step {
                        let slide = if old_phase <= stepper.phase {
                            phase_step
                        } else {
                            // Wrapped through the cycle boundary mid-stance
                            stepper.phase
                        };
                        let drift = stepper.stride_vector * (slide / self.gait.stance_phase);
                        stepper.current_tip_position -= drift;
                        stepper.current_tip_position.z = stepper.default_tip_position.z
                            - self.step_depth
                                * (std::f64::consts::PI * stepper.stance_progress).sin();
                    }
                    all_parked = false;
                }
                StepState::Swing => {
                    stepper.swing_progress =
                        (stepper.phase - self.gait.stance_phase) / self.gait.swing_phase;
                    stepper.stance_progress = 0.0;

                    let origin = stepper.swing_origin;
                    let target = {
                        let mut t = stepper.default_tip_position + stepper.stride_vector * 0.5;
                        t.z = stepper.default_tip_position.z;
                        t
                    };
                    let lift = Vector3::new(
                        0.0,
                        0.0,
                        self.step_clearance * self.max_body_height,
                    );
                    let mid = (origin + target) * 0.5;
                    let nodes = [
                        origin,
                        origin + lift,
                        mid + lift * 1.333,
                        target + lift,
                        target,
                    ];
                    // A leg which joined the cycle mid-swing traces its arc
                    // over the remaining window
                    let arc_progress = (stepper.swing_progress - stepper.swing_origin_progress)
                        / (1.0 - stepper.swing_origin_progress).max(1e-9);
                    stepper.current_tip_position = quartic_bezier(&nodes, arc_progress);
                    all_parked = false;
                }
                // Handled above
                StepState::ForceStance | StepState::ForceStop => (),
            }
        }

        // Once every walking leg is held at its default position the walker
        // is stopped.
        if self.walk_state == WalkState::Stopping && all_parked {
            self.walk_state = WalkState::Stopped;
            self.desired_linear_velocity = Vector2::zeros();
            self.desired_angular_velocity = 0.0;
            self.master_phase = 0.0;
            for leg in model.legs_mut() {
                if leg.leg_state() == LegState::Walking {
                    leg.stepper.park();
                }
            }

            // An unlimited acceleration window (post gait change) ends here
            self.max_linear_acceleration = self.configured_max_linear_acceleration;
            self.max_angular_acceleration = self.configured_max_angular_acceleration;
        }
    }

    /// Integrate manual tip velocities into manually controlled legs.
    pub fn update_manual(
        &mut self,
        model: &mut Model,
        primary_leg: Option<usize>,
        primary_tip_velocity: Vector3<f64>,
        secondary_leg: Option<usize>,
        secondary_tip_velocity: Vector3<f64>,
    ) {
        for (selection, velocity) in [
            (primary_leg, primary_tip_velocity),
            (secondary_leg, secondary_tip_velocity),
        ] {
            let leg = match selection.and_then(|id| model.leg_by_id_mut(id)) {
                Some(l) => l,
                None => continue,
            };
            if leg.leg_state() != LegState::Manual {
                continue;
            }

            let stepper = &mut leg.stepper;
            let mut tip = stepper.current_tip_position + velocity * self.time_delta;

            // Keep the tip within the planar workspace and sane heights
            let offset = Vector2::new(
                tip.x - stepper.default_tip_position.x,
                tip.y - stepper.default_tip_position.y,
            );
            if offset.norm() > self.workspace_radius {
                let scaled = offset * (self.workspace_radius / offset.norm());
                tip.x = stepper.default_tip_position.x + scaled.x;
                tip.y = stepper.default_tip_position.y + scaled.y;
            }
            tip.z = clamp(tip.z, -self.max_body_height, 0.0);

            stepper.current_tip_position = tip;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test_params;

    fn walker_and_model() -> (WalkController, Model) {
        let params = test_params();
        let mut model = Model::new(&params).unwrap();
        model.init_legs(true);
        let mut walker = WalkController::new(&params, &mut model).unwrap();

        // Park every leg at its default stance
        for leg in model.legs_mut() {
            leg.stepper.park();
        }
        // Walker starts stopped
        assert_eq!(walker.walk_state(), WalkState::Stopped);
        walker.report = WalkStatusReport::default();
        (walker, model)
    }

    /// Tick the walker with a constant command.
    fn tick_n(
        walker: &mut WalkController,
        model: &mut Model,
        v: Vector2<f64>,
        w: f64,
        n: usize,
    ) {
        for _ in 0..n {
            walker.update_walk(model, v, w);
        }
    }

    #[test]
    fn test_tripod_stance_count_while_moving() {
        let (mut walker, mut model) = walker_and_model();
        let v = Vector2::new(0.05, 0.0);

        // Get past STARTING (one full cycle at 1 Hz, 0.02 s ticks = 200
        // ticks) plus margin
        tick_n(&mut walker, &mut model, v, 0.0, 250);
        assert_eq!(walker.walk_state(), WalkState::Moving);

        for _ in 0..200 {
            walker.update_walk(&mut model, v, 0.0);
            let stance_count = model
                .legs()
                .iter()
                .filter(|leg| {
                    matches!(
                        leg.stepper.step_state,
                        StepState::Stance | StepState::ForceStance
                    )
                })
                .count();
            assert_eq!(stance_count, 3, "tripod gait must keep 3 legs grounded");
        }
    }

    #[test]
    fn test_acceleration_clamp_boundary() {
        let (mut walker, mut model) = walker_and_model();

        // A step command far above what one tick of acceleration allows
        walker.update_walk(&mut model, Vector2::new(1.0, 0.0), 0.0);

        let expected = walker.configured_max_linear_acceleration * walker.time_delta;
        assert!(walker.report().linear_velocity_clamped);
        assert!((walker.desired_linear_velocity().norm() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_stops_and_parks_on_zero_command() {
        let (mut walker, mut model) = walker_and_model();
        let v = Vector2::new(0.05, 0.0);

        tick_n(&mut walker, &mut model, v, 0.0, 300);
        assert_eq!(walker.walk_state(), WalkState::Moving);

        // Remove the command and run for up to three cycles
        tick_n(&mut walker, &mut model, Vector2::zeros(), 0.0, 600);
        assert_eq!(walker.walk_state(), WalkState::Stopped);

        for leg in model.legs() {
            assert_eq!(leg.stepper.step_state, StepState::ForceStop);
            assert!(
                (leg.stepper.current_tip_position - leg.stepper.default_tip_position).norm()
                    < 1e-9
            );
        }
    }

    #[test]
    fn test_unlimited_acceleration_window_restored_on_stop() {
        let (mut walker, mut model) = walker_and_model();

        walker.set_acceleration_limits_unlimited();
        walker.update_walk(&mut model, Vector2::new(0.05, 0.0), 0.0);

        // With the sentinel set the full command is reached in one tick
        assert!(!walker.report().linear_velocity_clamped);
        assert!((walker.desired_linear_velocity().x - 0.05).abs() < 1e-9);

        // Stop; the configured limits return
        tick_n(&mut walker, &mut model, Vector2::zeros(), 0.0, 600);
        assert_eq!(walker.walk_state(), WalkState::Stopped);
        assert_eq!(
            walker.max_linear_acceleration,
            walker.configured_max_linear_acceleration
        );
    }

    #[test]
    fn test_swing_stays_within_clearance() {
        let (mut walker, mut model) = walker_and_model();
        let v = Vector2::new(0.05, 0.0);
        let clearance = walker.step_clearance * walker.max_body_height();

        tick_n(&mut walker, &mut model, v, 0.0, 250);
        for _ in 0..400 {
            walker.update_walk(&mut model, v, 0.0);
            for leg in model.legs() {
                let stepper = &leg.stepper;
                if stepper.step_state == StepState::Swing {
                    let height = stepper.current_tip_position.z
                        - stepper.default_tip_position.z;
                    // Lift-off may start from the stance preload dip
                    assert!(height >= -walker.step_depth - 1e-9);
                    assert!(height <= clearance + 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_manual_leg_ignored_by_walk_and_clamped_by_manual() {
        let (mut walker, mut model) = walker_and_model();

        model
            .leg_by_id_mut(0)
            .unwrap()
            .set_leg_state(LegState::Manual);

        // Push the manual leg outward for a long time; it must stay inside
        // the workspace radius
        for _ in 0..500 {
            walker.update_manual(
                &mut model,
                Some(0),
                Vector3::new(0.05, 0.0, 0.0),
                None,
                Vector3::zeros(),
            );
        }
        let leg = model.leg_by_id(0).unwrap();
        let offset = leg.stepper.current_tip_position - leg.stepper.default_tip_position;
        let planar = (offset.x * offset.x + offset.y * offset.y).sqrt();
        assert!(planar <= walker.workspace_radius() + 1e-9);

        // The walk update leaves the manual leg parked
        walker.update_walk(&mut model, Vector2::new(0.05, 0.0), 0.0);
        let leg = model.leg_by_id(0).unwrap();
        assert_eq!(leg.stepper.step_state, StepState::ForceStop);
    }
}
