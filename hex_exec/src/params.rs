//! Parameters structure for the hexapod executable
//!
//! The full parameter tree is loaded once at init from a TOML file. Anything
//! missing or out of bounds is a fatal init error — the controller never runs
//! with a partial configuration.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// Internal
use comms_if::tc::{GaitDesignation, ParameterSelection};
use util::maths::clamp;
use util::params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the hexapod executable.
#[derive(Debug, Clone, Deserialize)]
pub struct HexParams {
    pub control: ControlParams,
    pub model: ModelParams,
    pub walk: WalkParams,
    pub pose: PoseParams,
    pub impedance: ImpedanceParams,
    pub gaits: GaitSet,
}

/// Control loop and compensation-enable parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlParams {
    /// Period of one control tick in seconds.
    pub time_delta: f64,

    /// Enable IMU-driven orientation compensation.
    pub imu_compensation: bool,

    /// Enable gait-phase-locked auto compensation.
    pub auto_compensation: bool,

    /// Enable manual posing input.
    pub manual_compensation: bool,

    /// Enable inclination (slope) compensation.
    pub inclination_compensation: bool,

    /// Enable the vertical impedance loop.
    pub impedance_control: bool,

    /// Euler rotation (roll, pitch, yaw) applied to raw IMU data to account
    /// for the physical IMU mounting.
    ///
    /// Units: radians
    pub imu_rotation_offset: [f64; 3],

    /// Servo speed used by the actuator interface while it configures the
    /// bus at startup.
    ///
    /// Units: radians/second
    pub interface_setup_speed: f64,
}

/// Kinematic model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelParams {
    /// Free-form platform designation, reported in telemetry.
    pub hexapod_type: String,

    /// Leg names ordered by leg ID. The order is meaningful: it is the gait
    /// phase index.
    pub leg_id: Vec<String>,

    /// Joint names, base to tip.
    pub joint_id: Vec<String>,

    /// Link names, base to tip (one more entry than `joint_id`).
    pub link_id: Vec<String>,

    /// Mounting yaw of each leg in the body frame, ordered by leg ID.
    ///
    /// Units: radians
    pub leg_stance_yaws: Vec<f64>,

    /// Per-leg geometry blocks, ordered by leg ID.
    pub legs: Vec<LegParams>,
}

/// Geometry of a single leg.
#[derive(Debug, Clone, Deserialize)]
pub struct LegParams {
    /// Name of this leg, must match the entry in `leg_id`.
    pub id_name: String,

    /// Degrees of freedom of this leg. Must equal the number of joint blocks.
    pub dof: usize,

    /// Position of the leg root (coxa yaw axis) in the body frame.
    ///
    /// Units: meters
    pub root_position: [f64; 3],

    /// Per-joint parameter blocks, base to tip.
    pub joints: Vec<JointParams>,

    /// Per-link parameter blocks, base to tip.
    pub links: Vec<LinkParams>,
}

/// Parameters of a single joint.
#[derive(Debug, Clone, Deserialize)]
pub struct JointParams {
    /// Name of the joint within the leg (e.g. "coxa").
    pub id_name: String,

    /// Offset subtracted from measured positions to zero the joint.
    pub position_offset: f64,

    /// Joint position when the leg is packed for transport.
    pub packed_position: f64,

    /// Joint position when the leg is unpacked (ready stance).
    pub unpacked_position: f64,

    /// Minimum allowed joint position.
    pub min_position: f64,

    /// Maximum allowed joint position.
    pub max_position: f64,

    /// Maximum allowed joint angular speed.
    ///
    /// Units: radians/second
    pub max_angular_speed: f64,
}

/// Parameters of a single link.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkParams {
    /// Name of the link within the leg (e.g. "femur").
    pub id_name: String,

    /// Link length in meters.
    pub length: f64,

    /// Link mass in kilograms.
    pub mass: f64,
}

/// Walk controller parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct WalkParams {
    /// Name of the gait in use, one of the `[gaits]` table keys.
    pub gait_type: String,

    /// Step cycle frequency in Hz.
    pub step_frequency: AdjustableParam,

    /// Swing lift height as a fraction of the maximum body height.
    pub step_clearance: AdjustableParam,

    /// Stance touchdown preload depth in meters.
    pub step_depth: f64,

    /// Nominal body height as a fraction of the maximum body height.
    pub body_clearance: AdjustableParam,

    /// Scale applied to the default stance radius.
    pub leg_span_scale: AdjustableParam,

    /// Maximum body linear acceleration. Negative values disable the clamp.
    ///
    /// Units: meters/second^2
    pub max_linear_acceleration: f64,

    /// Maximum body angular acceleration. Negative values disable the clamp.
    ///
    /// Units: radians/second^2
    pub max_angular_acceleration: f64,

    /// Fraction of the geometric workspace radius actually used for
    /// footfalls.
    pub footprint_downscale: f64,

    /// Interpretation of velocity inputs: "throttle" (inputs in [-1, 1]
    /// scaled by the maximum achievable speed) or "real" (meters/second).
    pub velocity_input_mode: String,

    /// If true, cruise control uses the configured cruise velocities instead
    /// of capturing the current input.
    pub force_cruise_velocity: bool,

    /// Configured cruise linear velocity (x, y).
    pub linear_cruise_velocity: [f64; 2],

    /// Configured cruise angular velocity.
    pub angular_cruise_velocity: f64,
}

/// Pose controller parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseParams {
    /// If false the packing/unpacking and startup choreographies are skipped
    /// and READY/PACKED targets are rewritten to OFF.
    pub start_up_sequence: bool,

    /// Duration of the direct startup interpolation in seconds.
    pub time_to_start: f64,

    /// Gains for the orientation compensation controller.
    pub rotation_pid_gains: PidGains,

    /// Gains for the translation compensation controller.
    pub translation_pid_gains: PidGains,

    /// Amplitudes for the gait-phase-locked auto compensation.
    pub auto_compensation_params: AutoCompensationParams,

    /// Maximum body translation per axis in meters.
    pub max_translation: [f64; 3],

    /// Maximum body translation speed in meters/second.
    pub max_translation_velocity: f64,

    /// Maximum body rotation per axis in radians.
    pub max_rotation: f64,

    /// Maximum body rotation speed in radians/second.
    pub max_rotation_velocity: f64,

    /// Manual leg manipulation mode, "tip_control" or "joint_control".
    pub leg_manipulation_mode: String,
}

/// Absement/position/velocity gains for a pose compensation axis group.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PidGains {
    pub absement: f64,
    pub position: f64,
    pub velocity: f64,
}

/// Amplitudes of the phase-locked pose sway.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AutoCompensationParams {
    pub roll_amplitude: f64,
    pub pitch_amplitude: f64,
    pub z_translation_amplitude: f64,
}

/// Impedance controller parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ImpedanceParams {
    /// Modulate per-leg stiffness with the walk phase.
    pub dynamic_stiffness: bool,

    /// Derive tip force from summed joint efforts instead of the dedicated
    /// force array.
    pub use_joint_effort: bool,

    /// Integration sub-step of the virtual spring/damper ODE in seconds.
    pub integrator_step_time: f64,

    /// Virtual mass in kilograms.
    pub virtual_mass: AdjustableParam,

    /// Virtual stiffness in newtons/meter.
    pub virtual_stiffness: AdjustableParam,

    /// Virtual damping ratio (dimensionless).
    pub virtual_damping_ratio: AdjustableParam,

    /// Gain applied to the measured tip force.
    pub force_gain: AdjustableParam,

    /// Stiffness multiplier for legs bearing redistributed load.
    pub load_stiffness_scaler: f64,

    /// Stiffness multiplier for swinging legs.
    pub swing_stiffness_scaler: f64,

    /// Offset subtracted from raw tip force readings.
    pub force_offset: f64,

    /// Upper clamp applied to offset tip force readings.
    pub max_force: f64,
}

/// An adjustable runtime parameter with bounds and an adjustment step.
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustableParam {
    /// Human readable name, used in adjustment logs.
    pub name: String,

    /// Current value. Invariant: `min <= value <= max`.
    pub value: f64,

    /// Configured default value.
    pub default: f64,

    /// Lower bound.
    pub min: f64,

    /// Upper bound.
    pub max: f64,

    /// Signed step applied per adjustment command.
    pub adjust_step: f64,
}

/// The set of gait definitions.
#[derive(Debug, Clone, Deserialize)]
pub struct GaitSet {
    pub tripod_gait: GaitParams,
    pub ripple_gait: GaitParams,
    pub wave_gait: GaitParams,
    pub amble_gait: GaitParams,
}

/// A single gait definition.
///
/// A leg's phase offset is `(phase_offset * offset_multiplier[leg]) mod
/// (stance_phase + swing_phase)`.
#[derive(Debug, Clone, Deserialize)]
pub struct GaitParams {
    pub stance_phase: f64,
    pub swing_phase: f64,
    pub phase_offset: f64,
    pub offset_multiplier: Vec<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs while loading or validating the parameter tree.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Could not load the parameter file: {0}")]
    LoadError(params::LoadError),

    #[error("Invalid parameters: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HexParams {
    /// Load the parameter tree from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self, ParamsError> {
        let params: HexParams = params::load(path).map_err(ParamsError::LoadError)?;
        params.validate()?;
        Ok(params)
    }

    /// Check the structural invariants of the tree.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let num_legs = self.model.leg_id.len();

        if self.model.legs.len() != num_legs {
            return Err(ParamsError::Invalid(format!(
                "Expected {} leg blocks, found {}",
                num_legs,
                self.model.legs.len()
            )));
        }
        if self.model.leg_stance_yaws.len() != num_legs {
            return Err(ParamsError::Invalid(format!(
                "Expected {} leg stance yaws, found {}",
                num_legs,
                self.model.leg_stance_yaws.len()
            )));
        }

        for (i, leg) in self.model.legs.iter().enumerate() {
            if leg.id_name != self.model.leg_id[i] {
                return Err(ParamsError::Invalid(format!(
                    "Leg block {} is named {} but leg_id says {}",
                    i, leg.id_name, self.model.leg_id[i]
                )));
            }
            if leg.joints.len() < leg.dof {
                return Err(ParamsError::Invalid(format!(
                    "Leg {} has {} joint blocks but {} degrees of freedom",
                    leg.id_name,
                    leg.joints.len(),
                    leg.dof
                )));
            }
            if leg.links.len() != leg.joints.len() + 1 {
                return Err(ParamsError::Invalid(format!(
                    "Leg {} has {} link blocks, expected {}",
                    leg.id_name,
                    leg.links.len(),
                    leg.joints.len() + 1
                )));
            }
            for joint in leg.joints.iter() {
                if joint.min_position > joint.max_position {
                    return Err(ParamsError::Invalid(format!(
                        "Joint {}_{} has min_position > max_position",
                        leg.id_name, joint.id_name
                    )));
                }
            }
        }

        for gait in [
            &self.gaits.tripod_gait,
            &self.gaits.ripple_gait,
            &self.gaits.wave_gait,
            &self.gaits.amble_gait,
        ] {
            if gait.offset_multiplier.len() != num_legs {
                return Err(ParamsError::Invalid(format!(
                    "Gait offset_multiplier has {} entries, expected {}",
                    gait.offset_multiplier.len(),
                    num_legs
                )));
            }
            if gait.stance_phase <= 0.0 || gait.swing_phase <= 0.0 {
                return Err(ParamsError::Invalid(
                    "Gait stance_phase and swing_phase must be positive".into(),
                ));
            }
        }

        for param in [
            &self.walk.step_frequency,
            &self.walk.step_clearance,
            &self.walk.body_clearance,
            &self.walk.leg_span_scale,
            &self.impedance.virtual_mass,
            &self.impedance.virtual_stiffness,
            &self.impedance.virtual_damping_ratio,
            &self.impedance.force_gain,
        ] {
            param.validate()?;
        }

        Ok(())
    }

    /// Get the gait definition currently selected by `walk.gait_type`.
    pub fn current_gait(&self) -> Result<&GaitParams, ParamsError> {
        self.gaits
            .by_name(&self.walk.gait_type)
            .ok_or_else(|| ParamsError::Invalid(format!("Unknown gait: {}", self.walk.gait_type)))
    }

    /// Switch `walk.gait_type` to the given designation.
    pub fn select_gait(&mut self, designation: GaitDesignation) {
        if let Some(name) = gait_name(designation) {
            self.walk.gait_type = name.into();
        }
    }

    /// Get a mutable reference to the runtime-adjustable parameter named by
    /// the selection, or `None` for `NoSelection`.
    pub fn select(&mut self, selection: ParameterSelection) -> Option<&mut AdjustableParam> {
        match selection {
            ParameterSelection::NoSelection => None,
            ParameterSelection::StepFrequency => Some(&mut self.walk.step_frequency),
            ParameterSelection::StepClearance => Some(&mut self.walk.step_clearance),
            ParameterSelection::BodyClearance => Some(&mut self.walk.body_clearance),
            ParameterSelection::LegSpanScale => Some(&mut self.walk.leg_span_scale),
            ParameterSelection::VirtualMass => Some(&mut self.impedance.virtual_mass),
            ParameterSelection::VirtualStiffness => Some(&mut self.impedance.virtual_stiffness),
            ParameterSelection::VirtualDamping => Some(&mut self.impedance.virtual_damping_ratio),
            ParameterSelection::ForceGain => Some(&mut self.impedance.force_gain),
        }
    }

    /// Get an immutable view of the selected adjustable parameter.
    pub fn selected(&self, selection: ParameterSelection) -> Option<&AdjustableParam> {
        match selection {
            ParameterSelection::NoSelection => None,
            ParameterSelection::StepFrequency => Some(&self.walk.step_frequency),
            ParameterSelection::StepClearance => Some(&self.walk.step_clearance),
            ParameterSelection::BodyClearance => Some(&self.walk.body_clearance),
            ParameterSelection::LegSpanScale => Some(&self.walk.leg_span_scale),
            ParameterSelection::VirtualMass => Some(&self.impedance.virtual_mass),
            ParameterSelection::VirtualStiffness => Some(&self.impedance.virtual_stiffness),
            ParameterSelection::VirtualDamping => Some(&self.impedance.virtual_damping_ratio),
            ParameterSelection::ForceGain => Some(&self.impedance.force_gain),
        }
    }
}

impl AdjustableParam {
    /// Get the current value.
    pub fn get(&self) -> f64 {
        self.value
    }

    /// Apply one adjustment step, clamped into `[min, max]`.
    ///
    /// Returns true if the value hit a bound.
    pub fn adjust(&mut self) -> bool {
        let unclamped = self.value + self.adjust_step;
        self.value = clamp(unclamped, self.min, self.max);
        (unclamped - self.value).abs() > 0.0
    }

    /// Make the adjustment step match the requested direction, flipping its
    /// sign if they oppose.
    pub fn set_direction(&mut self, direction: i8) {
        if (direction as f64) * self.adjust_step < 0.0 {
            self.adjust_step = -self.adjust_step;
        }
    }

    fn validate(&self) -> Result<(), ParamsError> {
        if self.min > self.max || self.value < self.min || self.value > self.max {
            return Err(ParamsError::Invalid(format!(
                "Adjustable parameter '{}' violates min <= value <= max \
                 ({} <= {} <= {})",
                self.name, self.min, self.value, self.max
            )));
        }
        Ok(())
    }
}

impl GaitSet {
    /// Look a gait up by its table name.
    pub fn by_name(&self, name: &str) -> Option<&GaitParams> {
        match name {
            "tripod_gait" => Some(&self.tripod_gait),
            "ripple_gait" => Some(&self.ripple_gait),
            "wave_gait" => Some(&self.wave_gait),
            "amble_gait" => Some(&self.amble_gait),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a gait designation to its parameter table name.
pub fn gait_name(designation: GaitDesignation) -> Option<&'static str> {
    match designation {
        GaitDesignation::Tripod => Some("tripod_gait"),
        GaitDesignation::Ripple => Some("ripple_gait"),
        GaitDesignation::Wave => Some("wave_gait"),
        GaitDesignation::Amble => Some("amble_gait"),
        GaitDesignation::Undesignated => None,
    }
}

/// Map a gait table name to its designation.
pub fn gait_designation(name: &str) -> GaitDesignation {
    match name {
        "tripod_gait" => GaitDesignation::Tripod,
        "ripple_gait" => GaitDesignation::Ripple,
        "wave_gait" => GaitDesignation::Wave,
        "amble_gait" => GaitDesignation::Amble,
        _ => GaitDesignation::Undesignated,
    }
}

/// True if adjusting this parameter changes the stance geometry, requiring
/// the walk controller to be re-initialised.
pub fn affects_stance(selection: ParameterSelection) -> bool {
    matches!(
        selection,
        ParameterSelection::StepFrequency
            | ParameterSelection::StepClearance
            | ParameterSelection::BodyClearance
            | ParameterSelection::LegSpanScale
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

/// Parse the default configuration shipped in `config/hexapod.toml`.
#[cfg(test)]
pub fn test_params() -> HexParams {
    let params: HexParams =
        toml::from_str(include_str!("../../config/hexapod.toml")).expect("default config parses");
    params.validate().expect("default config is valid");
    params
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let params = test_params();
        assert_eq!(params.model.leg_id.len(), 6);
        assert_eq!(params.model.legs.len(), 6);
        assert!(params.current_gait().is_ok());
    }

    #[test]
    fn test_adjust_clamps_to_bounds() {
        let mut params = test_params();

        let p = params
            .select(ParameterSelection::StepFrequency)
            .expect("step frequency is selectable");
        p.value = p.max - p.adjust_step / 2.0;

        // First step hits the bound, second one stays clamped there
        assert!(p.adjust());
        assert_eq!(p.value, p.max);
        assert!(p.adjust());
        assert_eq!(p.value, p.max);
    }

    #[test]
    fn test_set_direction_flips_step() {
        let mut params = test_params();
        let p = params
            .select(ParameterSelection::VirtualStiffness)
            .unwrap();

        let step = p.adjust_step;
        p.set_direction(-1);
        assert_eq!(p.adjust_step, -step);
        p.set_direction(-1);
        assert_eq!(p.adjust_step, -step);
        p.set_direction(1);
        assert_eq!(p.adjust_step, step);
        p.set_direction(0);
        assert_eq!(p.adjust_step, step);
    }

    #[test]
    fn test_gait_name_mapping() {
        use comms_if::tc::GaitDesignation;

        assert_eq!(gait_name(GaitDesignation::Wave), Some("wave_gait"));
        assert_eq!(gait_designation("wave_gait"), GaitDesignation::Wave);
        assert_eq!(gait_name(GaitDesignation::Undesignated), None);
    }

    #[test]
    fn test_out_of_bounds_param_rejected() {
        let mut params = test_params();
        params.walk.step_frequency.value = params.walk.step_frequency.max + 1.0;
        assert!(params.validate().is_err());
    }
}
