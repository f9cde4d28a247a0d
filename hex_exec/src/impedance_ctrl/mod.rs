//! Impedance controller module
//!
//! Runs a per-leg second-order virtual spring/damper in the vertical axis,
//! driven by the measured tip force:
//!
//! `virtual_mass * z'' + virtual_damping * z' + virtual_stiffness * z =
//! force_gain * tip_force`
//!
//! The integrated displacement is published as the leg's `delta_z` and
//! subtracted from the posed tip position before IK, so a foot pressed into
//! terrain shortens its leg instead of fighting it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::model::{LegState, Model};
use crate::params::HexParams;
use crate::walk_ctrl::StepState;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Hard bound on the vertical tip deflection the impedance loop may command.
const MAX_TIP_DEFLECTION: f64 = 0.06;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The impedance controller.
pub struct ImpedanceController {
    time_delta: f64,
    integrator_step_time: f64,
    virtual_mass: f64,
    virtual_stiffness: f64,
    virtual_damping_ratio: f64,
    force_gain: f64,
    load_stiffness_scaler: f64,
    swing_stiffness_scaler: f64,
    use_joint_effort: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ImpedanceController {
    pub fn new(params: &HexParams, model: &mut Model) -> Self {
        let mut controller = Self {
            time_delta: params.control.time_delta,
            integrator_step_time: params.impedance.integrator_step_time,
            virtual_mass: 0.0,
            virtual_stiffness: 0.0,
            virtual_damping_ratio: 0.0,
            force_gain: 0.0,
            load_stiffness_scaler: params.impedance.load_stiffness_scaler,
            swing_stiffness_scaler: params.impedance.swing_stiffness_scaler,
            use_joint_effort: params.impedance.use_joint_effort,
        };
        controller.init(params, model);
        controller
    }

    /// Reload the adjustable gains and reset the per-leg integrator state.
    ///
    /// Called at construction and whenever an impedance parameter is
    /// adjusted at runtime.
    pub fn init(&mut self, params: &HexParams, model: &mut Model) {
        self.virtual_mass = params.impedance.virtual_mass.get();
        self.virtual_stiffness = params.impedance.virtual_stiffness.get();
        self.virtual_damping_ratio = params.impedance.virtual_damping_ratio.get();
        self.force_gain = params.impedance.force_gain.get();

        for leg in model.legs_mut() {
            leg.set_virtual_stiffness(self.virtual_stiffness);
            *leg.impedance_state_mut() = [0.0, 0.0];
            leg.set_delta_z(0.0);
        }
    }

    pub fn default_stiffness(&self) -> f64 {
        self.virtual_stiffness
    }

    /// Integrate the virtual spring/damper of one leg over a tick.
    pub fn update_impedance(&self, leg: &mut crate::model::Leg) {
        let force = if self.use_joint_effort {
            leg.joints()
                .iter()
                .map(|j| j.current_effort.max(0.0))
                .sum::<f64>()
        } else {
            leg.tip_force()
        };

        let m = self.virtual_mass;
        let k = leg.virtual_stiffness();
        let damping = 2.0 * self.virtual_damping_ratio * (m * k).sqrt();

        let [mut z, mut z_dot] = leg.impedance_state();

        // Semi-implicit Euler with bounded sub-steps
        let mut remaining = self.time_delta;
        while remaining > 1e-12 {
            let h = self.integrator_step_time.min(remaining);
            z_dot += h * (self.force_gain * force - damping * z_dot - k * z) / m;
            z += h * z_dot;
            remaining -= h;
        }

        z = clamp(z, -MAX_TIP_DEFLECTION, MAX_TIP_DEFLECTION);

        *leg.impedance_state_mut() = [z, z_dot];
        leg.set_delta_z(z);
    }

    /// Modulate per-leg stiffness by the walk phase: swinging legs soften,
    /// the legs either side of a swinging leg stiffen to carry its share of
    /// the load.
    pub fn update_stiffness(&self, model: &mut Model) {
        let leg_count = model.leg_count();

        let swinging: Vec<usize> = model
            .legs()
            .iter()
            .filter(|leg| leg.stepper.step_state == StepState::Swing)
            .map(|leg| leg.id_number())
            .collect();

        for leg in model.legs_mut() {
            leg.set_virtual_stiffness(self.virtual_stiffness);
        }

        for id in swinging {
            let leg = model.leg_by_id_mut(id).unwrap();
            leg.set_virtual_stiffness(leg.virtual_stiffness() * self.swing_stiffness_scaler);

            for adjacent in [(id + leg_count - 1) % leg_count, (id + 1) % leg_count] {
                let leg = model.leg_by_id_mut(adjacent).unwrap();
                leg.set_virtual_stiffness(
                    leg.virtual_stiffness() * self.load_stiffness_scaler,
                );
            }
        }
    }

    /// Scalar stiffness interpolation used while a leg transitions in or out
    /// of manual control: the transitioning leg softens towards the swing
    /// stiffness, its neighbours stiffen towards the load stiffness,
    /// proportionally to `ratio` in `[0, 1]`.
    pub fn update_stiffness_transition(&self, model: &mut Model, leg_id: usize, ratio: f64) {
        let leg_count = model.leg_count();
        let ratio = clamp(ratio, 0.0, 1.0);

        if let Some(leg) = model.leg_by_id_mut(leg_id) {
            let scale = 1.0 + (self.swing_stiffness_scaler - 1.0) * ratio;
            leg.set_virtual_stiffness(self.virtual_stiffness * scale);
        }

        for adjacent in [(leg_id + leg_count - 1) % leg_count, (leg_id + 1) % leg_count] {
            if let Some(leg) = model.leg_by_id_mut(adjacent) {
                let scale = 1.0 + (self.load_stiffness_scaler - 1.0) * ratio;
                leg.set_virtual_stiffness(self.virtual_stiffness * scale);
            }
        }
    }

    /// Run the impedance stage for every walking leg. Manual-associated legs
    /// keep `delta_z = 0`.
    pub fn update_all(&self, model: &mut Model) {
        for leg in model.legs_mut() {
            if leg.leg_state() == LegState::Walking {
                self.update_impedance(leg);
            } else {
                leg.set_delta_z(0.0);
                *leg.impedance_state_mut() = [0.0, 0.0];
            }
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

    fn setup() -> (ImpedanceController, Model) {
        let params = test_params();
        let mut model = Model::new(&params).unwrap();
        model.init_legs(true);
        let impedance = ImpedanceController::new(&params, &mut model);
        (impedance, model)
    }

    #[test]
    fn test_steady_state_deflection() {
        let (impedance, mut model) = setup();
        let params = test_params();

        let force = 100.0;
        model.leg_by_id_mut(0).unwrap().set_tip_force(force);

        // Several seconds of settling
        for _ in 0..1000 {
            impedance.update_impedance(model.leg_by_id_mut(0).unwrap());
        }

        let expected =
            params.impedance.force_gain.get() * force / params.impedance.virtual_stiffness.get();
        let leg = model.leg_by_id(0).unwrap();
        assert!(
            (leg.delta_z() - expected).abs() < 1e-3,
            "delta_z {} expected {}",
            leg.delta_z(),
            expected
        );
        assert!(leg.impedance_state()[1].abs() < 1e-3);
    }

    #[test]
    fn test_zero_force_decays_to_zero() {
        let (impedance, mut model) = setup();

        let leg = model.leg_by_id_mut(0).unwrap();
        leg.set_tip_force(100.0);
        for _ in 0..500 {
            impedance.update_impedance(leg);
        }
        assert!(leg.delta_z() > 0.0);

        leg.set_tip_force(0.0);
        for _ in 0..2000 {
            impedance.update_impedance(leg);
        }
        assert!(leg.delta_z().abs() < 1e-4);
    }

    #[test]
    fn test_deflection_is_bounded() {
        let (impedance, mut model) = setup();

        let leg = model.leg_by_id_mut(0).unwrap();
        leg.set_virtual_stiffness(1e-6);
        leg.set_tip_force(1000.0);
        for _ in 0..5000 {
            impedance.update_impedance(leg);
        }

        assert!(leg.delta_z() <= MAX_TIP_DEFLECTION + 1e-12);
    }

    #[test]
    fn test_dynamic_stiffness_by_phase() {
        let (impedance, mut model) = setup();
        let k = impedance.default_stiffness();

        model.leg_by_id_mut(2).unwrap().stepper.step_state = StepState::Swing;
        impedance.update_stiffness(&mut model);

        assert_eq!(
            model.leg_by_id(2).unwrap().virtual_stiffness(),
            k * impedance.swing_stiffness_scaler
        );
        assert_eq!(
            model.leg_by_id(1).unwrap().virtual_stiffness(),
            k * impedance.load_stiffness_scaler
        );
        assert_eq!(
            model.leg_by_id(3).unwrap().virtual_stiffness(),
            k * impedance.load_stiffness_scaler
        );
        assert_eq!(model.leg_by_id(0).unwrap().virtual_stiffness(), k);
        assert_eq!(model.leg_by_id(5).unwrap().virtual_stiffness(), k);
    }

    #[test]
    fn test_stiffness_transition_endpoints() {
        let (impedance, mut model) = setup();
        let k = impedance.default_stiffness();

        impedance.update_stiffness_transition(&mut model, 0, 0.0);
        assert_eq!(model.leg_by_id(0).unwrap().virtual_stiffness(), k);

        impedance.update_stiffness_transition(&mut model, 0, 1.0);
        assert_eq!(
            model.leg_by_id(0).unwrap().virtual_stiffness(),
            k * impedance.swing_stiffness_scaler
        );
        assert_eq!(
            model.leg_by_id(1).unwrap().virtual_stiffness(),
            k * impedance.load_stiffness_scaler
        );
        assert_eq!(
            model.leg_by_id(5).unwrap().virtual_stiffness(),
            k * impedance.load_stiffness_scaler
        );
    }

    #[test]
    fn test_manual_legs_get_zero_delta_z(){
        let (impedance, mut model) = setup();

        let leg = model.leg_by_id_mut(0).unwrap();
        leg.set_tip_force(100.0);
        leg.set_leg_state(LegState::Manual);

        for _ in 0..100 {
            impedance.update_all(&mut model);
        }

        assert_eq!(model.leg_by_id(0).unwrap().delta_z(), 0.0);
    }
}
