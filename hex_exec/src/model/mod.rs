//! Kinematic model of the hexapod
//!
//! The model owns the legs (each of which owns its joints, links, stepper
//! and poser) and the current body pose. Controllers borrow the model; no
//! back-references exist anywhere in the tree.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod joint;
mod leg;
mod pose;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use joint::*;
pub use leg::*;
pub use pose::*;

use crate::params::HexParams;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The kinematic model: one entry per leg, indexed by leg ID. The index
/// order is stable and meaningful (gait phase index).
pub struct Model {
    legs: Vec<Leg>,
    current_pose: Pose,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building the model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "Leg {0} has {1} degrees of freedom, but only 3-DOF legs \
         (yaw-pitch-pitch) are supported by the analytic IK")]
    UnsupportedDof(String, usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Model {
    /// Build the model from the parameter tree.
    pub fn new(params: &HexParams) -> Result<Self, ModelError> {
        let mut legs = Vec::with_capacity(params.model.legs.len());

        for (id, leg_params) in params.model.legs.iter().enumerate() {
            if leg_params.dof != 3 {
                return Err(ModelError::UnsupportedDof(
                    leg_params.id_name.clone(),
                    leg_params.dof,
                ));
            }
            legs.push(Leg::from_params(
                id,
                params.model.leg_stance_yaws[id],
                leg_params,
            ));
        }

        Ok(Self {
            legs,
            current_pose: Pose::identity(),
        })
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn legs_mut(&mut self) -> &mut [Leg] {
        &mut self.legs
    }

    pub fn leg_by_id(&self, id: usize) -> Option<&Leg> {
        self.legs.get(id)
    }

    pub fn leg_by_id_mut(&mut self, id: usize) -> Option<&mut Leg> {
        self.legs.get_mut(id)
    }

    pub fn current_pose(&self) -> Pose {
        self.current_pose
    }

    pub fn set_current_pose(&mut self, pose: Pose) {
        self.current_pose = pose;
    }

    /// Initialise the legs' joint and tip state.
    ///
    /// With `use_default_joint_positions` the joints are placed at their
    /// unpacked positions, marked initialised and the tip positions derived
    /// by FK; otherwise joint positions are left for the sensor surface to
    /// fill in.
    pub fn init_legs(&mut self, use_default_joint_positions: bool) {
        for leg in self.legs.iter_mut() {
            if use_default_joint_positions {
                for joint in leg.joints_mut() {
                    joint.current_position = joint.unpacked_position;
                    joint.position_initialised = true;
                }
            }
            leg.init_joint_demands();
            let tip = leg.current_tip_position_fk();
            leg.set_desired_tip_position(tip);
            leg.stepper.current_tip_position = tip;
            leg.poser.current_tip_position = tip;
        }
    }

    /// True once every joint of every leg has received a position
    /// measurement.
    pub fn joint_positions_initialised(&self) -> bool {
        self.legs
            .iter()
            .all(|leg| leg.joints().iter().all(|j| j.position_initialised))
    }

    /// Number of legs currently in a manual-associated state.
    pub fn manual_associated_leg_count(&self) -> usize {
        self.legs
            .iter()
            .filter(|leg| leg.leg_state() != LegState::Walking)
            .count()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test_params;

    #[test]
    fn test_model_builds_from_default_config() {
        let params = test_params();
        let model = Model::new(&params).unwrap();

        assert_eq!(model.leg_count(), 6);
        assert_eq!(model.leg_by_id(0).unwrap().id_name(), "AR");
        assert_eq!(model.leg_by_id(5).unwrap().id_name(), "AL");
    }

    #[test]
    fn test_init_legs_with_defaults() {
        let params = test_params();
        let mut model = Model::new(&params).unwrap();

        assert!(!model.joint_positions_initialised());
        model.init_legs(true);
        assert!(model.joint_positions_initialised());

        // Tips match FK of the unpacked joint positions
        for leg in model.legs() {
            let tip = leg.current_tip_position_fk();
            assert!((leg.desired_tip_position() - tip).norm() < 1e-12);
            assert!((leg.stepper.current_tip_position - tip).norm() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_unsupported_dof() {
        let mut params = test_params();
        params.model.legs[2].dof = 4;
        // Keep the parameter tree self-consistent for the extra joint
        let extra_joint = params.model.legs[2].joints[2].clone();
        let extra_link = params.model.legs[2].links[3].clone();
        params.model.legs[2].joints.push(extra_joint);
        params.model.legs[2].links.push(extra_link);

        assert!(Model::new(&params).is_err());
    }
}
