//! Leg state, forward and inverse kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation3, Vector3};

// Internal
use super::joint::{Joint, Link};
use crate::params::LegParams;
use crate::pose_ctrl::LegPoser;
use crate::walk_ctrl::LegStepper;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Manual-takeover state of a leg.
///
/// Transitions only ever move through the adjacent pairs
/// `Walking <-> WalkingToManual <-> Manual` and
/// `Manual <-> ManualToWalking <-> Walking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegState {
    Walking,
    Manual,
    WalkingToManual,
    ManualToWalking,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single leg of the hexapod.
pub struct Leg {
    id_number: usize,
    id_name: String,

    /// Position of the coxa yaw axis in the body frame.
    root_position: Vector3<f64>,

    /// Mounting yaw of the leg in the body frame.
    stance_yaw: f64,

    joints: Vec<Joint>,
    links: Vec<Link>,

    /// Walk sub-state, driven by the walk controller.
    pub stepper: LegStepper,

    /// Pose sub-state, driven by the pose controller.
    pub poser: LegPoser,

    leg_state: LegState,

    /// Tip position achieved by the last IK solve, in the body frame.
    local_tip_position: Vector3<f64>,

    /// Tip position handed to IK.
    desired_tip_position: Vector3<f64>,

    /// Vertical impedance offset.
    delta_z: f64,

    /// Clamped scalar tip force from the sensor surface.
    tip_force: f64,

    /// Current per-leg virtual stiffness.
    virtual_stiffness: f64,

    /// Impedance integrator state: virtual mass position and velocity.
    impedance_state: [f64; 2],

    /// True if the last IK solve had to clamp a joint to its limits.
    last_ik_clamped: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Leg {
    /// Build a leg from its parameter block.
    pub fn from_params(id_number: usize, stance_yaw: f64, params: &LegParams) -> Self {
        let joints = params
            .joints
            .iter()
            .map(|j| Joint::from_params(&params.id_name, j))
            .collect();
        let links = params.links.iter().map(Link::from_params).collect();

        Self {
            id_number,
            id_name: params.id_name.clone(),
            root_position: Vector3::from_column_slice(&params.root_position),
            stance_yaw,
            joints,
            links,
            stepper: LegStepper::default(),
            poser: LegPoser::default(),
            leg_state: LegState::Walking,
            local_tip_position: Vector3::zeros(),
            desired_tip_position: Vector3::zeros(),
            delta_z: 0.0,
            tip_force: 0.0,
            virtual_stiffness: 0.0,
            impedance_state: [0.0; 2],
            last_ik_clamped: false,
        }
    }

    // ---- ACCESSORS ----

    pub fn id_number(&self) -> usize {
        self.id_number
    }

    pub fn id_name(&self) -> &str {
        &self.id_name
    }

    pub fn root_position(&self) -> Vector3<f64> {
        self.root_position
    }

    pub fn stance_yaw(&self) -> f64 {
        self.stance_yaw
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joints_mut(&mut self) -> &mut [Joint] {
        &mut self.joints
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn leg_state(&self) -> LegState {
        self.leg_state
    }

    pub fn set_leg_state(&mut self, state: LegState) {
        self.leg_state = state;
    }

    pub fn local_tip_position(&self) -> Vector3<f64> {
        self.local_tip_position
    }

    pub fn desired_tip_position(&self) -> Vector3<f64> {
        self.desired_tip_position
    }

    pub fn set_desired_tip_position(&mut self, position: Vector3<f64>) {
        self.desired_tip_position = position;
    }

    pub fn delta_z(&self) -> f64 {
        self.delta_z
    }

    pub fn set_delta_z(&mut self, delta_z: f64) {
        self.delta_z = delta_z;
    }

    pub fn tip_force(&self) -> f64 {
        self.tip_force
    }

    pub fn set_tip_force(&mut self, force: f64) {
        self.tip_force = force;
    }

    pub fn virtual_stiffness(&self) -> f64 {
        self.virtual_stiffness
    }

    pub fn set_virtual_stiffness(&mut self, stiffness: f64) {
        self.virtual_stiffness = stiffness;
    }

    pub fn impedance_state(&self) -> [f64; 2] {
        self.impedance_state
    }

    pub fn impedance_state_mut(&mut self) -> &mut [f64; 2] {
        &mut self.impedance_state
    }

    pub fn last_ik_clamped(&self) -> bool {
        self.last_ik_clamped
    }

    /// Length of the coxa link (yaw axis to femur pivot).
    pub fn coxa_length(&self) -> f64 {
        self.links[1].length
    }

    pub fn femur_length(&self) -> f64 {
        self.links[2].length
    }

    pub fn tibia_length(&self) -> f64 {
        self.links[3].length
    }

    /// Maximum vertical extent of the leg below the femur pivot.
    pub fn max_leg_height(&self) -> f64 {
        self.femur_length() + self.tibia_length()
    }

    // ---- KINEMATICS ----

    /// Forward kinematics: body-frame tip position for the given joint
    /// angles `[coxa, femur, tibia]`.
    pub fn forward_kinematics(&self, positions: &[f64; 3]) -> Vector3<f64> {
        let (theta_c, theta_f, theta_t) = (positions[0], positions[1], positions[2]);
        let (c, f, t) = (self.coxa_length(), self.femur_length(), self.tibia_length());

        let planar = c + f * theta_f.cos() + t * (theta_f + theta_t).cos();
        let leg_frame = Vector3::new(
            planar * theta_c.cos(),
            planar * theta_c.sin(),
            f * theta_f.sin() + t * (theta_f + theta_t).sin(),
        );

        self.root_position + Rotation3::from_euler_angles(0.0, 0.0, self.stance_yaw) * leg_frame
    }

    /// Body-frame tip position at the measured joint positions.
    pub fn current_tip_position_fk(&self) -> Vector3<f64> {
        self.forward_kinematics(&[
            self.joints[0].current_position,
            self.joints[1].current_position,
            self.joints[2].current_position,
        ])
    }

    /// Solve inverse kinematics for `desired_tip_position` and write the
    /// joint position demands.
    ///
    /// The target is first clamped into the leg's reachable annulus. When
    /// `constrain` is set each joint demand is additionally clamped to its
    /// limits and the achieved tip position is recomputed by forward
    /// kinematics. Returns the achieved tip position (body frame).
    pub fn apply_ik(&mut self, constrain: bool) -> Vector3<f64> {
        let (c, f, t) = (self.coxa_length(), self.femur_length(), self.tibia_length());

        // Target in the leg frame
        let p = Rotation3::from_euler_angles(0.0, 0.0, -self.stance_yaw)
            * (self.desired_tip_position - self.root_position);

        let theta_c = p.y.atan2(p.x);

        // Sagittal plane coordinates relative to the femur pivot
        let mut r = (p.x * p.x + p.y * p.y).sqrt() - c;
        let mut z = p.z;

        // Clamp the reach into the annulus the two-link chain can span
        let reach = (r * r + z * z).sqrt();
        let min_reach = (f - t).abs() + 1e-6;
        let max_reach = f + t - 1e-6;
        if reach > 1e-9 {
            let clamped_reach = clamp(reach, min_reach, max_reach);
            if (clamped_reach - reach).abs() > 0.0 {
                r *= clamped_reach / reach;
                z *= clamped_reach / reach;
            }
        } else {
            r = min_reach;
            z = 0.0;
        }

        // Law of cosines for the knee, knee bending below the femur
        let d = clamp((r * r + z * z - f * f - t * t) / (2.0 * f * t), -1.0, 1.0);
        let theta_t = -d.acos();
        let theta_f = z.atan2(r) - (t * theta_t.sin()).atan2(f + t * theta_t.cos());

        let mut demands = [theta_c, theta_f, theta_t];

        self.last_ik_clamped = false;
        if constrain {
            for (i, joint) in self.joints.iter().enumerate() {
                let constrained = clamp(demands[i], joint.min_position, joint.max_position);
                if (constrained - demands[i]).abs() > 1e-12 {
                    self.last_ik_clamped = true;
                }
                demands[i] = constrained;
            }
        }

        for (i, joint) in self.joints.iter_mut().enumerate() {
            joint.desired_position = demands[i];
        }

        self.local_tip_position = self.forward_kinematics(&demands);
        self.local_tip_position
    }

    /// Initialise joint demand state so the first tick produces zero
    /// velocity demands.
    pub fn init_joint_demands(&mut self) {
        for joint in self.joints.iter_mut() {
            joint.desired_position = joint.current_position;
            joint.prev_desired_position = joint.current_position;
            joint.desired_velocity = 0.0;
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

    fn test_leg() -> Leg {
        let params = test_params();
        Leg::from_params(0, params.model.leg_stance_yaws[0], &params.model.legs[0])
    }

    #[test]
    fn test_fk_ik_round_trip() {
        let mut leg = test_leg();

        let tip = leg.forward_kinematics(&[0.2, 0.1, -1.2]);
        leg.set_desired_tip_position(tip);
        let achieved = leg.apply_ik(true);

        assert!(
            (achieved - tip).norm() < 1e-9,
            "achieved {:?} target {:?}",
            achieved,
            tip
        );
        assert!(!leg.last_ik_clamped());
    }

    #[test]
    fn test_ik_clamps_unreachable_target() {
        let mut leg = test_leg();

        // A target far below the reach of the leg
        let target = leg.root_position() + Vector3::new(0.1, 0.0, -10.0);
        leg.set_desired_tip_position(target);
        let achieved = leg.apply_ik(true);

        // Achieved tip is within the reach annulus
        let reach = (achieved - leg.root_position()).norm();
        assert!(reach <= leg.coxa_length() + leg.max_leg_height() + 1e-6);

        // Joint limits hold
        for joint in leg.joints() {
            assert!(joint.desired_position >= joint.min_position);
            assert!(joint.desired_position <= joint.max_position);
        }
    }

    #[test]
    fn test_ik_respects_joint_limits() {
        let mut leg = test_leg();

        // A target far to the side, beyond the coxa yaw limit
        let yaw = leg.stance_yaw();
        let sideways = Rotation3::from_euler_angles(0.0, 0.0, yaw + 1.5)
            * Vector3::new(0.2, 0.0, -0.1);
        leg.set_desired_tip_position(leg.root_position() + sideways);
        leg.apply_ik(true);

        assert!(leg.last_ik_clamped());
        let coxa = &leg.joints()[0];
        assert!(coxa.desired_position <= coxa.max_position);
        assert!(coxa.desired_position >= coxa.min_position);
    }
}
