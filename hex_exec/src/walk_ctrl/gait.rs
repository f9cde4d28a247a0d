//! Gait definitions
//!
//! A gait is pure data: stance/swing phase lengths and a per-leg phase
//! offset table. No dispatch happens on the gait in the hot loop, the walk
//! controller just reads these numbers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::params::GaitParams;
use util::maths::rem_euclid;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A gait: a periodic phase assignment across legs.
#[derive(Debug, Clone)]
pub struct Gait {
    /// Name of the parameter table this gait was loaded from.
    pub name: String,

    /// Length of the stance portion of the cycle, in phase units.
    pub stance_phase: f64,

    /// Length of the swing portion of the cycle, in phase units.
    pub swing_phase: f64,

    /// Base phase offset, in phase units.
    pub phase_offset: f64,

    /// Per-leg multiplier applied to `phase_offset`.
    pub offset_multiplier: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gait {
    /// Build a gait from its parameter table.
    pub fn from_params(name: &str, params: &GaitParams) -> Self {
        Self {
            name: name.into(),
            stance_phase: params.stance_phase,
            swing_phase: params.swing_phase,
            phase_offset: params.phase_offset,
            offset_multiplier: params.offset_multiplier.clone(),
        }
    }

    /// Full cycle length in phase units.
    pub fn cycle_length(&self) -> f64 {
        self.stance_phase + self.swing_phase
    }

    /// Fraction of the cycle spent in stance.
    pub fn stance_ratio(&self) -> f64 {
        self.stance_phase / self.cycle_length()
    }

    /// Phase offset of the given leg, wrapped into the cycle.
    pub fn leg_offset(&self, leg_id: usize) -> f64 {
        rem_euclid(
            self.phase_offset * self.offset_multiplier[leg_id],
            self.cycle_length(),
        )
    }

    /// True if the given phase lies in the swing portion of the cycle.
    pub fn in_swing(&self, phase: f64) -> bool {
        phase >= self.stance_phase
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
    fn test_tripod_offsets() {
        let params = test_params();
        let gait = Gait::from_params("tripod_gait", &params.gaits.tripod_gait);

        assert_eq!(gait.cycle_length(), 4.0);
        assert_eq!(gait.stance_ratio(), 0.5);

        // Legs 0/2/4 and 1/3/5 form the two tripods, half a cycle apart
        for leg_id in [0, 2, 4] {
            assert_eq!(gait.leg_offset(leg_id), 0.0);
        }
        for leg_id in [1, 3, 5] {
            assert_eq!(gait.leg_offset(leg_id), 2.0);
        }
    }

    #[test]
    fn test_wave_offsets_wrap() {
        let params = test_params();
        let gait = Gait::from_params("wave_gait", &params.gaits.wave_gait);

        assert_eq!(gait.cycle_length(), 12.0);
        // Offsets are distinct for all six legs
        let offsets: Vec<f64> = (0..6).map(|i| gait.leg_offset(i)).collect();
        for i in 0..6 {
            for j in 0..i {
                assert_ne!(offsets[i], offsets[j]);
            }
        }
    }
}
