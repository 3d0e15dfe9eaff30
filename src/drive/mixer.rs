//! # Velocity Mixer Module
//!
//! Combines [`DriveState`] into one target velocity per motor side.
//!
//! ## Pipeline (per side)
//!
//! 1. `raw = (net_throttle / 100) * (side_power / 100)`
//! 2. Clamp to [-1, 1]. Clamping means upstream arithmetic is wrong and is
//!    logged as an error.
//! 3. Optionally quantize to 0.1 steps (half away from zero) to cut command
//!    chatter; `-0.0` becomes `0.0`.
//! 4. Steering trim: moving forward subtracts `reduction / 100`, moving backward
//!    adds it, standing still is untouched.
//! 5. Boost floor: while boosted any nonzero velocity below full power snaps to
//!    ±1 with its sign preserved.
//!
//! The mixer always emits targets, even when nothing changed. Skipping redundant
//! hardware calls is the dispatcher's job.
//!
//! ## Usage
//!
//! ```
//! use woabot::drive::mixer::VelocityMixer;
//! use woabot::drive::state::DriveState;
//!
//! let mut state = DriveState::new();
//! state.throttle_forward = 100;
//!
//! let targets = VelocityMixer::new(true).compute_targets(&state);
//! assert_eq!(targets.left, 1.0);
//! assert_eq!(targets.right, 1.0);
//! ```

use tracing::error;

use super::state::{AccelerationMode, DriveState};
use crate::motor::Side;

/// Full-power target velocity.
pub const FULL_VELOCITY: f64 = 1.0;

/// Percent-to-fraction divisor.
const PERCENT: f64 = 100.0;

/// Target velocities for both sides, each in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Targets {
    pub left: f64,
    pub right: f64,
}

impl Targets {
    /// Both sides stopped.
    pub const STOP: Targets = Targets {
        left: 0.0,
        right: 0.0,
    };

    /// Returns the target for one side.
    #[must_use]
    pub fn side(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Stateless mixer; `stepped` selects 0.1 quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityMixer {
    stepped: bool,
}

impl Default for VelocityMixer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VelocityMixer {
    #[must_use]
    pub fn new(stepped: bool) -> Self {
        Self { stepped }
    }

    /// Computes both side targets from the current drive state.
    #[must_use]
    pub fn compute_targets(&self, state: &DriveState) -> Targets {
        let net = state.net_throttle();
        let (left_reduction, right_reduction) = state.trim_reduction();
        let boosted = state.acceleration_mode == AccelerationMode::Boosted;

        Targets {
            left: self.side_velocity(Side::Left, net, state.left_power, left_reduction, boosted),
            right: self.side_velocity(Side::Right, net, state.right_power, right_reduction, boosted),
        }
    }

    fn side_velocity(&self, side: Side, net: i32, power: i32, reduction: i32, boosted: bool) -> f64 {
        let raw = (f64::from(net) / PERCENT) * (f64::from(power) / PERCENT);
        let mut velocity = clamp_velocity(side, raw);

        if self.stepped {
            velocity = step_velocity(velocity);
        }

        velocity = apply_trim(velocity, reduction);

        if boosted {
            velocity = boost_floor(velocity);
        }

        velocity
    }
}

/// Clamps to [-1, 1], logging an error when clamping was needed.
#[must_use]
pub fn clamp_velocity(side: Side, raw: f64) -> f64 {
    if (-FULL_VELOCITY..=FULL_VELOCITY).contains(&raw) {
        raw
    } else {
        error!("{} velocity {} out of range, clamping", side, raw);
        raw.clamp(-FULL_VELOCITY, FULL_VELOCITY)
    }
}

/// Quantizes to the nearest 0.1, half away from zero; never returns `-0.0`.
#[must_use]
pub fn step_velocity(velocity: f64) -> f64 {
    let stepped = (velocity * 10.0).round() / 10.0;
    if stepped == 0.0 {
        0.0
    } else {
        stepped
    }
}

/// Applies the trim reduction against the current direction of motion.
#[must_use]
pub fn apply_trim(velocity: f64, reduction: i32) -> f64 {
    let reduction = f64::from(reduction) / PERCENT;
    if velocity > 0.0 {
        velocity - reduction
    } else if velocity < 0.0 {
        velocity + reduction
    } else {
        velocity
    }
}

/// Snaps any nonzero partial velocity to full power, keeping its sign.
#[must_use]
pub fn boost_floor(velocity: f64) -> f64 {
    if velocity != 0.0 && velocity.abs() < FULL_VELOCITY {
        FULL_VELOCITY.copysign(velocity)
    } else {
        velocity
    }
}
