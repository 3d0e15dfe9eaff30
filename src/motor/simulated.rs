//! # Simulated Motor
//!
//! In-memory [`MotorChannel`] that accepts commands the way a velocity motor
//! controller would, so the whole drive pipeline runs without hardware.

use std::time::Duration;
use tracing::debug;

use super::MotorChannel;
use crate::error::{Result, WoabotError};

/// Simulated velocity motor channel.
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    channel: u32,
    attached: bool,
    velocity: f64,
    acceleration: f64,
    max_acceleration: f64,
}

impl SimulatedMotor {
    /// Creates a detached motor on `channel`.
    #[must_use]
    pub fn new(channel: u32, max_acceleration: f64) -> Self {
        Self {
            channel,
            attached: false,
            velocity: 0.0,
            acceleration: 0.0,
            max_acceleration,
        }
    }

    /// Last acknowledged velocity.
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Last acknowledged acceleration.
    #[must_use]
    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.attached {
            Ok(())
        } else {
            Err(WoabotError::NotAttached {
                channel: self.channel,
            })
        }
    }

    fn reject(&self, reason: String) -> WoabotError {
        WoabotError::Actuator {
            channel: self.channel,
            reason,
        }
    }
}

impl MotorChannel for SimulatedMotor {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn attach(&mut self, _timeout: Duration) -> Result<()> {
        self.attached = true;
        debug!("Simulated motor {} attached", self.channel);
        Ok(())
    }

    fn set_target_velocity(&mut self, velocity: f64) -> Result<()> {
        self.ensure_attached()?;
        if !(-1.0..=1.0).contains(&velocity) {
            return Err(self.reject(format!("velocity {} outside [-1, 1]", velocity)));
        }
        self.velocity = velocity;
        Ok(())
    }

    fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        self.ensure_attached()?;
        if !(acceleration > 0.0 && acceleration <= self.max_acceleration) {
            return Err(self.reject(format!(
                "acceleration {} outside (0, {}]",
                acceleration, self.max_acceleration
            )));
        }
        self.acceleration = acceleration;
        Ok(())
    }

    fn max_acceleration(&self) -> Result<f64> {
        self.ensure_attached()?;
        Ok(self.max_acceleration)
    }

    fn close(&mut self) -> Result<()> {
        self.attached = false;
        debug!("Simulated motor {} closed", self.channel);
        Ok(())
    }
}
