//! # Motor Module
//!
//! Actuator abstraction for the two drive sides.
//!
//! This module handles:
//! - The [`MotorChannel`] trait every actuator backend implements
//! - Attaching both sides with retry until they come online
//! - Deduplicated, acknowledged command dispatch ([`dispatcher`])
//! - The motor-sync thread and its shared command slot ([`sync`])
//! - The Phidget22 DC motor backend (`phidget`, behind the `phidget` feature)
//! - A simulated backend for running without hardware ([`simulated`])

pub mod dispatcher;
#[cfg(feature = "phidget")]
pub mod phidget;
pub mod simulated;
pub mod sync;

use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::shutdown::{retry_until_ready, Shutdown};

/// One side of the differential drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, left first.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// A single velocity-controlled motor channel.
///
/// Every command returns `Ok` only once the device has acknowledged it.
#[cfg_attr(test, mockall::automock)]
pub trait MotorChannel: Send {
    /// Channel number on the controller board.
    fn channel(&self) -> u32;

    /// Opens the channel and waits up to `timeout` for it to come online.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is not ready within `timeout`.
    fn attach(&mut self, timeout: Duration) -> Result<()>;

    /// Commands a target velocity in [-1, 1].
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects or does not acknowledge the command.
    fn set_target_velocity(&mut self, velocity: f64) -> Result<()>;

    /// Sets the acceleration ramp in device units.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the value.
    fn set_acceleration(&mut self, acceleration: f64) -> Result<()>;

    /// Reads the device's maximum acceleration.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is not attached.
    fn max_acceleration(&self) -> Result<f64>;

    /// Releases the channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the device could not be closed cleanly.
    fn close(&mut self) -> Result<()>;
}

impl<M: MotorChannel + ?Sized> MotorChannel for Box<M> {
    fn channel(&self) -> u32 {
        (**self).channel()
    }

    fn attach(&mut self, timeout: Duration) -> Result<()> {
        (**self).attach(timeout)
    }

    fn set_target_velocity(&mut self, velocity: f64) -> Result<()> {
        (**self).set_target_velocity(velocity)
    }

    fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        (**self).set_acceleration(acceleration)
    }

    fn max_acceleration(&self) -> Result<f64> {
        (**self).max_acceleration()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Attaches a motor, retrying every `interval` until it succeeds or shutdown is
/// requested.
///
/// # Errors
///
/// Returns `Cancelled` if termination is requested before the motor attaches.
pub fn attach_with_retry<M: MotorChannel + ?Sized>(
    side: Side,
    motor: &mut M,
    timeout: Duration,
    interval: Duration,
    shutdown: &Shutdown,
) -> Result<()> {
    retry_until_ready(&format!("{} motor", side), interval, shutdown, || {
        motor.attach(timeout)
    })
}
