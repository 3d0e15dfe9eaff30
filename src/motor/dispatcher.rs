//! # Command Dispatcher Module
//!
//! Pushes target velocities and acceleration settings to the two motor channels.
//!
//! ## Behavior
//!
//! - A velocity equal to the last acknowledged value for that side is not sent.
//! - [`CommandDispatcher::converge`] retries unacknowledged sides until both
//!   acknowledge, the terminate flag is set, or the optional retry bound is hit.
//!   A stuck actuator blocks the caller until one of those happens.
//! - Acceleration changes go to both sides together, succeed only if both
//!   acknowledge, and are not retried.
//! - [`CommandDispatcher::teardown`] always commands zero to both sides and
//!   closes them; any failure is reported as [`WoabotError::Teardown`].

use std::time::Duration;
use tracing::{debug, error, info};

use super::{attach_with_retry, MotorChannel, Side};
use crate::config::MotorConfig;
use crate::drive::mixer::Targets;
use crate::drive::state::AccelerationMode;
use crate::error::{Result, WoabotError};
use crate::shutdown::Shutdown;

/// Failed convergence rounds between repeated error log lines.
const LOG_EVERY_ATTEMPTS: u32 = 100;

/// Outcome of a single velocity command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Already at the requested value; no call was made.
    Unchanged,
    /// The actuator acknowledged the new value.
    Acknowledged,
}

/// Command bookkeeping for one side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorTarget {
    pub side: Side,
    pub requested: f64,
    /// Last velocity the actuator acknowledged.
    pub confirmed: Option<f64>,
    /// Last acceleration the actuator acknowledged.
    pub acceleration: Option<f64>,
    pub max_acceleration: Option<f64>,
}

impl MotorTarget {
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            side,
            requested: 0.0,
            confirmed: None,
            acceleration: None,
            max_acceleration: None,
        }
    }

    /// True once the actuator has acknowledged the requested velocity.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.confirmed == Some(self.requested)
    }
}

/// Retry and acceleration settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    pub retry_interval: Duration,
    /// `None` retries until terminate.
    pub max_retries: Option<u32>,
    /// Fraction of the device maximum used in normal mode.
    pub normal_acceleration: f64,
    /// Fraction of the device maximum used while boosted.
    pub boost_acceleration: f64,
}

impl From<&MotorConfig> for DispatchSettings {
    fn from(config: &MotorConfig) -> Self {
        Self {
            retry_interval: config.retry_interval(),
            max_retries: config.max_retries,
            normal_acceleration: config.normal_acceleration,
            boost_acceleration: config.boost_acceleration,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&MotorConfig::default())
    }
}

/// Owns both motor channels and their command state.
#[derive(Debug)]
pub struct CommandDispatcher<M: MotorChannel> {
    left: M,
    right: M,
    targets: [MotorTarget; 2],
    settings: DispatchSettings,
    /// Last acceleration mode sent, successful or not.
    mode: Option<AccelerationMode>,
}

impl<M: MotorChannel> CommandDispatcher<M> {
    /// Wraps two channels without touching the hardware.
    #[must_use]
    pub fn new(left: M, right: M, settings: DispatchSettings) -> Self {
        Self {
            left,
            right,
            targets: [MotorTarget::new(Side::Left), MotorTarget::new(Side::Right)],
            settings,
            mode: None,
        }
    }

    /// Attaches both motors, stops them and selects normal acceleration.
    ///
    /// Attaching waits until each motor comes online. A failed acceleration
    /// setting is logged and does not abort startup. If startup fails after a
    /// motor attached, that motor is commanded to zero and closed before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if terminate is requested during startup, or the
    /// error that prevented reading the motors' acceleration limits.
    pub fn connect(left: M, right: M, config: &MotorConfig, shutdown: &Shutdown) -> Result<Self> {
        let mut dispatcher = Self::new(left, right, DispatchSettings::from(config));
        let mut attached = Vec::with_capacity(2);

        match dispatcher.start(config, shutdown, &mut attached) {
            Ok(()) => Ok(dispatcher),
            Err(e) => {
                dispatcher.release(&attached);
                Err(e)
            }
        }
    }

    fn start(&mut self, config: &MotorConfig, shutdown: &Shutdown, attached: &mut Vec<Side>) -> Result<()> {
        for side in Side::BOTH {
            let motor = self.motor_mut(side);
            attach_with_retry(
                side,
                &mut *motor,
                config.attach_timeout(),
                config.attach_retry_interval(),
                shutdown,
            )?;
            info!("{} motor attached on channel {}", side, motor.channel());
            attached.push(side);
        }

        self.read_max_acceleration()?;
        self.converge(Targets::STOP, shutdown)?;

        if let Err(e) = self.apply_acceleration(AccelerationMode::Normal) {
            error!("Failed to set initial acceleration: {}", e);
        }

        Ok(())
    }

    /// Stops and closes `sides` after an aborted startup.
    fn release(&mut self, sides: &[Side]) {
        for &side in sides {
            let motor = self.motor_mut(side);
            if let Err(e) = motor.set_target_velocity(0.0) {
                error!("Failed to stop {} motor after aborted startup: {}", side, e);
            }
            if let Err(e) = motor.close() {
                error!("Failed to close {} motor after aborted startup: {}", side, e);
            }
        }
        if !sides.is_empty() {
            info!("Released {} motor(s) after aborted startup", sides.len());
        }
    }

    /// Reads and caches each motor's maximum acceleration.
    ///
    /// # Errors
    ///
    /// Returns the first channel error.
    pub fn read_max_acceleration(&mut self) -> Result<()> {
        for side in Side::BOTH {
            let max = self.motor(side).max_acceleration()?;
            debug!("{} motor max acceleration: {}", side, max);
            self.target_mut(side).max_acceleration = Some(max);
        }
        Ok(())
    }

    #[must_use]
    pub fn target(&self, side: Side) -> &MotorTarget {
        &self.targets[index(side)]
    }

    #[must_use]
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// True once both sides have acknowledged their requested velocity.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.targets.iter().all(MotorTarget::is_converged)
    }

    /// Sends `velocity` to one side unless it is already confirmed there.
    ///
    /// # Errors
    ///
    /// Returns the channel error; the confirmed value is left unchanged.
    pub fn apply(&mut self, side: Side, velocity: f64) -> Result<Dispatch> {
        self.target_mut(side).requested = velocity;
        if self.target(side).confirmed == Some(velocity) {
            return Ok(Dispatch::Unchanged);
        }

        self.motor_mut(side).set_target_velocity(velocity)?;
        self.target_mut(side).confirmed = Some(velocity);
        Ok(Dispatch::Acknowledged)
    }

    /// Drives both sides to `targets`, retrying failed sides.
    ///
    /// Terminate is checked before every retry. With no retry bound configured,
    /// a failing actuator is retried until terminate is requested.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if terminate is observed first, or `RetriesExhausted`
    /// once the configured bound of failed rounds is reached.
    pub fn converge(&mut self, targets: Targets, shutdown: &Shutdown) -> Result<()> {
        let mut failed_rounds: u32 = 0;

        loop {
            let mut pending = false;
            for side in Side::BOTH {
                let velocity = targets.side(side);
                if let Err(e) = self.apply(side, velocity) {
                    pending = true;
                    if failed_rounds % LOG_EVERY_ATTEMPTS == 0 {
                        error!(
                            "Failed to set {} velocity to {}: {} (attempt {})",
                            side,
                            velocity,
                            e,
                            failed_rounds + 1
                        );
                    }
                }
            }

            if !pending {
                if failed_rounds > 0 {
                    info!("Motors acknowledged after {} retries", failed_rounds);
                }
                return Ok(());
            }

            failed_rounds = failed_rounds.saturating_add(1);
            if let Some(max) = self.settings.max_retries {
                if failed_rounds >= max {
                    return Err(WoabotError::RetriesExhausted {
                        attempts: failed_rounds,
                    });
                }
            }

            if shutdown.is_triggered() {
                return Err(WoabotError::Cancelled);
            }

            std::thread::sleep(self.settings.retry_interval);
        }
    }

    /// Switches both sides to the acceleration for `mode`.
    ///
    /// Does nothing if `mode` was the last mode requested. A side already at the
    /// target value is not re-sent.
    ///
    /// # Errors
    ///
    /// Returns the first channel error after attempting both sides.
    pub fn apply_acceleration(&mut self, mode: AccelerationMode) -> Result<Dispatch> {
        if self.mode == Some(mode) {
            return Ok(Dispatch::Unchanged);
        }
        self.mode = Some(mode);

        let ratio = match mode {
            AccelerationMode::Normal => self.settings.normal_acceleration,
            AccelerationMode::Boosted => self.settings.boost_acceleration,
        };

        let mut first_error = None;
        let mut sent = false;
        for side in Side::BOTH {
            let target = *self.target(side);
            let Some(max) = target.max_acceleration else {
                let channel = self.motor(side).channel();
                error!(
                    "Cannot set {} acceleration: limits unknown on channel {}",
                    side, channel
                );
                first_error.get_or_insert(WoabotError::NotAttached { channel });
                continue;
            };

            let acceleration = max * ratio;
            if target.acceleration == Some(acceleration) {
                continue;
            }

            match self.motor_mut(side).set_acceleration(acceleration) {
                Ok(()) => {
                    self.target_mut(side).acceleration = Some(acceleration);
                    sent = true;
                }
                Err(e) => {
                    error!("Failed to set {} acceleration to {}: {}", side, acceleration, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if sent => {
                debug!("Acceleration mode {:?}", mode);
                Ok(Dispatch::Acknowledged)
            }
            None => Ok(Dispatch::Unchanged),
        }
    }

    /// Commands zero velocity to both sides and closes them.
    ///
    /// Zero is sent regardless of the confirmed state and both sides are always
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns `Teardown` listing every step that failed.
    pub fn teardown(mut self) -> Result<()> {
        let mut failures = Vec::new();

        for side in Side::BOTH {
            match self.motor_mut(side).set_target_velocity(0.0) {
                Ok(()) => self.target_mut(side).confirmed = Some(0.0),
                Err(e) => failures.push(format!("{} stop: {}", side, e)),
            }
        }

        for side in Side::BOTH {
            if let Err(e) = self.motor_mut(side).close() {
                failures.push(format!("{} close: {}", side, e));
            }
        }

        if failures.is_empty() {
            info!("Motors stopped and released");
            Ok(())
        } else {
            Err(WoabotError::Teardown(failures.join("; ")))
        }
    }

    fn motor(&self, side: Side) -> &M {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn motor_mut(&mut self, side: Side) -> &mut M {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn target_mut(&mut self, side: Side) -> &mut MotorTarget {
        &mut self.targets[index(side)]
    }
}

fn index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}
