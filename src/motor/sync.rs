//! # Motor Sync Module
//!
//! Lock-free hand-off of the latest targets from the controller thread to the
//! motor-sync thread.
//!
//! The controller thread only ever replaces the whole command and the sync
//! thread only ever reads the latest one. Intermediate values may be skipped;
//! only the most recent target matters.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::dispatcher::CommandDispatcher;
use super::MotorChannel;
use crate::drive::mixer::Targets;
use crate::drive::state::AccelerationMode;
use crate::error::{Result, WoabotError};
use crate::shutdown::Shutdown;

const MODE_NORMAL: u8 = 0;
const MODE_BOOSTED: u8 = 1;

/// Latest requested targets and acceleration mode, shared between threads.
#[derive(Debug)]
pub struct SharedCommand {
    left: AtomicU64,
    right: AtomicU64,
    mode: AtomicU8,
}

impl Default for SharedCommand {
    fn default() -> Self {
        Self {
            left: AtomicU64::new(0.0_f64.to_bits()),
            right: AtomicU64::new(0.0_f64.to_bits()),
            mode: AtomicU8::new(MODE_NORMAL),
        }
    }
}

impl SharedCommand {
    /// Creates a slot holding "stopped, normal acceleration".
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the current command.
    pub fn publish(&self, targets: Targets, mode: AccelerationMode) {
        self.left.store(targets.left.to_bits(), Ordering::Release);
        self.right.store(targets.right.to_bits(), Ordering::Release);
        let mode = match mode {
            AccelerationMode::Normal => MODE_NORMAL,
            AccelerationMode::Boosted => MODE_BOOSTED,
        };
        self.mode.store(mode, Ordering::Release);
    }

    /// Reads the latest command.
    #[must_use]
    pub fn snapshot(&self) -> (Targets, AccelerationMode) {
        let targets = Targets {
            left: f64::from_bits(self.left.load(Ordering::Acquire)),
            right: f64::from_bits(self.right.load(Ordering::Acquire)),
        };
        let mode = if self.mode.load(Ordering::Acquire) == MODE_BOOSTED {
            AccelerationMode::Boosted
        } else {
            AccelerationMode::Normal
        };
        (targets, mode)
    }
}

/// Polls `command` every `interval` and drives the motors to it until shutdown,
/// then tears the motors down.
///
/// A bounded retry failure is logged and retried on the next poll. Terminate
/// interrupts any pending retry.
///
/// # Errors
///
/// Returns `Teardown` if the motors could not be stopped and released.
pub fn run<M: MotorChannel>(
    mut dispatcher: CommandDispatcher<M>,
    command: &SharedCommand,
    interval: Duration,
    shutdown: &Shutdown,
) -> Result<()> {
    info!("Motor sync started ({}ms interval)", interval.as_millis());

    while !shutdown.is_triggered() {
        let (targets, mode) = command.snapshot();

        match dispatcher.converge(targets, shutdown) {
            Ok(()) => {}
            Err(WoabotError::Cancelled) => break,
            Err(e) => warn!("Motor sync: {}", e),
        }

        // Failures are logged by the dispatcher and not retried
        if let Err(e) = dispatcher.apply_acceleration(mode) {
            debug!("Motor sync: acceleration left unchanged: {}", e);
        }

        std::thread::sleep(interval);
    }

    info!("Motor sync stopping");
    dispatcher.teardown().map_err(|e| {
        error!("{}", e);
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::dispatcher::DispatchSettings;
    use crate::motor::simulated::SimulatedMotor;
    use crate::motor::MockMotorChannel;
    use std::thread;

    #[test]
    fn test_shared_command_defaults_to_stop() {
        let command = SharedCommand::new();
        assert_eq!(command.snapshot(), (Targets::STOP, AccelerationMode::Normal));
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let command = SharedCommand::new();
        let targets = Targets { left: -0.3, right: 0.9 };
        command.publish(targets, AccelerationMode::Boosted);
        assert_eq!(command.snapshot(), (targets, AccelerationMode::Boosted));

        command.publish(Targets::STOP, AccelerationMode::Normal);
        assert_eq!(command.snapshot(), (Targets::STOP, AccelerationMode::Normal));
    }

    #[test]
    fn test_publish_across_threads() {
        let command = SharedCommand::new();
        let writer = Arc::clone(&command);
        thread::spawn(move || {
            writer.publish(Targets { left: 0.5, right: 0.5 }, AccelerationMode::Normal);
        })
        .join()
        .unwrap();
        assert_eq!(command.snapshot().0, Targets { left: 0.5, right: 0.5 });
    }

    #[test]
    fn test_run_converges_and_tears_down() {
        let config = crate::config::MotorConfig::default();
        let shutdown = Shutdown::new();
        let dispatcher = CommandDispatcher::connect(
            SimulatedMotor::new(0, 100.0),
            SimulatedMotor::new(1, 100.0),
            &config,
            &shutdown,
        )
        .unwrap();

        let command = SharedCommand::new();
        command.publish(Targets { left: 0.6, right: 0.4 }, AccelerationMode::Boosted);

        let stopper = shutdown.clone();
        let handle = {
            let command = Arc::clone(&command);
            let shutdown = shutdown.clone();
            thread::spawn(move || run(dispatcher, &command, Duration::from_millis(1), &shutdown))
        };

        thread::sleep(Duration::from_millis(20));
        stopper.trigger();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_run_reports_teardown_failure() {
        let mut left = MockMotorChannel::new();
        left.expect_set_target_velocity().returning(|_| {
            Err(WoabotError::Actuator {
                channel: 0,
                reason: "stalled".to_string(),
            })
        });
        left.expect_close().returning(|| Ok(()));
        let mut right = MockMotorChannel::new();
        right.expect_set_target_velocity().returning(|_| Ok(()));
        right.expect_close().returning(|| Ok(()));

        let dispatcher = CommandDispatcher::new(left, right, DispatchSettings::default());
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let result = run(dispatcher, &SharedCommand::new(), Duration::from_millis(1), &shutdown);
        assert!(matches!(result, Err(WoabotError::Teardown(_))));
    }

    #[test]
    fn test_run_without_acceleration_limits_keeps_driving() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();

        let mut left = MockMotorChannel::new();
        left.expect_channel().return_const(0u32);
        left.expect_set_acceleration().never();
        left.expect_set_target_velocity().returning(move |velocity| {
            if velocity == 0.0 {
                trigger.trigger();
            }
            Ok(())
        });
        left.expect_close().times(1).returning(|| Ok(()));
        let mut right = MockMotorChannel::new();
        right.expect_channel().return_const(1u32);
        right.expect_set_acceleration().never();
        right.expect_set_target_velocity().returning(|_| Ok(()));
        right.expect_close().times(1).returning(|| Ok(()));

        // Limits were never read, so every mode change is refused
        let dispatcher = CommandDispatcher::new(left, right, DispatchSettings::default());
        let command = SharedCommand::new();
        command.publish(Targets::STOP, AccelerationMode::Boosted);

        let result = run(dispatcher, &command, Duration::from_millis(1), &shutdown);
        assert!(result.is_ok());
    }
}
