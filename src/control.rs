//! # Control Loop Module
//!
//! Runs the per-event pipeline: read an event, route it into the drive state,
//! recompute both targets and hand them to a command sink.
//!
//! There is no batching: every event produces exactly one recompute and one
//! dispatch. The loop checks the terminate flag at the top of every iteration,
//! and at least once per poll interval while the controller is idle.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::controller::layout::InputEvent;
use crate::controller::InputSource;
use crate::drive::mixer::{Targets, VelocityMixer};
use crate::drive::router::EventRouter;
use crate::drive::state::{AccelerationMode, DriveState};
use crate::error::{Result, WoabotError};
use crate::motor::dispatcher::CommandDispatcher;
use crate::motor::sync::SharedCommand;
use crate::motor::MotorChannel;
use crate::shutdown::Shutdown;

/// Where computed targets go after every event.
pub trait CommandSink {
    /// Delivers the latest targets and acceleration mode.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if terminate interrupted delivery.
    fn dispatch(&mut self, targets: Targets, mode: AccelerationMode, shutdown: &Shutdown) -> Result<()>;
}

/// Threaded mode: publish for the motor-sync thread.
impl CommandSink for Arc<SharedCommand> {
    fn dispatch(&mut self, targets: Targets, mode: AccelerationMode, _shutdown: &Shutdown) -> Result<()> {
        self.publish(targets, mode);
        Ok(())
    }
}

/// Inline mode: command the motors from the controller thread.
impl<M: MotorChannel> CommandSink for CommandDispatcher<M> {
    fn dispatch(&mut self, targets: Targets, mode: AccelerationMode, shutdown: &Shutdown) -> Result<()> {
        match self.converge(targets, shutdown) {
            Ok(()) => {}
            Err(WoabotError::Cancelled) => return Err(WoabotError::Cancelled),
            Err(e) => warn!("Velocity command not acknowledged: {}", e),
        }
        // Failures are logged by the dispatcher and not retried
        if let Err(e) = self.apply_acceleration(mode) {
            debug!("Acceleration left unchanged: {}", e);
        }
        Ok(())
    }
}

/// Why the control loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Terminate button.
    Terminated,
    /// Shutdown button: terminate, then power off the host.
    Shutdown,
    /// The input device failed or disconnected.
    InputLost,
    /// Terminate flag set from outside the loop (signal, other thread).
    Interrupted,
}

/// Idle wait used by [`ControlLoop::new`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-robot control context.
pub struct ControlLoop<K: CommandSink> {
    state: DriveState,
    router: EventRouter,
    mixer: VelocityMixer,
    sink: K,
    poll_interval: Duration,
}

impl<K: CommandSink> ControlLoop<K> {
    #[must_use]
    pub fn new(router: EventRouter, mixer: VelocityMixer, sink: K) -> Self {
        Self {
            state: DriveState::new(),
            router,
            mixer,
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, sink: K) -> Self {
        Self::new(
            EventRouter::from_config(config),
            VelocityMixer::new(config.drive.stepped_velocity),
            sink,
        )
        .with_poll_interval(config.controller.poll_interval())
    }

    /// Longest time to wait for input before re-checking the terminate flag.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn state(&self) -> &DriveState {
        &self.state
    }

    #[must_use]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Gives back the sink, e.g. to tear down an inline dispatcher.
    #[must_use]
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Routes one event, recomputes and dispatches.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if terminate interrupted the dispatch.
    pub fn handle_event(&mut self, event: InputEvent, shutdown: &Shutdown) -> Result<Targets> {
        self.router.route(&mut self.state, event);

        let targets = self.mixer.compute_targets(&self.state);
        if self.state.debug {
            info!(
                "Targets: left {:.2} right {:.2} (trim {}, {:?})",
                targets.left, targets.right, self.state.steer_trim, self.state.acceleration_mode
            );
        }

        self.sink.dispatch(targets, self.state.acceleration_mode, shutdown)?;
        Ok(targets)
    }

    /// Processes events until terminate, shutdown or input loss.
    ///
    /// An operator terminate or shutdown also sets the shared terminate flag.
    pub fn run(&mut self, source: &mut dyn InputSource, shutdown: &Shutdown) -> ExitReason {
        info!("Control loop reading from {}", source.description());

        loop {
            if shutdown.is_triggered() {
                return ExitReason::Interrupted;
            }

            let event = match source.next_event(self.poll_interval) {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    error!("Controller input lost: {}", e);
                    return ExitReason::InputLost;
                }
            };

            if let Err(e) = self.handle_event(event, shutdown) {
                info!("Dispatch interrupted: {}", e);
                return ExitReason::Interrupted;
            }

            if self.state.terminate_requested {
                shutdown.trigger();
                return if self.state.shutdown_requested {
                    ExitReason::Shutdown
                } else {
                    ExitReason::Terminated
                };
            }
        }
    }
}
