//! # Woabot
//!
//! Drive a two-motor differential-drive robot with an Xbox 360 controller.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (`WOABOT_CONFIG`, else `config/woabot.toml`, else defaults)
//!    - Set up console and rolling file logging
//!    - Select the motor backend (Phidget22 unless `simulated` is configured)
//!    - Start the motor-sync thread (threaded mode) and the controller thread
//!
//! 2. **Main Loop**
//!    - The controller thread routes every event into the drive state and
//!      dispatches the recomputed targets
//!    - Ctrl+C or the terminate/shutdown buttons set the terminate flag
//!
//! 3. **Graceful Shutdown**
//!    - Command zero velocity to both motors and release them
//!    - Exit nonzero if the motors could not be stopped
//!    - Power off the host if the shutdown button was pressed

use anyhow::{bail, Result};
use chrono::Local;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use woabot::config::{Config, DispatchMode, MotorBackend, MotorConfig};
use woabot::control::{ControlLoop, ExitReason};
use woabot::controller;
use woabot::error::WoabotError;
use woabot::logging;
use woabot::motor::dispatcher::CommandDispatcher;
#[cfg(feature = "phidget")]
use woabot::motor::phidget::{PhidgetLibrary, PhidgetMotor};
use woabot::motor::simulated::SimulatedMotor;
use woabot::motor::sync::{self, SharedCommand};
use woabot::motor::MotorChannel;
use woabot::shutdown::Shutdown;

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "WOABOT_CONFIG";

/// Config file used when `WOABOT_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "config/woabot.toml";

/// Extra time a threaded-mode controller thread gets to report after terminate.
const CONTROLLER_GRACE: Duration = Duration::from_secs(1);

type Outcome<T> = woabot::error::Result<T>;
type BoxedMotor = Box<dyn MotorChannel>;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = resolve_config_path(std::env::var_os(CONFIG_ENV), Path::new(DEFAULT_CONFIG_PATH));
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let _log_guard = logging::init(&config.logging)?;

    info!(
        "Woabot v{} starting at {}",
        env!("CARGO_PKG_VERSION"),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }
    if config.motors.backend == MotorBackend::Simulated {
        warn!("Simulated motor backend active: no motor will move");
    }

    let shutdown = Shutdown::new();
    let threaded = config.motors.mode == DispatchMode::Threaded;

    let (sync_tx, mut sync_rx) = oneshot::channel::<Outcome<()>>();
    let command = SharedCommand::new();
    if threaded {
        let config = config.clone();
        let command = Arc::clone(&command);
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("motor-sync".to_string())
            .spawn(move || {
                let outcome = run_motor_sync(&config, &command, &shutdown);
                shutdown.trigger();
                let _ = sync_tx.send(outcome);
            })?;
    }

    let (controller_tx, mut controller_rx) = oneshot::channel::<Outcome<ExitReason>>();
    {
        let config = config.clone();
        let shutdown = shutdown.clone();
        thread::Builder::new()
            .name("controller".to_string())
            .spawn(move || {
                let outcome = if threaded {
                    run_controller(&config, command, &shutdown)
                } else {
                    run_inline(&config, &shutdown)
                };
                shutdown.trigger();
                let _ = controller_tx.send(outcome);
            })?;
    }

    info!("Press Ctrl+C to exit");

    let mut controller_outcome = None;
    let mut sync_outcome = None;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        outcome = &mut controller_rx => controller_outcome = Some(outcome),
        outcome = &mut sync_rx, if threaded => sync_outcome = Some(outcome),
    }
    shutdown.trigger();

    if threaded {
        let outcome = match sync_outcome {
            Some(outcome) => outcome,
            None => sync_rx.await,
        };
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => bail!("Motor sync thread exited without stopping the motors"),
        }
        // The controller thread re-checks terminate at least once per poll or
        // reconnect interval
        if controller_outcome.is_none() {
            let grace = config
                .controller
                .poll_interval()
                .max(config.controller.reconnect_interval())
                + CONTROLLER_GRACE;
            controller_outcome = await_controller(controller_rx, grace).await;
            if controller_outcome.is_none() {
                warn!("Controller thread did not stop within {:?}", grace);
            }
        }
    } else if controller_outcome.is_none() {
        info!("Waiting for the controller thread to stop the motors");
        controller_outcome = Some(controller_rx.await);
    }

    let reason = match controller_outcome {
        Some(Ok(Ok(reason))) => Some(reason),
        Some(Ok(Err(e))) => return Err(e.into()),
        Some(Err(_)) => bail!("Controller thread exited unexpectedly"),
        None => None,
    };

    info!("Woabot stopped ({:?})", reason.unwrap_or(ExitReason::Interrupted));

    if reason == Some(ExitReason::Shutdown) {
        power_off(&config.host.power_off_command);
    }

    Ok(())
}

/// `WOABOT_CONFIG` if set, otherwise `fallback` if it exists.
fn resolve_config_path(from_env: Option<OsString>, fallback: &Path) -> Option<PathBuf> {
    match from_env {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ if fallback.is_file() => Some(fallback.to_path_buf()),
        _ => None,
    }
}

/// Waits up to `grace` for the controller thread's outcome.
async fn await_controller(
    controller_rx: oneshot::Receiver<Outcome<ExitReason>>,
    grace: Duration,
) -> Option<Result<Outcome<ExitReason>, oneshot::error::RecvError>> {
    tokio::time::timeout(grace, controller_rx).await.ok()
}

/// Builds both motor channels for the configured backend.
fn motors(config: &Config) -> Outcome<(BoxedMotor, BoxedMotor)> {
    let motors = &config.motors;
    match motors.backend {
        MotorBackend::Simulated => {
            let max = motors.simulated_max_acceleration;
            Ok((
                Box::new(SimulatedMotor::new(motors.left_channel, max)),
                Box::new(SimulatedMotor::new(motors.right_channel, max)),
            ))
        }
        MotorBackend::Phidget => phidget_motors(motors),
    }
}

#[cfg(feature = "phidget")]
fn phidget_motors(config: &MotorConfig) -> Outcome<(BoxedMotor, BoxedMotor)> {
    let library = PhidgetLibrary::load(&config.phidget_library)?;
    let left = PhidgetMotor::new(Arc::clone(&library), config.left_channel)?;
    let right = PhidgetMotor::new(library, config.right_channel)?;
    Ok((Box::new(left), Box::new(right)))
}

#[cfg(not(feature = "phidget"))]
fn phidget_motors(_config: &MotorConfig) -> Outcome<(BoxedMotor, BoxedMotor)> {
    Err(WoabotError::MotorBackend(
        "built without the `phidget` feature; set [motors] backend = \"simulated\" to run without hardware"
            .to_string(),
    ))
}

/// Motor-sync thread body (threaded mode).
fn run_motor_sync(config: &Config, command: &SharedCommand, shutdown: &Shutdown) -> Outcome<()> {
    let (left, right) = motors(config).map_err(|e| {
        error!("Motor startup failed: {}", e);
        e
    })?;
    let dispatcher = match CommandDispatcher::connect(left, right, &config.motors, shutdown) {
        Ok(dispatcher) => dispatcher,
        Err(WoabotError::Cancelled) => return Ok(()),
        Err(e) => {
            error!("Motor startup failed: {}", e);
            return Err(e);
        }
    };
    sync::run(dispatcher, command, config.motors.sync_interval(), shutdown)
}

/// Controller thread body (threaded mode): publish targets for the sync thread.
fn run_controller(config: &Config, command: Arc<SharedCommand>, shutdown: &Shutdown) -> Outcome<ExitReason> {
    let mut source = match controller::connect(&config.controller, shutdown) {
        Ok(source) => source,
        Err(WoabotError::Cancelled) => return Ok(ExitReason::Interrupted),
        Err(e) => return Err(e),
    };

    let mut control = ControlLoop::from_config(config, command);
    Ok(control.run(source.as_mut(), shutdown))
}

/// Controller thread body (inline mode): own the motors and command them
/// after every event.
fn run_inline(config: &Config, shutdown: &Shutdown) -> Outcome<ExitReason> {
    let (left, right) = motors(config)?;
    let dispatcher = match CommandDispatcher::connect(left, right, &config.motors, shutdown) {
        Ok(dispatcher) => dispatcher,
        Err(WoabotError::Cancelled) => return Ok(ExitReason::Interrupted),
        Err(e) => return Err(e),
    };

    let (reason, dispatcher) = match controller::connect(&config.controller, shutdown) {
        Ok(mut source) => {
            let mut control = ControlLoop::from_config(config, dispatcher);
            let reason = control.run(source.as_mut(), shutdown);
            (reason, control.into_sink())
        }
        Err(e) => {
            warn!("Controller not connected: {}", e);
            (ExitReason::Interrupted, dispatcher)
        }
    };

    shutdown.trigger();
    dispatcher.teardown()?;
    Ok(reason)
}

/// Starts the host power-off command without waiting for it.
fn power_off(command: &[String]) {
    let Some((program, args)) = command.split_first() else {
        return;
    };

    match std::process::Command::new(program).args(args).spawn() {
        Ok(_) => info!("Host power-off requested: {}", command.join(" ")),
        Err(e) => error!("Failed to run power-off command {}: {}", program, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_from_env() {
        let path = resolve_config_path(Some(OsString::from("/etc/woabot.toml")), Path::new("missing.toml"));
        assert_eq!(path, Some(PathBuf::from("/etc/woabot.toml")));
    }

    #[test]
    fn test_config_path_fallback_exists() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("woabot.toml");
        std::fs::write(&fallback, "").unwrap();

        assert_eq!(resolve_config_path(None, &fallback), Some(fallback.clone()));
        assert_eq!(resolve_config_path(Some(OsString::new()), &fallback), Some(fallback));
    }

    #[test]
    fn test_config_path_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_config_path(None, &dir.path().join("absent.toml")), None);
    }

    #[test]
    fn test_motors_use_configured_channels() {
        let mut config = Config::default();
        config.motors.backend = MotorBackend::Simulated;
        config.motors.left_channel = 4;
        config.motors.right_channel = 5;
        let (left, right) = motors(&config).unwrap();
        assert_eq!(left.channel(), 4);
        assert_eq!(right.channel(), 5);
    }

    #[test]
    fn test_phidget_backend_is_default() {
        let mut config = Config::default();
        config.motors.phidget_library = "libwoabot-no-such-library.so".to_string();
        // Never falls back to simulated motors
        assert!(matches!(motors(&config), Err(WoabotError::MotorBackend(_))));
    }

    #[test]
    fn test_inline_startup_fails_without_motor_library() {
        let mut config = Config::default();
        config.motors.mode = DispatchMode::Inline;
        config.motors.phidget_library = "libwoabot-no-such-library.so".to_string();
        assert!(matches!(
            run_inline(&config, &Shutdown::new()),
            Err(WoabotError::MotorBackend(_))
        ));
    }

    // ==================== Shutdown Tests ====================

    #[tokio::test]
    async fn test_late_controller_outcome_is_collected() {
        let (tx, rx) = oneshot::channel();
        // The controller reports after the motor-sync thread already finished
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = tx.send(Ok(ExitReason::Shutdown));
        });

        let outcome = await_controller(rx, Duration::from_secs(5)).await;
        assert!(matches!(outcome, Some(Ok(Ok(ExitReason::Shutdown)))));
    }

    #[tokio::test]
    async fn test_stuck_controller_times_out() {
        let (_tx, rx) = oneshot::channel::<Outcome<ExitReason>>();
        assert!(await_controller(rx, Duration::from_millis(20)).await.is_none());
    }

    #[test]
    fn test_power_off_empty_command_is_noop() {
        power_off(&[]);
    }
}
