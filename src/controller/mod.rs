//! # Controller Module
//!
//! Gamepad input handling.
//!
//! This module handles:
//! - Logical control identities and the numeric layout table
//! - Reading events from the joystick API or evdev
//! - Normalizing raw samples and applying the stick deadzone

pub mod joydev;
pub mod layout;
pub mod normalizer;
pub mod xbox;

use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;
use tracing::info;

use crate::config::{ControllerBackend, ControllerConfig, DEFAULT_JOYDEV_PATH};
use crate::error::{Result, WoabotError};
use crate::shutdown::{retry_until_ready, Shutdown};
use joydev::JoystickDevice;
use layout::{ControllerLayout, InputEvent};
use xbox::XboxController;

/// A source of resolved controller events.
pub trait InputSource: Send {
    /// Waits up to `timeout` for the next event the layout knows about.
    ///
    /// `Ok(None)` means nothing arrived in time, so callers can re-check the
    /// terminate flag without an event.
    ///
    /// # Errors
    ///
    /// Any error (short read, disconnect) ends the control loop.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>>;

    /// Human-readable origin, used in log lines.
    fn description(&self) -> &str;
}

/// Opens the configured input backend, waiting for the device to appear.
///
/// # Errors
///
/// Returns `Cancelled` if termination is requested while waiting.
pub fn connect(config: &ControllerConfig, shutdown: &Shutdown) -> Result<Box<dyn InputSource>> {
    let interval = config.reconnect_interval();
    let source: Box<dyn InputSource> = match config.backend {
        ControllerBackend::Joydev => Box::new(JoystickDevice::open_with_retry(
            config.device_path.as_deref().unwrap_or(DEFAULT_JOYDEV_PATH),
            ControllerLayout::xbox360(),
            interval,
            shutdown,
        )?),
        ControllerBackend::Evdev => Box::new(retry_until_ready(
            "controller",
            interval,
            shutdown,
            || match config.device_path.as_deref() {
                Some(path) => XboxController::open_path(path),
                None => XboxController::open(),
            },
        )?),
    };
    info!("Controller connected: {}", source.description());
    Ok(source)
}

/// Waits up to `timeout` for `fd` to become readable (or hang up).
///
/// Returns false on timeout or when a signal interrupted the wait.
///
/// # Errors
///
/// Returns `Controller` if `poll` fails.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    // SAFETY: `pollfd` is a valid, exclusively borrowed array of length 1.
    let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if ready < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(WoabotError::Controller(format!("Failed to poll input device: {}", err)));
    }
    Ok(ready > 0)
}
