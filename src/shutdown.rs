//! # Shutdown Module
//!
//! Cooperative cancellation shared by the controller thread, the motor-sync
//! thread and the signal handler.
//!
//! The token only ever goes from "running" to "terminating". Every loop checks it
//! at the top of an iteration and every retry loop checks it before sleeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, WoabotError};

/// Process-wide terminate flag, cloned into every execution context.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    terminate: Arc<AtomicBool>,
}

impl Shutdown {
    /// Creates a token in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests termination. Returns true if this call flipped the flag.
    pub fn trigger(&self) -> bool {
        !self.terminate.swap(true, Ordering::SeqCst)
    }

    /// Returns true once termination has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}

/// Calls `attempt` until it succeeds, sleeping `interval` between failures.
///
/// Each failure is logged with `what` as the subject. Returns
/// [`WoabotError::Cancelled`] if the shutdown token is triggered while waiting.
pub fn retry_until_ready<T, F>(
    what: &str,
    interval: Duration,
    shutdown: &Shutdown,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    loop {
        if shutdown.is_triggered() {
            return Err(WoabotError::Cancelled);
        }

        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) => {
                info!("Waiting for {}... ({})", what, e);
                std::thread::sleep(interval);
            }
        }
    }
}
