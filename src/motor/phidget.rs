//! # Phidget22 DC Motor Backend
//!
//! [`MotorChannel`] over a Phidget DC motor controller channel.
//!
//! The Phidget22 C library is loaded at runtime, so the crate builds on hosts
//! without it and a missing library is reported as a startup error. Every call
//! maps a nonzero return code to [`WoabotError::Actuator`] carrying the
//! library's own error description.
//!
//! ## Lifecycle
//!
//! | Step | Library call |
//! |------|--------------|
//! | [`PhidgetMotor::new`] | `PhidgetDCMotor_create`, `Phidget_setChannel` |
//! | `attach` | `Phidget_openWaitForAttachment` |
//! | `close` | `Phidget_close` |
//! | drop | `PhidgetDCMotor_delete` |

use libloading::Library;
use std::ffi::{c_char, c_double, c_int, c_void, CStr};
use std::fmt;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::MotorChannel;
use crate::error::{Result, WoabotError};

/// `EPHIDGET_OK`
const PHIDGET_OK: c_int = 0;

type Handle = *mut c_void;

type CreateFn = unsafe extern "C" fn(*mut Handle) -> c_int;
type DeleteFn = unsafe extern "C" fn(*mut Handle) -> c_int;
type SetChannelFn = unsafe extern "C" fn(Handle, c_int) -> c_int;
type OpenWaitFn = unsafe extern "C" fn(Handle, u32) -> c_int;
type CloseFn = unsafe extern "C" fn(Handle) -> c_int;
type SetDoubleFn = unsafe extern "C" fn(Handle, c_double) -> c_int;
type GetDoubleFn = unsafe extern "C" fn(Handle, *mut c_double) -> c_int;
type ErrorDescriptionFn = unsafe extern "C" fn(c_int, *mut *const c_char) -> c_int;

/// Entry points resolved from the Phidget22 shared library.
pub struct PhidgetLibrary {
    create: CreateFn,
    delete: DeleteFn,
    set_channel: SetChannelFn,
    open_wait_for_attachment: OpenWaitFn,
    close: CloseFn,
    set_target_velocity: SetDoubleFn,
    set_acceleration: SetDoubleFn,
    get_max_acceleration: GetDoubleFn,
    error_description: ErrorDescriptionFn,
    // Keeps the function pointers above valid
    _library: Library,
}

impl PhidgetLibrary {
    /// Loads the library at `path` (a file name is resolved by the dynamic loader).
    ///
    /// # Errors
    ///
    /// Returns `MotorBackend` if the library or any required symbol is missing.
    pub fn load(path: &str) -> Result<Arc<Self>> {
        // SAFETY: loading runs the library's initializers; Phidget22 has no
        // initializer requirements beyond being loaded once per process.
        let library = unsafe { Library::new(path) }
            .map_err(|e| WoabotError::MotorBackend(format!("Failed to load {}: {}", path, e)))?;

        // SAFETY: each symbol is read with the signature from phidget22.h.
        let api = unsafe {
            Self {
                create: symbol(&library, b"PhidgetDCMotor_create\0")?,
                delete: symbol(&library, b"PhidgetDCMotor_delete\0")?,
                set_channel: symbol(&library, b"Phidget_setChannel\0")?,
                open_wait_for_attachment: symbol(&library, b"Phidget_openWaitForAttachment\0")?,
                close: symbol(&library, b"Phidget_close\0")?,
                set_target_velocity: symbol(&library, b"PhidgetDCMotor_setTargetVelocity\0")?,
                set_acceleration: symbol(&library, b"PhidgetDCMotor_setAcceleration\0")?,
                get_max_acceleration: symbol(&library, b"PhidgetDCMotor_getMaxAcceleration\0")?,
                error_description: symbol(&library, b"Phidget_getErrorDescription\0")?,
                _library: library,
            }
        };

        info!("Loaded Phidget22 library from {}", path);
        Ok(Arc::new(api))
    }

    /// Human-readable text for a return code.
    fn describe(&self, code: c_int) -> String {
        let mut text: *const c_char = ptr::null();
        // SAFETY: the library writes a pointer to a static string or leaves it null.
        let status = unsafe { (self.error_description)(code, &mut text) };
        if status != PHIDGET_OK || text.is_null() {
            return format!("error code {:#x}", code);
        }
        // SAFETY: non-null and NUL-terminated per the library contract.
        let description = unsafe { CStr::from_ptr(text) };
        format!("{} ({:#x})", description.to_string_lossy(), code)
    }
}

impl fmt::Debug for PhidgetLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhidgetLibrary").finish_non_exhaustive()
    }
}

/// Copies a function pointer out of `library`.
///
/// # Safety
///
/// `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(library: &Library, name: &[u8]) -> Result<T> {
    library.get::<T>(name).map(|symbol| *symbol).map_err(|e| {
        let name = String::from_utf8_lossy(name.strip_suffix(b"\0").unwrap_or(name)).into_owned();
        WoabotError::MotorBackend(format!("Missing symbol {}: {}", name, e))
    })
}

/// One DC motor channel on a Phidget motor controller.
pub struct PhidgetMotor {
    library: Arc<PhidgetLibrary>,
    handle: Handle,
    channel: u32,
    attached: bool,
}

// SAFETY: the handle is exclusively owned by this value, and Phidget22 handles
// may be used from any thread.
unsafe impl Send for PhidgetMotor {}

impl PhidgetMotor {
    /// Creates a channel object bound to `channel`. Nothing is opened yet.
    ///
    /// # Errors
    ///
    /// Returns `Actuator` if the library refuses to create the channel.
    pub fn new(library: Arc<PhidgetLibrary>, channel: u32) -> Result<Self> {
        let mut handle: Handle = ptr::null_mut();
        // SAFETY: `create` writes a fresh handle into `handle`.
        let code = unsafe { (library.create)(&mut handle) };
        if code != PHIDGET_OK || handle.is_null() {
            return Err(WoabotError::Actuator {
                channel,
                reason: format!("create failed: {}", library.describe(code)),
            });
        }

        let motor = Self {
            library,
            handle,
            channel,
            attached: false,
        };

        let index = c_int::try_from(channel).map_err(|_| WoabotError::Actuator {
            channel,
            reason: "channel number out of range".to_string(),
        })?;
        // SAFETY: `handle` is a live channel handle owned by `motor`.
        let code = unsafe { (motor.library.set_channel)(motor.handle, index) };
        motor.check(code, "set channel")?;

        debug!("Phidget channel {} created", channel);
        Ok(motor)
    }

    fn check(&self, code: c_int, what: &str) -> Result<()> {
        if code == PHIDGET_OK {
            Ok(())
        } else {
            Err(WoabotError::Actuator {
                channel: self.channel,
                reason: format!("{}: {}", what, self.library.describe(code)),
            })
        }
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
}

impl MotorChannel for PhidgetMotor {
    fn channel(&self) -> u32 {
        self.channel
    }

    fn attach(&mut self, timeout: Duration) -> Result<()> {
        if self.attached {
            return Ok(());
        }
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        // SAFETY: live handle owned by `self`.
        let code = unsafe { (self.library.open_wait_for_attachment)(self.handle, timeout_ms) };
        if let Err(e) = self.check(code, "attach") {
            // Reset the open request so the next attempt starts clean
            // SAFETY: live handle owned by `self`.
            let _ = unsafe { (self.library.close)(self.handle) };
            return Err(e);
        }
        self.attached = true;
        Ok(())
    }

    fn set_target_velocity(&mut self, velocity: f64) -> Result<()> {
        self.ensure_attached()?;
        // SAFETY: live, attached handle owned by `self`.
        let code = unsafe { (self.library.set_target_velocity)(self.handle, velocity) };
        self.check(code, "set target velocity")
    }

    fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        self.ensure_attached()?;
        // SAFETY: live, attached handle owned by `self`.
        let code = unsafe { (self.library.set_acceleration)(self.handle, acceleration) };
        self.check(code, "set acceleration")
    }

    fn max_acceleration(&self) -> Result<f64> {
        self.ensure_attached()?;
        let mut value: c_double = 0.0;
        // SAFETY: live, attached handle; `value` outlives the call.
        let code = unsafe { (self.library.get_max_acceleration)(self.handle, &mut value) };
        self.check(code, "get max acceleration")?;
        Ok(value)
    }

    fn close(&mut self) -> Result<()> {
        if !self.attached {
            return Ok(());
        }
        // SAFETY: live handle owned by `self`.
        let code = unsafe { (self.library.close)(self.handle) };
        self.attached = false;
        self.check(code, "close")
    }
}

impl Drop for PhidgetMotor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
        // SAFETY: the handle came from `create` and is not used after this.
        let code = unsafe { (self.library.delete)(&mut self.handle) };
        if code != PHIDGET_OK {
            warn!(
                "Failed to delete Phidget channel {}: {}",
                self.channel,
                self.library.describe(code)
            );
        }
    }
}

impl fmt::Debug for PhidgetMotor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhidgetMotor")
            .field("channel", &self.channel)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}
