//! # Joystick API Event Source
//!
//! Reads the Linux joystick interface (`/dev/input/js*`), which reports every
//! control as a fixed 8-byte record:
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0 | u32 | timestamp (ms, ignored) |
//! | 4 | i16 | value |
//! | 6 | u8 | type (0x01 button, 0x02 axis, 0x80 init flag) |
//! | 7 | u8 | axis/button number |
//!
//! All fields are little-endian. Axis values already span the signed 16-bit range
//! the normalizer expects, so no rescaling happens here.

use bytes::Buf;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::layout::{ControllerLayout, EventKind, InputEvent};
use super::{wait_readable, InputSource};
use crate::error::{Result, WoabotError};
use crate::shutdown::{retry_until_ready, Shutdown};

/// Size of one joystick record in bytes.
pub const JS_EVENT_SIZE: usize = 8;

/// Button press/release record.
pub const JS_EVENT_BUTTON: u8 = 0x01;

/// Axis movement record.
pub const JS_EVENT_AXIS: u8 = 0x02;

/// Flag set on the synthetic records the driver emits when the device is opened.
pub const JS_EVENT_INIT: u8 = 0x80;

/// One decoded joystick record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsRecord {
    pub time_ms: u32,
    pub value: i16,
    pub kind: u8,
    pub number: u8,
}

impl JsRecord {
    /// Decodes a raw record.
    #[must_use]
    pub fn decode(raw: [u8; JS_EVENT_SIZE]) -> Self {
        let mut buf = &raw[..];
        Self {
            time_ms: buf.get_u32_le(),
            value: buf.get_i16_le(),
            kind: buf.get_u8(),
            number: buf.get_u8(),
        }
    }

    /// Event class of a live record. Init records and unknown types yield `None`.
    #[must_use]
    pub fn event_kind(&self) -> Option<EventKind> {
        match self.kind {
            JS_EVENT_AXIS => Some(EventKind::Axis),
            JS_EVENT_BUTTON => Some(EventKind::Button),
            _ => None,
        }
    }
}

/// Joystick device handle.
///
/// Generic over the reader so tests can feed byte streams through a socket pair.
pub struct JoystickDevice<R = File> {
    reader: R,
    layout: ControllerLayout,
    device_path: String,
}

impl<R> std::fmt::Debug for JoystickDevice<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoystickDevice")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl JoystickDevice<File> {
    /// Opens a joystick device once.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device node cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, layout: ControllerLayout) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            WoabotError::Controller(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let device_path = path.to_string_lossy().to_string();
        info!("Opened joystick device at {}", device_path);
        Ok(Self::from_reader(file, layout, device_path))
    }

    /// Opens a joystick device, waiting for it to appear.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if termination is requested before the device opens.
    pub fn open_with_retry<P: AsRef<Path>>(
        path: P,
        layout: ControllerLayout,
        interval: Duration,
        shutdown: &Shutdown,
    ) -> Result<Self> {
        let path = path.as_ref();
        retry_until_ready("controller", interval, shutdown, || {
            Self::open(path, layout.clone())
        })
    }
}

impl<R: Read> JoystickDevice<R> {
    /// Wraps an arbitrary byte reader.
    pub fn from_reader(reader: R, layout: ControllerLayout, device_path: String) -> Self {
        Self {
            reader,
            layout,
            device_path,
        }
    }

    /// Returns the device path this source reads from.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Blocks until one full record is read.
    ///
    /// # Errors
    ///
    /// A short read or any I/O failure is reported as `Controller`.
    pub fn read_record(&mut self) -> Result<JsRecord> {
        let mut raw = [0u8; JS_EVENT_SIZE];
        self.reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                WoabotError::Controller("Short read from joystick device".to_string())
            }
            _ => WoabotError::Controller(format!("Failed to read joystick event: {}", e)),
        })?;
        Ok(JsRecord::decode(raw))
    }
}

impl<R: Read + AsRawFd + Send> InputSource for JoystickDevice<R> {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !wait_readable(self.reader.as_raw_fd(), remaining)? {
                return Ok(None);
            }

            let record = self.read_record()?;

            let Some(kind) = record.event_kind() else {
                continue;
            };

            match self.layout.resolve(kind, record.number) {
                Some(control) => {
                    return Ok(Some(InputEvent {
                        control,
                        value: record.value,
                    }))
                }
                None => debug!("Ignoring unmapped {:?} {}", kind, record.number),
            }
        }
    }

    fn description(&self) -> &str {
        &self.device_path
    }
}
