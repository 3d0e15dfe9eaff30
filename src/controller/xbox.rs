//! # Xbox 360 Controller Module (evdev)
//!
//! This module handles Xbox 360 controller detection, connection, and input reading
//! using the Linux evdev interface, as an alternative to the joystick API.
//!
//! ## Controller Detection
//!
//! The wired Xbox 360 controller is identified by:
//! - Vendor ID: 0x045e (Microsoft)
//! - Product ID: 0x028e (Xbox 360 Controller)
//!
//! ## Input Axes
//!
//! evdev reports native ranges, which are rescaled to the joystick API's signed
//! 16-bit domain so the normalizer sees the same values from either backend:
//!
//! | Axis | evdev Code | Native Range | Rescaled |
//! |------|------------|--------------|----------|
//! | Left Stick X/Y | ABS_X, ABS_Y | -32768..32767 | clamped to ±32767 |
//! | Right Stick X/Y | ABS_RX, ABS_RY | -32768..32767 | clamped to ±32767 |
//! | Left/Right Trigger | ABS_Z, ABS_RZ | 0..255 | -32767..32767 |
//! | D-Pad X/Y | ABS_HAT0X, ABS_HAT0Y | -1/0/1 | -32767/0/32767 |

use evdev::{AbsoluteAxisType, Device, InputEvent as EvdevEvent, InputEventKind, Key};
use std::collections::VecDeque;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::layout::{Axis, Button, InputEvent};
use super::{wait_readable, InputSource};
use crate::error::{Result, WoabotError};

/// Xbox 360 controller vendor ID (Microsoft)
const XBOX360_VENDOR_ID: u16 = 0x045e;

/// Xbox 360 wired controller product ID
const XBOX360_PRODUCT_ID: u16 = 0x028e;

/// Native trigger full-scale value reported by `xpad`.
const TRIGGER_NATIVE_MAX: i32 = 255;

/// Signed 16-bit full deflection.
const RAW_FULL: i32 = 32767;

/// Xbox 360 controller handle
///
/// Represents an active connection to an Xbox 360 controller via evdev.
pub struct XboxController {
    device: Device,
    device_path: String,
    pending: VecDeque<InputEvent>,
}

impl std::fmt::Debug for XboxController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XboxController")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl XboxController {
    /// Detect and open the first available Xbox 360 controller
    ///
    /// Scans all `/dev/input/event*` devices to find a connected controller
    /// by matching vendor and product IDs.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: No Xbox 360 controller found on the system
    /// - `Controller`: `/dev/input` could not be listed
    pub fn open() -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(WoabotError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| WoabotError::Controller(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| WoabotError::Controller(format!("Failed to read directory entry: {}", e)))?;

        // Deterministic pick when several pads are connected
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    let id = device.input_id();
                    debug!(
                        "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                        path.display(),
                        id.vendor(),
                        id.product()
                    );

                    if id.vendor() == XBOX360_VENDOR_ID && id.product() == XBOX360_PRODUCT_ID {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Found Xbox 360 controller at: {}", device_path);
                        return Ok(Self::from_device(device, device_path));
                    }
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(WoabotError::ControllerNotFound)
    }

    /// Open a specific evdev node without vendor checks.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path).map_err(|e| {
            WoabotError::Controller(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let device_path = path.to_string_lossy().to_string();
        info!("Opened evdev controller at: {}", device_path);
        Ok(Self::from_device(device, device_path))
    }

    fn from_device(device: Device, device_path: String) -> Self {
        Self {
            device,
            device_path,
            pending: VecDeque::new(),
        }
    }

    /// Get the device path of this controller
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Get controller name from evdev
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }
}

impl InputSource for XboxController {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        if !wait_readable(self.device.as_raw_fd(), timeout)? {
            return Ok(None);
        }

        let events: Vec<EvdevEvent> = self
            .device
            .fetch_events()
            .map_err(|e| WoabotError::Controller(format!("Failed to fetch events: {}", e)))?
            .collect();

        // A batch of sync-only events leaves nothing pending
        self.pending.extend(events.iter().filter_map(translate));
        Ok(self.pending.pop_front())
    }

    fn description(&self) -> &str {
        &self.device_path
    }
}

/// Translates an evdev event to a logical input sample.
///
/// Sync events, gyro/motion axes and unknown keys yield `None`.
#[must_use]
pub fn translate(event: &EvdevEvent) -> Option<InputEvent> {
    match event.kind() {
        InputEventKind::AbsAxis(axis) => {
            let logical = match axis {
                AbsoluteAxisType::ABS_X => Axis::LeftStickX,
                AbsoluteAxisType::ABS_Y => Axis::LeftStickY,
                AbsoluteAxisType::ABS_RX => Axis::RightStickX,
                AbsoluteAxisType::ABS_RY => Axis::RightStickY,
                AbsoluteAxisType::ABS_Z => Axis::LeftTrigger,
                AbsoluteAxisType::ABS_RZ => Axis::RightTrigger,
                AbsoluteAxisType::ABS_HAT0X => Axis::DPadX,
                AbsoluteAxisType::ABS_HAT0Y => Axis::DPadY,
                _ => return None,
            };
            Some(InputEvent::axis(logical, rescale(logical, event.value())))
        }
        InputEventKind::Key(key) => {
            let button = match key {
                Key::BTN_SOUTH => Button::A,
                Key::BTN_EAST => Button::B,
                Key::BTN_NORTH => Button::X,
                Key::BTN_WEST => Button::Y,
                Key::BTN_TL => Button::LeftBumper,
                Key::BTN_TR => Button::RightBumper,
                Key::BTN_SELECT => Button::Back,
                Key::BTN_START => Button::Start,
                Key::BTN_MODE => Button::Guide,
                Key::BTN_THUMBL => Button::LeftThumb,
                Key::BTN_THUMBR => Button::RightThumb,
                _ => return None,
            };
            Some(InputEvent::button(button, event.value() != 0))
        }
        _ => None,
    }
}

/// Rescales a native evdev value to the signed 16-bit joystick domain.
#[must_use]
pub fn rescale(axis: Axis, value: i32) -> i16 {
    let scaled = match axis {
        Axis::LeftTrigger | Axis::RightTrigger => {
            value.clamp(0, TRIGGER_NATIVE_MAX) * (RAW_FULL * 2) / TRIGGER_NATIVE_MAX - RAW_FULL
        }
        Axis::DPadX | Axis::DPadY => value.signum() * RAW_FULL,
        _ => value.clamp(-RAW_FULL, RAW_FULL),
    };
    scaled as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::layout::Control;
    use evdev::EventType;

    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> EvdevEvent {
        EvdevEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    fn make_key_event(key: Key, pressed: bool) -> EvdevEvent {
        EvdevEvent::new(EventType::KEY, key.code(), if pressed { 1 } else { 0 })
    }

    #[test]
    fn test_xbox360_ids() {
        assert_eq!(XBOX360_VENDOR_ID, 0x045e, "Microsoft vendor ID should be 0x045e");
        assert_eq!(XBOX360_PRODUCT_ID, 0x028e, "Xbox 360 product ID should be 0x028e");
    }

    #[test]
    fn test_rescale_triggers() {
        assert_eq!(rescale(Axis::RightTrigger, 0), -32767);
        assert_eq!(rescale(Axis::RightTrigger, 255), 32767);
        assert_eq!(rescale(Axis::LeftTrigger, 300), 32767);
    }

    #[test]
    fn test_rescale_sticks_clamp() {
        assert_eq!(rescale(Axis::LeftStickX, -32768), -32767);
        assert_eq!(rescale(Axis::LeftStickX, 1000), 1000);
    }

    #[test]
    fn test_rescale_hat() {
        assert_eq!(rescale(Axis::DPadX, -1), -32767);
        assert_eq!(rescale(Axis::DPadX, 0), 0);
        assert_eq!(rescale(Axis::DPadY, 1), 32767);
    }

    #[test]
    fn test_translate_axes() {
        let event = translate(&make_axis_event(AbsoluteAxisType::ABS_RZ, 255)).unwrap();
        assert_eq!(event.control, Control::Axis(Axis::RightTrigger));
        assert_eq!(event.value, 32767);

        let event = translate(&make_axis_event(AbsoluteAxisType::ABS_RX, 16384)).unwrap();
        assert_eq!(event.control, Control::Axis(Axis::RightStickX));
        assert_eq!(event.value, 16384);
    }

    #[test]
    fn test_translate_buttons() {
        let event = translate(&make_key_event(Key::BTN_NORTH, true)).unwrap();
        assert_eq!(event, InputEvent::button(Button::X, true));

        let event = translate(&make_key_event(Key::BTN_MODE, false)).unwrap();
        assert_eq!(event, InputEvent::button(Button::Guide, false));
    }

    #[test]
    fn test_translate_ignores_unknown() {
        assert!(translate(&make_axis_event(AbsoluteAxisType::ABS_MISC, 5)).is_none());
        assert!(translate(&make_key_event(Key::KEY_A, true)).is_none());
        assert!(translate(&EvdevEvent::new(EventType::SYNCHRONIZATION, 0, 0)).is_none());
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        let result = XboxController::open();
        assert!(result.is_ok(), "Should detect connected Xbox 360 controller");

        let controller = result.unwrap();
        assert!(controller.device_path().starts_with("/dev/input/event"));
        assert!(controller.name().is_some());
    }
}
