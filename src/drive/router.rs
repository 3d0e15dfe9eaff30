//! # Event Router Module
//!
//! Maps each logical control to the [`DriveState`] mutation it triggers.
//!
//! Dispatch goes through a lookup table from [`Control`] to a handler closure, so
//! the controller's numeric layout never reaches this module and bindings can be
//! changed from the config file.
//!
//! ## Default Bindings
//!
//! | Control | Effect |
//! |---------|--------|
//! | Left Stick X | Power balance (steering) |
//! | Right Stick X | Steering trim nudge at full deflection |
//! | Right Trigger | Forward throttle |
//! | Left Trigger | Reverse throttle |
//! | D-Pad | Drive / pivot presets while held |
//! | A | Boost (momentary) |
//! | RB | Afterburner (momentary) |
//! | B | Reset steering trim |
//! | Back | Reset all drive state |
//! | X | Terminate |
//! | Guide | Terminate and power off the host |
//! | Y | Toggle debug output |

use std::collections::HashMap;
use tracing::{debug, info};

use super::state::{DriveState, Preset};
use crate::config::{BindingsConfig, DriveConfig};
use crate::controller::layout::{Axis, Button, Control, InputEvent};
use crate::controller::normalizer::InputNormalizer;

/// State mutation for one control. Receives the normalized axis value, or 0/1
/// for buttons.
pub type Handler = Box<dyn Fn(&mut DriveState, i32) + Send>;

/// Lookup table from logical control to handler.
pub struct EventRouter {
    normalizer: InputNormalizer,
    handlers: HashMap<Control, Handler>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("normalizer", &self.normalizer)
            .field("controls", &self.handlers.len())
            .finish()
    }
}

impl EventRouter {
    /// Builds the handler table from drive settings and button bindings.
    #[must_use]
    pub fn new(normalizer: InputNormalizer, drive: &DriveConfig, bindings: &BindingsConfig) -> Self {
        let mut router = Self {
            normalizer,
            handlers: HashMap::new(),
        };

        let steering = drive.steering;
        router.on_axis(Axis::LeftStickX, move |state, value| {
            state.set_power_balance(value, steering);
        });

        let trim_limit = drive.trim_limit;
        router.on_axis(Axis::RightStickX, move |state, value| {
            if state.nudge_trim(value, trim_limit) {
                info!("Steering trim: {}", state.steer_trim);
            }
        });

        router.on_axis(Axis::RightTrigger, |state, value| state.throttle_forward = value);
        router.on_axis(Axis::LeftTrigger, |state, value| state.throttle_reverse = value);

        let (drive_throttle, pivot_throttle) = (drive.dpad_throttle, drive.pivot_throttle);
        router.on_axis(Axis::DPadX, move |state, value| {
            preset_axis(state, value, Preset::PivotLeft, Preset::PivotRight, drive_throttle, pivot_throttle);
        });
        router.on_axis(Axis::DPadY, move |state, value| {
            preset_axis(state, value, Preset::Forward, Preset::Back, drive_throttle, pivot_throttle);
        });

        for (button, preset) in [
            (Button::DPadLeft, Preset::PivotLeft),
            (Button::DPadRight, Preset::PivotRight),
            (Button::DPadUp, Preset::Forward),
            (Button::DPadDown, Preset::Back),
        ] {
            router.on_button(button, move |state, value| {
                if is_pressed(value) {
                    state.apply_preset(preset, drive_throttle, pivot_throttle);
                } else {
                    state.release_preset();
                }
            });
        }

        router.on_button(bindings.boost, |state, value| state.set_boost(is_pressed(value)));
        router.on_button(bindings.afterburner, |state, value| {
            state.set_afterburner(is_pressed(value));
        });

        router.on_button(bindings.calibration_reset, |state, value| {
            if is_pressed(value) {
                state.reset_calibration();
                info!("Steering trim reset");
            }
        });
        router.on_button(bindings.full_reset, |state, value| {
            if is_pressed(value) {
                state.reset();
                info!("Drive state reset");
            }
        });
        router.on_button(bindings.terminate, |state, value| {
            if is_pressed(value) && state.request_terminate() {
                info!("Terminate requested");
            }
        });
        router.on_button(bindings.shutdown, |state, value| {
            if is_pressed(value) {
                state.request_shutdown();
                info!("Shutdown requested");
            }
        });
        router.on_button(bindings.debug, |state, value| {
            if is_pressed(value) {
                state.debug = !state.debug;
                info!("Debug output {}", if state.debug { "enabled" } else { "disabled" });
            }
        });

        router
    }

    /// Builds the router from the full configuration.
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            InputNormalizer::new(config.controller.deadzone),
            &config.drive,
            &config.bindings,
        )
    }

    /// Registers (or replaces) the handler for an axis.
    pub fn on_axis<F>(&mut self, axis: Axis, handler: F)
    where
        F: Fn(&mut DriveState, i32) + Send + 'static,
    {
        self.handlers.insert(Control::Axis(axis), Box::new(handler));
    }

    /// Registers (or replaces) the handler for a button.
    pub fn on_button<F>(&mut self, button: Button, handler: F)
    where
        F: Fn(&mut DriveState, i32) + Send + 'static,
    {
        self.handlers.insert(Control::Button(button), Box::new(handler));
    }

    /// Applies one event to the drive state.
    ///
    /// Axis samples are normalized and deadzone-filtered first. Returns false if
    /// no handler is bound to the control.
    pub fn route(&self, state: &mut DriveState, event: InputEvent) -> bool {
        let value = match event.control {
            Control::Axis(axis) => self.normalizer.process(axis, event.value),
            Control::Button(_) => i32::from(event.value),
        };

        match self.handlers.get(&event.control) {
            Some(handler) => {
                handler(state, value);
                true
            }
            None => {
                debug!("No handler for {:?}", event.control);
                false
            }
        }
    }
}

fn is_pressed(value: i32) -> bool {
    value != 0
}

/// Negative deflection selects `negative`, positive `positive`, center releases.
fn preset_axis(
    state: &mut DriveState,
    value: i32,
    negative: Preset,
    positive: Preset,
    drive_throttle: i32,
    pivot_throttle: i32,
) {
    match value.signum() {
        -1 => state.apply_preset(negative, drive_throttle, pivot_throttle),
        1 => state.apply_preset(positive, drive_throttle, pivot_throttle),
        _ => state.release_preset(),
    }
}
