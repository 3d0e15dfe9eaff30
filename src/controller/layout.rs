//! # Controller Layout Module
//!
//! Logical identities for every control on the pad, and the table that maps the
//! joystick API's numeric axis/button numbers onto them.
//!
//! ## Default Layout (Xbox 360, `xpad` driver)
//!
//! | Number | Axis | Button |
//! |--------|------|--------|
//! | 0 | Left Stick X | A |
//! | 1 | Left Stick Y | B |
//! | 2 | Left Trigger | X |
//! | 3 | Right Stick X | Y |
//! | 4 | Right Stick Y | Left Bumper |
//! | 5 | Right Trigger | Right Bumper |
//! | 6 | D-Pad X | Back |
//! | 7 | D-Pad Y | Start |
//! | 8 | | Guide |
//! | 9 | | Left Stick Click |
//! | 10 | | Right Stick Click |
//! | 11-14 | | D-Pad Left / Right / Up / Down |
//!
//! ## Usage
//!
//! ```
//! use woabot::controller::layout::{Axis, Control, ControllerLayout, EventKind};
//!
//! let layout = ControllerLayout::xbox360();
//! assert_eq!(layout.resolve(EventKind::Axis, 5), Some(Control::Axis(Axis::RightTrigger)));
//! assert_eq!(layout.resolve(EventKind::Axis, 42), None);
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Analog axes on the pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Left stick horizontal. Power balance.
    LeftStickX,
    /// Left stick vertical.
    LeftStickY,
    /// Left trigger. Reverse throttle.
    LeftTrigger,
    /// Right stick horizontal. Steering trim.
    RightStickX,
    /// Right stick vertical.
    RightStickY,
    /// Right trigger. Forward throttle.
    RightTrigger,
    /// D-Pad horizontal (-full = left, +full = right).
    DPadX,
    /// D-Pad vertical (-full = up, +full = down).
    DPadY,
}

/// How an axis encodes its raw signed 16-bit sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisEncoding {
    /// Symmetric around zero (sticks, d-pad).
    Centered,
    /// Rest at the negative end, full press at the positive end (triggers).
    Unidirectional,
}

impl Axis {
    /// Returns the raw encoding used by this axis.
    #[must_use]
    pub fn encoding(self) -> AxisEncoding {
        match self {
            Axis::LeftTrigger | Axis::RightTrigger => AxisEncoding::Unidirectional,
            _ => AxisEncoding::Centered,
        }
    }

    /// Returns true for analog stick axes, the only axes subject to deadzone filtering.
    #[must_use]
    pub fn is_stick(self) -> bool {
        matches!(
            self,
            Axis::LeftStickX | Axis::LeftStickY | Axis::RightStickX | Axis::RightStickY
        )
    }
}

/// Digital buttons on the pad.
///
/// Deserializes from snake_case names so button bindings can be written in the
/// config file (`boost = "a"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    Back,
    Start,
    Guide,
    LeftThumb,
    RightThumb,
    DPadLeft,
    DPadRight,
    DPadUp,
    DPadDown,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::LeftBumper => "LB",
            Button::RightBumper => "RB",
            Button::Back => "Back",
            Button::Start => "Start",
            Button::Guide => "Guide",
            Button::LeftThumb => "LS",
            Button::RightThumb => "RS",
            Button::DPadLeft => "D-Pad Left",
            Button::DPadRight => "D-Pad Right",
            Button::DPadUp => "D-Pad Up",
            Button::DPadDown => "D-Pad Down",
        };
        f.write_str(name)
    }
}

/// Logical identity of a control, independent of the device's numeric layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Axis(Axis),
    Button(Button),
}

/// Event class reported by the input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Axis,
    Button,
}

/// A single input sample resolved to its logical control.
///
/// `value` is the raw signed 16-bit sample for axes and 0/1 for buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub control: Control,
    pub value: i16,
}

impl InputEvent {
    /// Creates an axis sample.
    #[must_use]
    pub fn axis(axis: Axis, value: i16) -> Self {
        Self {
            control: Control::Axis(axis),
            value,
        }
    }

    /// Creates a button sample (`pressed` maps to 1, released to 0).
    #[must_use]
    pub fn button(button: Button, pressed: bool) -> Self {
        Self {
            control: Control::Button(button),
            value: i16::from(pressed),
        }
    }
}

/// Lookup table from `(kind, number)` to logical control.
#[derive(Debug, Clone)]
pub struct ControllerLayout {
    table: HashMap<(EventKind, u8), Control>,
}

impl Default for ControllerLayout {
    fn default() -> Self {
        Self::xbox360()
    }
}

impl ControllerLayout {
    /// Layout reported by the `xpad` driver for a wired Xbox 360 pad.
    #[must_use]
    pub fn xbox360() -> Self {
        let axes = [
            Axis::LeftStickX,
            Axis::LeftStickY,
            Axis::LeftTrigger,
            Axis::RightStickX,
            Axis::RightStickY,
            Axis::RightTrigger,
            Axis::DPadX,
            Axis::DPadY,
        ];
        let buttons: [(u8, Button); 15] = [
            (0, Button::A),
            (1, Button::B),
            (2, Button::X),
            (3, Button::Y),
            (4, Button::LeftBumper),
            (5, Button::RightBumper),
            (6, Button::Back),
            (7, Button::Start),
            (8, Button::Guide),
            (9, Button::LeftThumb),
            (10, Button::RightThumb),
            (11, Button::DPadLeft),
            (12, Button::DPadRight),
            (13, Button::DPadUp),
            (14, Button::DPadDown),
        ];

        let mut table = HashMap::new();
        for (number, axis) in axes.into_iter().enumerate() {
            table.insert((EventKind::Axis, number as u8), Control::Axis(axis));
        }
        for (number, button) in buttons {
            table.insert((EventKind::Button, number), Control::Button(button));
        }
        Self { table }
    }

    /// Overrides (or adds) a single entry.
    pub fn bind(&mut self, kind: EventKind, number: u8, control: Control) {
        self.table.insert((kind, number), control);
    }

    /// Resolves a device number to its logical control, if the layout knows it.
    #[must_use]
    pub fn resolve(&self, kind: EventKind, number: u8) -> Option<Control> {
        self.table.get(&(kind, number)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xbox360_axes() {
        let layout = ControllerLayout::xbox360();
        assert_eq!(layout.resolve(EventKind::Axis, 0), Some(Control::Axis(Axis::LeftStickX)));
        assert_eq!(layout.resolve(EventKind::Axis, 2), Some(Control::Axis(Axis::LeftTrigger)));
        assert_eq!(layout.resolve(EventKind::Axis, 3), Some(Control::Axis(Axis::RightStickX)));
        assert_eq!(layout.resolve(EventKind::Axis, 5), Some(Control::Axis(Axis::RightTrigger)));
        assert_eq!(layout.resolve(EventKind::Axis, 7), Some(Control::Axis(Axis::DPadY)));
    }

    #[test]
    fn test_xbox360_buttons() {
        let layout = ControllerLayout::xbox360();
        assert_eq!(layout.resolve(EventKind::Button, 0), Some(Control::Button(Button::A)));
        assert_eq!(layout.resolve(EventKind::Button, 8), Some(Control::Button(Button::Guide)));
        assert_eq!(layout.resolve(EventKind::Button, 14), Some(Control::Button(Button::DPadDown)));
    }

    #[test]
    fn test_unknown_numbers_unresolved() {
        let layout = ControllerLayout::xbox360();
        assert_eq!(layout.resolve(EventKind::Axis, 8), None);
        assert_eq!(layout.resolve(EventKind::Button, 15), None);
    }

    #[test]
    fn test_axis_and_button_numbers_are_separate() {
        let layout = ControllerLayout::xbox360();
        assert_ne!(
            layout.resolve(EventKind::Axis, 1),
            layout.resolve(EventKind::Button, 1)
        );
    }

    #[test]
    fn test_bind_overrides_entry() {
        let mut layout = ControllerLayout::xbox360();
        layout.bind(EventKind::Button, 0, Control::Button(Button::Start));
        assert_eq!(layout.resolve(EventKind::Button, 0), Some(Control::Button(Button::Start)));
    }

    #[test]
    fn test_axis_encoding() {
        assert_eq!(Axis::LeftTrigger.encoding(), AxisEncoding::Unidirectional);
        assert_eq!(Axis::RightTrigger.encoding(), AxisEncoding::Unidirectional);
        assert_eq!(Axis::LeftStickX.encoding(), AxisEncoding::Centered);
        assert_eq!(Axis::DPadX.encoding(), AxisEncoding::Centered);
    }

    #[test]
    fn test_only_sticks_are_sticks() {
        assert!(Axis::RightStickX.is_stick());
        assert!(!Axis::DPadY.is_stick());
        assert!(!Axis::RightTrigger.is_stick());
    }

    #[test]
    fn test_button_event_values() {
        assert_eq!(InputEvent::button(Button::A, true).value, 1);
        assert_eq!(InputEvent::button(Button::A, false).value, 0);
    }

    #[test]
    fn test_button_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            button: Button,
        }
        let parsed: Wrapper = toml::from_str("button = \"right_bumper\"").unwrap();
        assert_eq!(parsed.button, Button::RightBumper);
    }
}
