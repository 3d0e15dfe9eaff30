//! # Input Normalizer Module
//!
//! Converts raw signed 16-bit axis samples into integer percentages and applies
//! the stick deadzone.
//!
//! ## Encodings
//!
//! - **Centered** (sticks, d-pad): `raw * 100 / 32767`, truncated toward zero.
//! - **Unidirectional** (triggers): `(raw + 32767) * 100 / 65534`, so a released
//!   trigger reads 0 and a full press reads 100.
//!
//! ## Deadzone
//!
//! Stick values with `|value| <= deadzone` become 0. Values outside the band are
//! passed through unchanged: the cutout is hard, the remaining range is not
//! rescaled. Triggers and d-pad are never filtered.
//!
//! ## Usage
//!
//! ```
//! use woabot::controller::layout::Axis;
//! use woabot::controller::normalizer::InputNormalizer;
//!
//! let normalizer = InputNormalizer::new(20);
//!
//! // Small stick drift is filtered
//! assert_eq!(normalizer.process(Axis::LeftStickX, 3000), 0);
//!
//! // Full trigger press
//! assert_eq!(normalizer.process(Axis::RightTrigger, 32767), 100);
//! ```

use super::layout::{Axis, AxisEncoding};

/// Raw sample magnitude treated as full deflection.
pub const RAW_AXIS_MAX: i32 = 32767;

/// Full-scale normalized percentage.
pub const PERCENT_MAX: i32 = 100;

/// Integer percentage in [-100, 100] (triggers: [0, 100]).
pub type NormalizedAxisValue = i32;

/// Stateless axis normalizer carrying the configured stick deadzone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputNormalizer {
    /// Deadzone in percent (0 to 50).
    deadzone: i32,
}

impl Default for InputNormalizer {
    fn default() -> Self {
        Self { deadzone: 20 }
    }
}

impl InputNormalizer {
    /// Creates a normalizer with the given stick deadzone in percent.
    ///
    /// Values outside 0..=50 are clamped.
    #[must_use]
    pub fn new(deadzone: i32) -> Self {
        Self {
            deadzone: deadzone.clamp(0, 50),
        }
    }

    /// Returns the configured deadzone.
    #[must_use]
    pub fn deadzone(&self) -> i32 {
        self.deadzone
    }

    /// Converts a raw sample to a percentage according to the axis encoding.
    #[must_use]
    pub fn normalize(&self, axis: Axis, raw: i16) -> NormalizedAxisValue {
        let raw = i32::from(raw);
        match axis.encoding() {
            AxisEncoding::Centered => raw * PERCENT_MAX / RAW_AXIS_MAX,
            AxisEncoding::Unidirectional => {
                (raw + RAW_AXIS_MAX) * PERCENT_MAX / (RAW_AXIS_MAX * 2)
            }
        }
    }

    /// Zeroes stick values inside the deadzone band. Other axes pass through.
    #[must_use]
    pub fn apply_deadzone(&self, axis: Axis, value: NormalizedAxisValue) -> NormalizedAxisValue {
        if axis.is_stick() && value.abs() <= self.deadzone {
            0
        } else {
            value
        }
    }

    /// Normalizes and deadzone-filters a raw sample.
    #[must_use]
    pub fn process(&self, axis: Axis, raw: i16) -> NormalizedAxisValue {
        self.apply_deadzone(axis, self.normalize(axis, raw))
    }
}
