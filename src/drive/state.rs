//! # Drive State Module
//!
//! The operator's current intent: per-side power scaling, steering trim,
//! throttle, acceleration mode and the terminate/shutdown requests.
//!
//! One `DriveState` exists per robot and it is only mutated by the event router
//! on the controller thread.

use crate::config::SteeringPolicy;

/// Full power scale for one side.
pub const FULL_POWER: i32 = 100;

/// Which acceleration ramp is pushed to the actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelerationMode {
    #[default]
    Normal,
    Boosted,
}

/// D-Pad preset directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Straight ahead at the d-pad throttle.
    Forward,
    /// Straight back at the d-pad throttle.
    Back,
    /// Spin counter-clockwise in place.
    PivotLeft,
    /// Spin clockwise in place.
    PivotRight,
}

/// Operator intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveState {
    /// Left side power scale, nominally 0..=100; -100 during a pivot.
    pub left_power: i32,
    /// Right side power scale, nominally 0..=100; -100 during a pivot.
    pub right_power: i32,
    /// Persistent steering bias. Positive steers right.
    pub steer_trim: i32,
    /// Forward throttle (right trigger), 0..=100.
    pub throttle_forward: i32,
    /// Reverse throttle (left trigger), 0..=100.
    pub throttle_reverse: i32,
    pub acceleration_mode: AccelerationMode,
    pub boost_held: bool,
    pub afterburner_held: bool,
    pub terminate_requested: bool,
    pub shutdown_requested: bool,
    /// Log every computed target.
    pub debug: bool,
}

impl Default for DriveState {
    fn default() -> Self {
        Self {
            left_power: FULL_POWER,
            right_power: FULL_POWER,
            steer_trim: 0,
            throttle_forward: 0,
            throttle_reverse: 0,
            acceleration_mode: AccelerationMode::Normal,
            boost_held: false,
            afterburner_held: false,
            terminate_requested: false,
            shutdown_requested: false,
            debug: false,
        }
    }
}

impl DriveState {
    /// Creates the startup state: full power both sides, no throttle, no trim.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward minus reverse throttle; zero once termination is requested.
    #[must_use]
    pub fn net_throttle(&self) -> i32 {
        if self.terminate_requested {
            0
        } else {
            self.throttle_forward - self.throttle_reverse
        }
    }

    /// Steers by reducing the inner side's power.
    ///
    /// `value` is the normalized left stick X. Under [`SteeringPolicy::Pivot`] a
    /// full deflection reverses the inner side instead of stopping it.
    pub fn set_power_balance(&mut self, value: i32, policy: SteeringPolicy) {
        let value = value.clamp(-FULL_POWER, FULL_POWER);

        if value == 0 {
            self.left_power = FULL_POWER;
            self.right_power = FULL_POWER;
        } else if value > 0 {
            self.left_power = FULL_POWER;
            self.right_power = match policy {
                SteeringPolicy::Pivot if value >= FULL_POWER => -FULL_POWER,
                _ => FULL_POWER - value,
            };
        } else {
            self.right_power = FULL_POWER;
            self.left_power = match policy {
                SteeringPolicy::Pivot if value <= -FULL_POWER => -FULL_POWER,
                _ => FULL_POWER - value.abs(),
            };
        }
    }

    /// Nudges the steering trim by one step toward the deflected side.
    ///
    /// Only full deflection (±100) counts. Returns true if the trim changed.
    pub fn nudge_trim(&mut self, value: i32, limit: i32) -> bool {
        if value.abs() != FULL_POWER {
            return false;
        }

        let previous = self.steer_trim;
        self.steer_trim = (self.steer_trim + value.signum()).clamp(-limit, limit);
        self.steer_trim != previous
    }

    /// Per-side velocity reduction (percent) derived from the trim: `(left, right)`.
    #[must_use]
    pub fn trim_reduction(&self) -> (i32, i32) {
        if self.steer_trim > 0 {
            (0, self.steer_trim)
        } else {
            (self.steer_trim.abs(), 0)
        }
    }

    /// Clears the steering trim.
    pub fn reset_calibration(&mut self) {
        self.steer_trim = 0;
    }

    /// Returns every drive field to its startup value.
    ///
    /// Terminate and shutdown requests are one-way and survive the reset.
    pub fn reset(&mut self) {
        *self = Self {
            terminate_requested: self.terminate_requested,
            shutdown_requested: self.shutdown_requested,
            debug: self.debug,
            ..Self::default()
        };
    }

    /// Marks termination. Returns true the first time only.
    pub fn request_terminate(&mut self) -> bool {
        let first = !self.terminate_requested;
        self.terminate_requested = true;
        first
    }

    /// Marks termination followed by a host power-off.
    pub fn request_shutdown(&mut self) {
        self.terminate_requested = true;
        self.shutdown_requested = true;
    }

    /// Momentary boost: maximum acceleration while held.
    pub fn set_boost(&mut self, held: bool) {
        self.boost_held = held;
        self.refresh_acceleration_mode();
    }

    /// Momentary afterburner: straight ahead at full throttle and boosted
    /// acceleration while held; throttle drops to zero on release.
    pub fn set_afterburner(&mut self, held: bool) {
        self.afterburner_held = held;
        if held {
            self.left_power = FULL_POWER;
            self.right_power = FULL_POWER;
            self.throttle_reverse = 0;
            self.throttle_forward = FULL_POWER;
        } else {
            self.throttle_forward = 0;
        }
        self.refresh_acceleration_mode();
    }

    /// Applies a d-pad drive or pivot preset.
    pub fn apply_preset(&mut self, preset: Preset, drive_throttle: i32, pivot_throttle: i32) {
        match preset {
            Preset::Forward => {
                self.left_power = FULL_POWER;
                self.right_power = FULL_POWER;
                self.throttle_forward = drive_throttle;
                self.throttle_reverse = 0;
            }
            Preset::Back => {
                self.left_power = FULL_POWER;
                self.right_power = FULL_POWER;
                self.throttle_forward = 0;
                self.throttle_reverse = drive_throttle;
            }
            Preset::PivotLeft => {
                self.left_power = -FULL_POWER;
                self.right_power = FULL_POWER;
                self.throttle_forward = pivot_throttle;
                self.throttle_reverse = 0;
            }
            Preset::PivotRight => {
                self.left_power = FULL_POWER;
                self.right_power = -FULL_POWER;
                self.throttle_forward = pivot_throttle;
                self.throttle_reverse = 0;
            }
        }
    }

    /// Ends a d-pad preset: straight, no throttle.
    pub fn release_preset(&mut self) {
        self.left_power = FULL_POWER;
        self.right_power = FULL_POWER;
        self.throttle_forward = 0;
        self.throttle_reverse = 0;
    }

    fn refresh_acceleration_mode(&mut self) {
        self.acceleration_mode = if self.boost_held || self.afterburner_held {
            AccelerationMode::Boosted
        } else {
            AccelerationMode::Normal
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = DriveState::new();
        assert_eq!(state.left_power, 100);
        assert_eq!(state.right_power, 100);
        assert_eq!(state.steer_trim, 0);
        assert_eq!(state.net_throttle(), 0);
        assert_eq!(state.acceleration_mode, AccelerationMode::Normal);
        assert!(!state.terminate_requested);
        assert!(!state.shutdown_requested);
    }

    // ==================== Throttle Tests ====================

    #[test]
    fn test_net_throttle_range() {
        let mut state = DriveState::new();
        for forward in (0..=100).step_by(5) {
            for reverse in (0..=100).step_by(5) {
                state.throttle_forward = forward;
                state.throttle_reverse = reverse;
                let net = state.net_throttle();
                assert_eq!(net, forward - reverse);
                assert!((-100..=100).contains(&net));
            }
        }
    }

    #[test]
    fn test_net_throttle_zero_after_terminate() {
        let mut state = DriveState::new();
        state.throttle_forward = 80;
        state.request_terminate();
        assert_eq!(state.net_throttle(), 0);
    }

    // ==================== Power Balance Tests ====================

    #[test]
    fn test_power_balance_center() {
        let mut state = DriveState::new();
        state.left_power = 30;
        state.set_power_balance(0, SteeringPolicy::Reduce);
        assert_eq!((state.left_power, state.right_power), (100, 100));
    }

    #[test]
    fn test_power_balance_turn_right() {
        let mut state = DriveState::new();
        state.set_power_balance(50, SteeringPolicy::Reduce);
        assert_eq!((state.left_power, state.right_power), (100, 50));
    }

    #[test]
    fn test_power_balance_turn_left() {
        let mut state = DriveState::new();
        state.set_power_balance(-30, SteeringPolicy::Reduce);
        assert_eq!((state.left_power, state.right_power), (70, 100));
    }

    #[test]
    fn test_power_balance_full_reduce() {
        let mut state = DriveState::new();
        state.set_power_balance(100, SteeringPolicy::Reduce);
        assert_eq!((state.left_power, state.right_power), (100, 0));
    }

    #[test]
    fn test_power_balance_full_pivot() {
        let mut state = DriveState::new();
        state.set_power_balance(100, SteeringPolicy::Pivot);
        assert_eq!((state.left_power, state.right_power), (100, -100));

        state.set_power_balance(-100, SteeringPolicy::Pivot);
        assert_eq!((state.left_power, state.right_power), (-100, 100));

        // Partial deflection behaves like Reduce
        state.set_power_balance(60, SteeringPolicy::Pivot);
        assert_eq!((state.left_power, state.right_power), (100, 40));
    }

    // ==================== Trim Tests ====================

    #[test]
    fn test_nudge_trim_only_at_extremes() {
        let mut state = DriveState::new();
        assert!(!state.nudge_trim(99, 10));
        assert!(!state.nudge_trim(-50, 10));
        assert_eq!(state.steer_trim, 0);

        assert!(state.nudge_trim(100, 10));
        assert_eq!(state.steer_trim, 1);
        assert!(state.nudge_trim(-100, 10));
        assert!(state.nudge_trim(-100, 10));
        assert_eq!(state.steer_trim, -1);
    }

    #[test]
    fn test_nudge_trim_clamps() {
        for limit in [10, 50] {
            let mut state = DriveState::new();
            for _ in 0..(limit * 3) {
                state.nudge_trim(100, limit);
            }
            assert_eq!(state.steer_trim, limit);
            assert!(!state.nudge_trim(100, limit));

            for _ in 0..(limit * 3) {
                state.nudge_trim(-100, limit);
            }
            assert_eq!(state.steer_trim, -limit);
        }
    }

    #[test]
    fn test_trim_reduction() {
        let mut state = DriveState::new();
        assert_eq!(state.trim_reduction(), (0, 0));

        state.steer_trim = 7;
        assert_eq!(state.trim_reduction(), (0, 7));

        state.steer_trim = -4;
        assert_eq!(state.trim_reduction(), (4, 0));
    }

    #[test]
    fn test_reset_calibration() {
        let mut state = DriveState::new();
        state.steer_trim = 9;
        state.throttle_forward = 40;
        state.reset_calibration();
        assert_eq!(state.steer_trim, 0);
        assert_eq!(state.trim_reduction(), (0, 0));
        assert_eq!(state.throttle_forward, 40);
    }

    #[test]
    fn test_full_reset() {
        let mut state = DriveState::new();
        state.steer_trim = -3;
        state.throttle_forward = 40;
        state.throttle_reverse = 10;
        state.set_power_balance(70, SteeringPolicy::Reduce);
        state.set_boost(true);
        state.debug = true;
        state.reset();

        let mut expected = DriveState::new();
        expected.debug = true;
        assert_eq!(state, expected);
    }

    #[test]
    fn test_reset_keeps_terminate() {
        let mut state = DriveState::new();
        state.request_shutdown();
        state.reset();
        assert!(state.terminate_requested);
        assert!(state.shutdown_requested);
    }

    // ==================== Request Tests ====================

    #[test]
    fn test_request_terminate_first_only() {
        let mut state = DriveState::new();
        assert!(state.request_terminate());
        assert!(!state.request_terminate());
        assert!(state.terminate_requested);
        assert!(!state.shutdown_requested);
    }

    #[test]
    fn test_request_shutdown_sets_both() {
        let mut state = DriveState::new();
        state.request_shutdown();
        assert!(state.terminate_requested);
        assert!(state.shutdown_requested);
    }

    // ==================== Boost / Afterburner Tests ====================

    #[test]
    fn test_boost_press_release() {
        let mut state = DriveState::new();
        state.set_boost(true);
        assert_eq!(state.acceleration_mode, AccelerationMode::Boosted);
        state.set_boost(false);
        assert_eq!(state.acceleration_mode, AccelerationMode::Normal);
    }

    #[test]
    fn test_afterburner_press() {
        let mut state = DriveState::new();
        state.set_power_balance(60, SteeringPolicy::Reduce);
        state.throttle_reverse = 30;
        state.set_afterburner(true);

        assert_eq!((state.left_power, state.right_power), (100, 100));
        assert_eq!(state.throttle_forward, 100);
        assert_eq!(state.throttle_reverse, 0);
        assert_eq!(state.acceleration_mode, AccelerationMode::Boosted);
    }

    #[test]
    fn test_afterburner_release() {
        let mut state = DriveState::new();
        state.set_afterburner(true);
        state.set_afterburner(false);
        assert_eq!(state.throttle_forward, 0);
        assert_eq!(state.acceleration_mode, AccelerationMode::Normal);
    }

    #[test]
    fn test_afterburner_release_keeps_boost_if_held() {
        let mut state = DriveState::new();
        state.set_boost(true);
        state.set_afterburner(true);
        state.set_afterburner(false);
        assert_eq!(state.acceleration_mode, AccelerationMode::Boosted);
    }

    // ==================== Preset Tests ====================

    #[test]
    fn test_preset_forward_and_back() {
        let mut state = DriveState::new();
        state.set_power_balance(40, SteeringPolicy::Reduce);
        state.apply_preset(Preset::Forward, 90, 50);
        assert_eq!((state.left_power, state.right_power), (100, 100));
        assert_eq!(state.net_throttle(), 90);

        state.apply_preset(Preset::Back, 90, 50);
        assert_eq!(state.net_throttle(), -90);
    }

    #[test]
    fn test_preset_pivots() {
        let mut state = DriveState::new();
        state.apply_preset(Preset::PivotLeft, 90, 50);
        assert_eq!((state.left_power, state.right_power), (-100, 100));
        assert_eq!(state.net_throttle(), 50);

        state.apply_preset(Preset::PivotRight, 90, 50);
        assert_eq!((state.left_power, state.right_power), (100, -100));
    }

    #[test]
    fn test_release_preset() {
        let mut state = DriveState::new();
        state.apply_preset(Preset::PivotLeft, 90, 50);
        state.release_preset();
        assert_eq!((state.left_power, state.right_power), (100, 100));
        assert_eq!(state.net_throttle(), 0);
    }
}
