//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at all)
//! yields a working configuration for a wired Xbox 360 pad on `/dev/input/js0`.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::controller::layout::Button;
use crate::error::{Result, WoabotError};

/// Default joystick API device node.
pub const DEFAULT_JOYDEV_PATH: &str = "/dev/input/js0";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub bindings: BindingsConfig,
    #[serde(default)]
    pub motors: MotorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// Input device backend
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControllerBackend {
    /// Linux joystick API (`/dev/input/js*`)
    #[default]
    Joydev,
    /// Linux evdev (`/dev/input/event*`)
    Evdev,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    #[serde(default)]
    pub backend: ControllerBackend,

    /// Device node. `None` means `/dev/input/js0` for joydev, auto-detect for evdev.
    #[serde(default)]
    pub device_path: Option<String>,

    #[serde(default = "default_deadzone")]
    pub deadzone: i32,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Longest wait for an input event before the terminate flag is re-checked.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Behavior of full steering deflection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SteeringPolicy {
    /// Full deflection stops the inner side.
    #[default]
    Reduce,
    /// Full deflection reverses the inner side (spin in place).
    Pivot,
}

/// Drive mixing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_trim_limit")]
    pub trim_limit: i32,

    #[serde(default)]
    pub steering: SteeringPolicy,

    #[serde(default = "default_stepped_velocity")]
    pub stepped_velocity: bool,

    #[serde(default = "default_dpad_throttle")]
    pub dpad_throttle: i32,

    #[serde(default = "default_pivot_throttle")]
    pub pivot_throttle: i32,
}

/// Button-to-action bindings
#[derive(Debug, Deserialize, Clone)]
pub struct BindingsConfig {
    #[serde(default = "default_boost_button")]
    pub boost: Button,

    #[serde(default = "default_afterburner_button")]
    pub afterburner: Button,

    #[serde(default = "default_calibration_reset_button")]
    pub calibration_reset: Button,

    #[serde(default = "default_full_reset_button")]
    pub full_reset: Button,

    #[serde(default = "default_terminate_button")]
    pub terminate: Button,

    #[serde(default = "default_shutdown_button")]
    pub shutdown: Button,

    #[serde(default = "default_debug_button")]
    pub debug: Button,
}

/// Where actuator commands are issued from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// A dedicated motor-sync thread polls the latest targets.
    #[default]
    Threaded,
    /// The controller thread commands the motors after every event.
    Inline,
}

/// Motor controller backend
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotorBackend {
    /// Phidget22 DC motor channels (requires the `phidget` feature).
    #[default]
    Phidget,
    /// In-process motors; nothing physical moves.
    Simulated,
}

/// Motor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    #[serde(default)]
    pub backend: MotorBackend,

    /// Shared library providing the Phidget22 API.
    #[serde(default = "default_phidget_library")]
    pub phidget_library: String,

    #[serde(default)]
    pub mode: DispatchMode,

    #[serde(default = "default_left_channel")]
    pub left_channel: u32,

    #[serde(default = "default_right_channel")]
    pub right_channel: u32,

    #[serde(default = "default_attach_timeout_ms")]
    pub attach_timeout_ms: u64,

    #[serde(default = "default_attach_retry_interval_ms")]
    pub attach_retry_interval_ms: u64,

    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Upper bound on velocity command attempts. `None` retries until terminate.
    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    #[serde(default = "default_normal_acceleration")]
    pub normal_acceleration: f64,

    #[serde(default = "default_boost_acceleration")]
    pub boost_acceleration: f64,

    #[serde(default = "default_simulated_max_acceleration")]
    pub simulated_max_acceleration: f64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Host integration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    #[serde(default = "default_power_off_command")]
    pub power_off_command: Vec<String>,
}

// Default value functions
fn default_deadzone() -> i32 { 20 }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_poll_interval_ms() -> u64 { 100 }

fn default_trim_limit() -> i32 { 50 }
fn default_stepped_velocity() -> bool { true }
fn default_dpad_throttle() -> i32 { 100 }
fn default_pivot_throttle() -> i32 { 50 }

fn default_boost_button() -> Button { Button::A }
fn default_afterburner_button() -> Button { Button::RightBumper }
fn default_calibration_reset_button() -> Button { Button::B }
fn default_full_reset_button() -> Button { Button::Back }
fn default_terminate_button() -> Button { Button::X }
fn default_shutdown_button() -> Button { Button::Guide }
fn default_debug_button() -> Button { Button::Y }

fn default_phidget_library() -> String { "libphidget22.so.0".to_string() }
fn default_left_channel() -> u32 { 0 }
fn default_right_channel() -> u32 { 1 }
fn default_attach_timeout_ms() -> u64 { 5000 }
fn default_attach_retry_interval_ms() -> u64 { 1000 }
fn default_retry_interval_ms() -> u64 { 10 }
fn default_sync_interval_ms() -> u64 { 10 }
fn default_normal_acceleration() -> f64 { 0.5 }
fn default_boost_acceleration() -> f64 { 1.0 }
fn default_simulated_max_acceleration() -> f64 { 100.0 }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_file_prefix() -> String { "woabot.log".to_string() }
fn default_log_level() -> String { "info".to_string() }

fn default_power_off_command() -> Vec<String> {
    vec!["systemctl".to_string(), "poweroff".to_string()]
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backend: ControllerBackend::default(),
            device_path: None,
            deadzone: default_deadzone(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            trim_limit: default_trim_limit(),
            steering: SteeringPolicy::default(),
            stepped_velocity: default_stepped_velocity(),
            dpad_throttle: default_dpad_throttle(),
            pivot_throttle: default_pivot_throttle(),
        }
    }
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            boost: default_boost_button(),
            afterburner: default_afterburner_button(),
            calibration_reset: default_calibration_reset_button(),
            full_reset: default_full_reset_button(),
            terminate: default_terminate_button(),
            shutdown: default_shutdown_button(),
            debug: default_debug_button(),
        }
    }
}

impl BindingsConfig {
    /// Every action with its bound button, in declaration order.
    #[must_use]
    pub fn all(&self) -> [(&'static str, Button); 7] {
        [
            ("boost", self.boost),
            ("afterburner", self.afterburner),
            ("calibration_reset", self.calibration_reset),
            ("full_reset", self.full_reset),
            ("terminate", self.terminate),
            ("shutdown", self.shutdown),
            ("debug", self.debug),
        ]
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            backend: MotorBackend::default(),
            phidget_library: default_phidget_library(),
            mode: DispatchMode::default(),
            left_channel: default_left_channel(),
            right_channel: default_right_channel(),
            attach_timeout_ms: default_attach_timeout_ms(),
            attach_retry_interval_ms: default_attach_retry_interval_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_retries: None,
            sync_interval_ms: default_sync_interval_ms(),
            normal_acceleration: default_normal_acceleration(),
            boost_acceleration: default_boost_acceleration(),
            simulated_max_acceleration: default_simulated_max_acceleration(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            level: default_log_level(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            power_off_command: default_power_off_command(),
        }
    }
}

impl ControllerConfig {
    /// Interval between attempts to open the input device.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl MotorConfig {
    /// Per-attempt attach timeout handed to the actuator.
    #[must_use]
    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }

    /// Pause between failed attach attempts.
    #[must_use]
    pub fn attach_retry_interval(&self) -> Duration {
        Duration::from_millis(self.attach_retry_interval_ms)
    }

    /// Pause between failed velocity command attempts.
    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Motor-sync polling period.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use woabot::config::Config;
    ///
    /// let config = Config::load("config/woabot.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Controller
        if self.controller.deadzone < 0 || self.controller.deadzone > 50 {
            return Err(invalid("deadzone must be between 0 and 50"));
        }

        if matches!(self.controller.device_path.as_deref(), Some("")) {
            return Err(invalid("device_path cannot be empty (omit it to use the default)"));
        }

        if self.controller.reconnect_interval_ms == 0 || self.controller.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.controller.poll_interval_ms == 0 || self.controller.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        // Drive
        if self.drive.trim_limit < 1 || self.drive.trim_limit > 100 {
            return Err(invalid("trim_limit must be between 1 and 100"));
        }

        for (name, value) in [
            ("dpad_throttle", self.drive.dpad_throttle),
            ("pivot_throttle", self.drive.pivot_throttle),
        ] {
            if !(0..=100).contains(&value) {
                return Err(invalid(format!("{} must be between 0 and 100", name)));
            }
        }

        // Bindings
        let bound = self.bindings.all();
        for (i, (name, button)) in bound.iter().enumerate() {
            if let Some((other, _)) = bound[i + 1..].iter().find(|(_, b)| b == button) {
                return Err(invalid(format!("{} and {} are both bound to {}", name, other, button)));
            }
        }

        // Motors
        if self.motors.backend == MotorBackend::Phidget && self.motors.phidget_library.is_empty() {
            return Err(invalid("phidget_library cannot be empty"));
        }

        if self.motors.left_channel == self.motors.right_channel {
            return Err(invalid("left_channel and right_channel must differ"));
        }

        if self.motors.attach_timeout_ms == 0 || self.motors.attach_timeout_ms > 60000 {
            return Err(invalid("attach_timeout_ms must be between 1 and 60000"));
        }

        if self.motors.attach_retry_interval_ms == 0 || self.motors.attach_retry_interval_ms > 60000 {
            return Err(invalid("attach_retry_interval_ms must be between 1 and 60000"));
        }

        if self.motors.retry_interval_ms > 10000 {
            return Err(invalid("retry_interval_ms must be at most 10000"));
        }

        if self.motors.max_retries == Some(0) {
            return Err(invalid("max_retries must be greater than 0 (omit it to retry until terminate)"));
        }

        if self.motors.sync_interval_ms == 0 || self.motors.sync_interval_ms > 1000 {
            return Err(invalid("sync_interval_ms must be between 1 and 1000"));
        }

        for (name, value) in [
            ("normal_acceleration", self.motors.normal_acceleration),
            ("boost_acceleration", self.motors.boost_acceleration),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(format!("{} must be in (0.0, 1.0]", name)));
            }
        }

        if !(self.motors.simulated_max_acceleration > 0.0) {
            return Err(invalid("simulated_max_acceleration must be greater than 0"));
        }

        // Logging
        if self.logging.log_dir.is_empty() {
            return Err(invalid("log_dir cannot be empty"));
        }

        if self.logging.file_prefix.is_empty() {
            return Err(invalid("file_prefix cannot be empty"));
        }

        // Host
        if self.host.power_off_command.first().map_or(true, |program| program.is_empty()) {
            return Err(invalid("power_off_command must name a program"));
        }

        Ok(())
    }
}

fn invalid(message: impl std::fmt::Display) -> WoabotError {
    WoabotError::Config(toml::de::Error::custom(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.controller.backend, ControllerBackend::Joydev);
        assert_eq!(config.controller.deadzone, 20);
        assert_eq!(config.drive.trim_limit, 50);
        assert_eq!(config.drive.steering, SteeringPolicy::Reduce);
        assert_eq!(config.motors.mode, DispatchMode::Threaded);
        assert_eq!(config.motors.backend, MotorBackend::Phidget);
        assert_eq!(config.motors.max_retries, None);
        assert_eq!(config.bindings.terminate, Button::X);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[controller]
backend = "evdev"
deadzone = 10

[drive]
trim_limit = 10
steering = "pivot"
stepped_velocity = false

[bindings]
boost = "left_bumper"

[motors]
backend = "simulated"
mode = "inline"
max_retries = 50
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.controller.backend, ControllerBackend::Evdev);
        assert_eq!(config.controller.deadzone, 10);
        assert_eq!(config.drive.trim_limit, 10);
        assert_eq!(config.drive.steering, SteeringPolicy::Pivot);
        assert!(!config.drive.stepped_velocity);
        assert_eq!(config.bindings.boost, Button::LeftBumper);
        assert_eq!(config.bindings.afterburner, Button::RightBumper);
        assert_eq!(config.motors.backend, MotorBackend::Simulated);
        assert_eq!(config.motors.mode, DispatchMode::Inline);
        assert_eq!(config.motors.max_retries, Some(50));
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/woabot.toml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();
        assert_eq!(config.controller.deadzone, defaults.controller.deadzone);
        assert_eq!(config.drive.trim_limit, defaults.drive.trim_limit);
        assert_eq!(config.bindings.all(), defaults.bindings.all());
        assert_eq!(config.controller.poll_interval_ms, defaults.controller.poll_interval_ms);
        assert_eq!(config.motors.backend, defaults.motors.backend);
        assert_eq!(config.motors.phidget_library, defaults.motors.phidget_library);
        assert_eq!(config.motors.retry_interval_ms, defaults.motors.retry_interval_ms);
        assert_eq!(config.motors.max_retries, None);
        assert_eq!(config.host.power_off_command, defaults.host.power_off_command);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/woabot.toml");
        assert!(matches!(result, Err(WoabotError::Io(_))));
    }

    #[test]
    fn test_unknown_button_rejected() {
        let result = Config::from_toml("[bindings]\nboost = \"turbo\"\n");
        assert!(matches!(result, Err(WoabotError::Config(_))));
    }

    #[test]
    fn test_deadzone_out_of_range() {
        let mut config = Config::default();
        config.controller.deadzone = 51;
        assert!(config.validate().is_err());

        config.controller.deadzone = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_device_path() {
        let mut config = Config::default();
        config.controller.device_path = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_interval_zero() {
        let mut config = Config::default();
        config.controller.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trim_limit_bounds() {
        let mut config = Config::default();
        config.drive.trim_limit = 0;
        assert!(config.validate().is_err());

        config.drive.trim_limit = 101;
        assert!(config.validate().is_err());

        config.drive.trim_limit = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_preset_throttle_bounds() {
        let mut config = Config::default();
        config.drive.dpad_throttle = 120;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.drive.pivot_throttle = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_motor_channels() {
        let mut config = Config::default();
        config.motors.right_channel = config.motors.left_channel;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_interval_allowed() {
        let mut config = Config::default();
        config.motors.retry_interval_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_retries_zero() {
        let mut config = Config::default();
        config.motors.max_retries = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sync_interval_bounds() {
        let mut config = Config::default();
        config.motors.sync_interval_ms = 0;
        assert!(config.validate().is_err());

        config.motors.sync_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_acceleration_ratio_bounds() {
        let mut config = Config::default();
        config.motors.normal_acceleration = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.motors.boost_acceleration = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.motors.boost_acceleration = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir() {
        let mut config = Config::default();
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_power_off_command() {
        let mut config = Config::default();
        config.host.power_off_command = vec![];
        assert!(config.validate().is_err());

        config.host.power_off_command = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let result = Config::from_toml("[bindings]\nterminate = \"y\"\n");
        let message = result.unwrap_err().to_string();
        assert!(message.contains("terminate"));
        assert!(message.contains("debug"));
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut config = Config::default();
        config.controller.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.controller.poll_interval_ms = 1001;
        assert!(config.validate().is_err());

        config.controller.poll_interval_ms = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_phidget_library() {
        let mut config = Config::default();
        config.motors.phidget_library = String::new();
        assert!(config.validate().is_err());

        config.motors.backend = MotorBackend::Simulated;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::default();
        assert_eq!(config.controller.reconnect_interval(), Duration::from_millis(1000));
        assert_eq!(config.controller.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.motors.attach_timeout(), Duration::from_millis(5000));
        assert_eq!(config.motors.retry_interval(), Duration::from_millis(10));
        assert_eq!(config.motors.sync_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_deadzone(), 20);
        assert_eq!(default_trim_limit(), 50);
        assert!(default_stepped_velocity());
        assert_eq!(default_dpad_throttle(), 100);
        assert_eq!(default_pivot_throttle(), 50);
        assert_eq!(default_left_channel(), 0);
        assert_eq!(default_right_channel(), 1);
        assert_eq!(default_normal_acceleration(), 0.5);
        assert_eq!(default_boost_acceleration(), 1.0);
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_power_off_command(), vec!["systemctl", "poweroff"]);
    }
}
