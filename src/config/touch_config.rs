//! Touch Configuration - gesture thresholds, transports and action bindings
//!
//! Every tunable the listener uses lives here. Each struct implements
//! `Default` with the values the strip was originally tuned with, so running
//! without a config file behaves exactly like the stock device.

use super::defaults;
use crate::actions::BuiltinAction;
use crate::gesture::ZoneThresholds;
use crate::types::{BindingKey, Zone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "TOUCHSTRIP_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "touchstrip.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `TouchConfig::load()` which searches:
/// 1. An explicit path (`--config`)
/// 2. `$TOUCHSTRIP_CONFIG`
/// 3. `./touchstrip.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TouchConfig {
    /// Press / hold / release classification
    #[serde(default)]
    pub gesture: GestureConfig,

    /// Sampling assumptions shared by every source
    #[serde(default)]
    pub source: SourceConfig,

    /// Serial (UART) transport
    #[serde(default)]
    pub serial: SerialConfig,

    /// TCP line-stream transport
    #[serde(default)]
    pub tcp: TcpConfig,

    /// Volume stepping for the built-in volume actions
    #[serde(default)]
    pub volume: VolumeConfig,

    /// Gesture → action bindings
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl TouchConfig {
    /// Load configuration using the standard search order.
    ///
    /// Unlike a missing file, a file that exists but fails to parse or
    /// validate is an error: bad thresholds must stop startup.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            let config = Self::load_from_file(path)?;
            info!(path = %path.display(), "Loaded touch config");
            return Ok(config);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded touch config from {}", CONFIG_ENV_VAR);
                return Ok(config);
            }
            warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded touch config from ./{}", LOCAL_CONFIG_FILE);
            return Ok(config);
        }

        info!("No {} found — using built-in defaults", LOCAL_CONFIG_FILE);
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate TOML text.
    ///
    /// Two passes: unknown keys are reported as warnings, then serde fills in
    /// defaults and `validate()` enforces the threshold ordering.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;

        for w in super::validation::suspicious_values(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate thresholds and durations for internal consistency.
    ///
    /// Rules:
    /// - `activate_threshold > 0 > deactivate_threshold`
    /// - `red_pos_threshold > blue_pos_threshold`
    /// - all thresholds finite
    /// - hold window and sample interval positive, interval shorter than window
    /// - gap warning (`factor * interval`) fits in a `Duration`
    /// - `volume.min <= volume.start <= volume.max <= 100`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.gesture;
        let mut errors: Vec<String> = Vec::new();

        let thresholds = [
            ("gesture.activate_threshold", g.activate_threshold),
            ("gesture.deactivate_threshold", g.deactivate_threshold),
            ("gesture.red_pos_threshold", g.red_pos_threshold),
            ("gesture.blue_pos_threshold", g.blue_pos_threshold),
        ];
        let all_finite = thresholds.iter().all(|(_, v)| v.is_finite());
        for (name, value) in thresholds {
            if !value.is_finite() {
                errors.push(format!("{name}: value must be finite (got {value})"));
            }
        }

        if all_finite {
            if g.activate_threshold <= 0.0 {
                errors.push(format!(
                    "gesture.activate_threshold ({:.3}) must be > 0",
                    g.activate_threshold
                ));
            }
            if g.deactivate_threshold >= 0.0 {
                errors.push(format!(
                    "gesture.deactivate_threshold ({:.3}) must be < 0",
                    g.deactivate_threshold
                ));
            }
            if g.red_pos_threshold <= g.blue_pos_threshold {
                errors.push(format!(
                    "gesture.red_pos_threshold ({:.3}) must be > blue_pos_threshold ({:.3})",
                    g.red_pos_threshold, g.blue_pos_threshold
                ));
            }
        }

        if g.hold_window_ms == 0 {
            errors.push("gesture.hold_window_ms must be > 0".to_string());
        }
        if self.source.nominal_sample_interval_ms == 0 {
            errors.push("source.nominal_sample_interval_ms must be > 0".to_string());
        } else if self.source.nominal_sample_interval_ms >= g.hold_window_ms {
            errors.push(format!(
                "source.nominal_sample_interval_ms ({}) must be shorter than gesture.hold_window_ms ({})",
                self.source.nominal_sample_interval_ms, g.hold_window_ms
            ));
        }
        if self.source.gap_warning_factor > 0 && self.source.gap_warning().is_none() {
            errors.push(format!(
                "source.gap_warning_factor ({}) * nominal_sample_interval_ms ({}) overflows",
                self.source.gap_warning_factor, self.source.nominal_sample_interval_ms
            ));
        }

        let v = &self.volume;
        if v.max > 100 {
            errors.push(format!("volume.max ({}) must be <= 100", v.max));
        }
        if v.min > v.max {
            errors.push(format!("volume.min ({}) must be <= volume.max ({})", v.min, v.max));
        } else if v.start < v.min || v.start > v.max {
            errors.push(format!(
                "volume.start ({}) must be within {}..={}",
                v.start, v.min, v.max
            ));
        }
        if v.step == 0 {
            errors.push("volume.step must be > 0".to_string());
        }

        if self.actions.command_timeout_ms == 0 {
            errors.push("actions.command_timeout_ms must be > 0".to_string());
        }
        let all_keys = BindingKey::REQUIRED
            .into_iter()
            .chain(std::iter::once(BindingKey::Hold(Zone::Center)));
        for key in all_keys {
            if let Some(binding) = self.actions.binding(key) {
                if binding.command.first().is_some_and(|p| p.trim().is_empty()) {
                    errors.push(format!("actions.{key}.command: program name is empty"));
                }
            }
        }

        if self.serial.baud == 0 {
            errors.push("serial.baud must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Gesture Config
// ============================================================================

/// Hysteresis thresholds and hold timing for the gesture classifier.
///
/// The activate/deactivate pair is asymmetric around zero so noise near a
/// single crossing cannot chatter between press and release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Highpass sum above which an idle strip becomes pressed.
    #[serde(default = "default_activate_threshold")]
    pub activate_threshold: f64,

    /// Highpass sum below which a pressed strip is released.
    #[serde(default = "default_deactivate_threshold")]
    pub deactivate_threshold: f64,

    /// Position above this resolves to the left (red) zone.
    #[serde(default = "default_red_pos_threshold")]
    pub red_pos_threshold: f64,

    /// Position below this resolves to the right (blue) zone.
    #[serde(default = "default_blue_pos_threshold")]
    pub blue_pos_threshold: f64,

    /// Time after press detection at which an open press becomes a hold (ms).
    #[serde(default = "default_hold_window_ms")]
    pub hold_window_ms: u64,
}

fn default_activate_threshold() -> f64 { defaults::ACTIVATE_THRESHOLD }
fn default_deactivate_threshold() -> f64 { defaults::DEACTIVATE_THRESHOLD }
fn default_red_pos_threshold() -> f64 { defaults::RED_POS_THRESHOLD }
fn default_blue_pos_threshold() -> f64 { defaults::BLUE_POS_THRESHOLD }
fn default_hold_window_ms() -> u64 { defaults::HOLD_WINDOW_MS }

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            activate_threshold: default_activate_threshold(),
            deactivate_threshold: default_deactivate_threshold(),
            red_pos_threshold: default_red_pos_threshold(),
            blue_pos_threshold: default_blue_pos_threshold(),
            hold_window_ms: default_hold_window_ms(),
        }
    }
}

impl GestureConfig {
    pub fn hold_window(&self) -> Duration {
        Duration::from_millis(self.hold_window_ms)
    }

    pub fn zone_thresholds(&self) -> ZoneThresholds {
        ZoneThresholds {
            red_pos: self.red_pos_threshold,
            blue_pos: self.blue_pos_threshold,
        }
    }
}

// ============================================================================
// Source Config
// ============================================================================

/// Sampling assumptions. Hold latency is one sample interval at best, since
/// holds are only noticed when the next frame arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub nominal_sample_interval_ms: u64,
    pub gap_warning_factor: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            nominal_sample_interval_ms: defaults::NOMINAL_SAMPLE_INTERVAL_MS,
            gap_warning_factor: defaults::GAP_WARNING_FACTOR,
        }
    }
}

impl SourceConfig {
    pub fn nominal_sample_interval(&self) -> Duration {
        Duration::from_millis(self.nominal_sample_interval_ms)
    }

    /// Gap beyond which an open press is reported as stalled. `None` when
    /// the factor is 0 (warnings disabled).
    pub fn gap_warning(&self) -> Option<Duration> {
        if self.gap_warning_factor == 0 {
            return None;
        }
        self.nominal_sample_interval().checked_mul(self.gap_warning_factor)
    }
}

// ============================================================================
// Transport Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    pub read_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
    /// 0 retries forever.
    pub max_connect_attempts: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: defaults::SERIAL_PORT.to_string(),
            baud: defaults::SERIAL_BAUD,
            read_timeout_ms: defaults::SERIAL_READ_TIMEOUT_MS,
            reconnect_delay_ms: defaults::SERIAL_RECONNECT_DELAY_MS,
            max_connect_attempts: defaults::SERIAL_MAX_CONNECT_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_reconnect_attempts: u32,
    pub initial_reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: defaults::TCP_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: defaults::TCP_READ_TIMEOUT_SECS,
            max_reconnect_attempts: defaults::TCP_MAX_RECONNECT_ATTEMPTS,
            initial_reconnect_delay_secs: defaults::TCP_INITIAL_RECONNECT_DELAY_SECS,
            max_reconnect_delay_secs: defaults::TCP_MAX_RECONNECT_DELAY_SECS,
        }
    }
}

// ============================================================================
// Action Config
// ============================================================================

/// Volume bounds for `volume_up` / `volume_down` (percent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub start: u8,
    pub step: u8,
    pub min: u8,
    pub max: u8,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            start: defaults::START_VOLUME,
            step: defaults::VOLUME_STEP,
            min: defaults::MIN_VOLUME,
            max: defaults::MAX_VOLUME,
        }
    }
}

/// One gesture binding: a built-in state update plus an optional external
/// command run afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub action: BuiltinAction,

    /// Program and arguments. `{volume}`, `{playing}` and `{gesture}` are
    /// substituted before spawning.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

impl BindingConfig {
    pub fn builtin(action: BuiltinAction) -> Self {
        Self {
            action,
            command: Vec::new(),
        }
    }
}

/// Gesture bindings. `hold_center` is the only optional one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionsConfig {
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_tap_left")]
    pub tap_left: BindingConfig,

    #[serde(default = "default_tap_center")]
    pub tap_center: BindingConfig,

    #[serde(default = "default_tap_right")]
    pub tap_right: BindingConfig,

    #[serde(default = "default_hold_left")]
    pub hold_left: BindingConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_center: Option<BindingConfig>,

    #[serde(default = "default_hold_right")]
    pub hold_right: BindingConfig,

    #[serde(default = "default_release")]
    pub release: BindingConfig,
}

fn default_command_timeout_ms() -> u64 { defaults::COMMAND_TIMEOUT_MS }
fn default_tap_left() -> BindingConfig { BindingConfig::builtin(BuiltinAction::VolumeDown) }
fn default_tap_center() -> BindingConfig { BindingConfig::builtin(BuiltinAction::TogglePlayback) }
fn default_tap_right() -> BindingConfig { BindingConfig::builtin(BuiltinAction::VolumeUp) }
fn default_hold_left() -> BindingConfig { BindingConfig::builtin(BuiltinAction::PreviousTrack) }
fn default_hold_right() -> BindingConfig { BindingConfig::builtin(BuiltinAction::NextTrack) }
fn default_release() -> BindingConfig { BindingConfig::builtin(BuiltinAction::Noop) }

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            tap_left: default_tap_left(),
            tap_center: default_tap_center(),
            tap_right: default_tap_right(),
            hold_left: default_hold_left(),
            hold_center: None,
            hold_right: default_hold_right(),
            release: default_release(),
        }
    }
}

impl ActionsConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Binding configured for a registry key, if any.
    pub fn binding(&self, key: BindingKey) -> Option<&BindingConfig> {
        match key {
            BindingKey::Tap(Zone::Left) => Some(&self.tap_left),
            BindingKey::Tap(Zone::Center) => Some(&self.tap_center),
            BindingKey::Tap(Zone::Right) => Some(&self.tap_right),
            BindingKey::Hold(Zone::Left) => Some(&self.hold_left),
            BindingKey::Hold(Zone::Center) => self.hold_center.as_ref(),
            BindingKey::Hold(Zone::Right) => Some(&self.hold_right),
            BindingKey::Release => Some(&self.release),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
