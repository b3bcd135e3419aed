//! Config validation: unknown-key detection with Levenshtein suggestions
//! and plausibility checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs; hard errors live
//! in `TouchConfig::validate`.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for TouchConfig.
///
/// Maintained by hand to match touch_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [gesture]
        "gesture",
        "gesture.activate_threshold",
        "gesture.deactivate_threshold",
        "gesture.red_pos_threshold",
        "gesture.blue_pos_threshold",
        "gesture.hold_window_ms",
        // [source]
        "source",
        "source.nominal_sample_interval_ms",
        "source.gap_warning_factor",
        // [serial]
        "serial",
        "serial.port",
        "serial.baud",
        "serial.read_timeout_ms",
        "serial.reconnect_delay_ms",
        "serial.max_connect_attempts",
        // [tcp]
        "tcp",
        "tcp.connect_timeout_secs",
        "tcp.read_timeout_secs",
        "tcp.max_reconnect_attempts",
        "tcp.initial_reconnect_delay_secs",
        "tcp.max_reconnect_delay_secs",
        // [volume]
        "volume",
        "volume.start",
        "volume.step",
        "volume.min",
        "volume.max",
        // [actions]
        "actions",
        "actions.command_timeout_ms",
        "actions.tap_left",
        "actions.tap_left.action",
        "actions.tap_left.command",
        "actions.tap_center",
        "actions.tap_center.action",
        "actions.tap_center.command",
        "actions.tap_right",
        "actions.tap_right.action",
        "actions.tap_right.command",
        "actions.hold_left",
        "actions.hold_left.action",
        "actions.hold_left.command",
        "actions.hold_center",
        "actions.hold_center.action",
        "actions.hold_center.command",
        "actions.hold_right",
        "actions.hold_right.action",
        "actions.hold_right.command",
        "actions.release",
        "actions.release.action",
        "actions.release.command",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties go to the lexicographically smaller key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Plausibility Checks
// ============================================================================

/// Values that validate but are unlikely to be intended.
pub fn suspicious_values(config: &super::TouchConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let g = &config.gesture;

    // Under ~250 ms an ordinary tap turns into a hold.
    if g.hold_window_ms < 250 {
        warnings.push(ValidationWarning {
            field: "gesture.hold_window_ms".to_string(),
            message: format!(
                "hold_window_ms = {} is shorter than a typical tap (250 ms)",
                g.hold_window_ms
            ),
            suggestion: None,
        });
    }

    let hysteresis = g.activate_threshold - g.deactivate_threshold;
    if hysteresis < 0.2 {
        warnings.push(ValidationWarning {
            field: "gesture.activate_threshold".to_string(),
            message: format!(
                "activate/deactivate band is only {hysteresis:.3} wide; expect press/release chatter"
            ),
            suggestion: None,
        });
    }

    let center_width = g.red_pos_threshold - g.blue_pos_threshold;
    if center_width < 0.05 {
        warnings.push(ValidationWarning {
            field: "gesture.red_pos_threshold".to_string(),
            message: format!(
                "center zone is only {center_width:.3} wide; center taps will be rare"
            ),
            suggestion: None,
        });
    }

    const STANDARD_BAUDS: [u32; 9] = [
        9_600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800, 921_600, 1_000_000,
    ];
    if !STANDARD_BAUDS.contains(&config.serial.baud) {
        warnings.push(ValidationWarning {
            field: "serial.baud".to_string(),
            message: format!("serial.baud = {} is not a standard rate", config.serial.baud),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
