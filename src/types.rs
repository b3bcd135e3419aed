//! Shared data structures for the touch strip gesture pipeline
//!
//! - `Sample`: one parsed six-channel sensor frame
//! - `Zone`: which part of the strip was touched
//! - `GestureEvent`: classifier output consumed by the action dispatcher
//! - `BindingKey`: action registry key derived from a gesture

use serde::{Deserialize, Serialize};

// ============================================================================
// Sensor Frames
// ============================================================================

/// Number of numeric channels in one sensor frame.
pub const SAMPLE_CHANNELS: usize = 6;

/// One instant of the two-electrode sensor.
///
/// Channel layout on the wire:
/// - `[0]` electrode A raw (red side)
/// - `[1]` electrode B raw (blue side)
/// - `[2]` highpass of electrode A
/// - `[3]` highpass of electrode B
/// - `[4]` position, `ln(A) - ln(B)`
/// - `[5]` pressure, `(A + B) / 2`
///
/// Only produced by the frame parser, which guarantees every field is finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub electrode_a: f64,
    pub electrode_b: f64,
    pub highpass_a: f64,
    pub highpass_b: f64,
    pub position: f64,
    pub pressure: f64,
}

impl Sample {
    /// Build a sample from channels in wire order.
    pub fn from_channels(channels: [f64; SAMPLE_CHANNELS]) -> Self {
        let [electrode_a, electrode_b, highpass_a, highpass_b, position, pressure] = channels;
        Self {
            electrode_a,
            electrode_b,
            highpass_a,
            highpass_b,
            position,
            pressure,
        }
    }

    /// Filtered press/release signal: highpass A + highpass B.
    pub fn highpass_sum(&self) -> f64 {
        self.highpass_a + self.highpass_b
    }
}

// ============================================================================
// Zones
// ============================================================================

/// Spatial zone on the strip, derived from the position channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Left, Zone::Center, Zone::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Left => "left",
            Zone::Center => "center",
            Zone::Right => "right",
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Zone::Left => write!(f, "Left"),
            Zone::Center => write!(f, "Center"),
            Zone::Right => write!(f, "Right"),
        }
    }
}

// ============================================================================
// Gestures
// ============================================================================

/// A classified interaction, emitted at most once per sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "gesture", content = "zone", rename_all = "snake_case")]
pub enum GestureEvent {
    /// Optimistic press, emitted as soon as the highpass sum crosses the
    /// activate threshold.
    Tap(Zone),
    /// Press still open after the hold window; carries the zone captured at
    /// press time.
    Hold(Zone),
    /// Highpass sum fell below the deactivate threshold before the hold window.
    Release,
}

impl GestureEvent {
    /// Registry key used to look up the handler for this event.
    pub fn binding_key(&self) -> BindingKey {
        match *self {
            GestureEvent::Tap(zone) => BindingKey::Tap(zone),
            GestureEvent::Hold(zone) => BindingKey::Hold(zone),
            GestureEvent::Release => BindingKey::Release,
        }
    }

    pub fn zone(&self) -> Option<Zone> {
        match *self {
            GestureEvent::Tap(zone) | GestureEvent::Hold(zone) => Some(zone),
            GestureEvent::Release => None,
        }
    }
}

impl std::fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GestureEvent::Tap(zone) => write!(f, "Tap({zone})"),
            GestureEvent::Hold(zone) => write!(f, "Hold({zone})"),
            GestureEvent::Release => write!(f, "Release"),
        }
    }
}

/// Action registry key. `Release` is zone-less.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BindingKey {
    Tap(Zone),
    Hold(Zone),
    Release,
}

impl BindingKey {
    /// Keys every registry must bind. `Hold(Center)` is deliberately absent.
    pub const REQUIRED: [BindingKey; 6] = [
        BindingKey::Tap(Zone::Left),
        BindingKey::Tap(Zone::Center),
        BindingKey::Tap(Zone::Right),
        BindingKey::Hold(Zone::Left),
        BindingKey::Hold(Zone::Right),
        BindingKey::Release,
    ];

    /// Config-file name of this binding, e.g. `tap_left`.
    pub fn config_name(&self) -> &'static str {
        match self {
            BindingKey::Tap(Zone::Left) => "tap_left",
            BindingKey::Tap(Zone::Center) => "tap_center",
            BindingKey::Tap(Zone::Right) => "tap_right",
            BindingKey::Hold(Zone::Left) => "hold_left",
            BindingKey::Hold(Zone::Center) => "hold_center",
            BindingKey::Hold(Zone::Right) => "hold_right",
            BindingKey::Release => "release",
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

impl std::fmt::Display for BindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_name())
    }
}
