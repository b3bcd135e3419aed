//! Built-in default values.
//!
//! These match the constants the touch strip was originally tuned with and
//! are what `TouchConfig::default()` produces.

// ============================================================================
// Gesture Classification
// ============================================================================

/// Highpass sum above which an idle strip is considered pressed.
pub const ACTIVATE_THRESHOLD: f64 = 0.5;

/// Highpass sum below which a pressed strip is considered released.
pub const DEACTIVATE_THRESHOLD: f64 = -0.5;

/// Position above this is the red (left) electrode zone.
pub const RED_POS_THRESHOLD: f64 = -0.05;

/// Position below this is the blue (right) electrode zone.
pub const BLUE_POS_THRESHOLD: f64 = -0.25;

/// A press still open after this long becomes a hold (ms).
pub const HOLD_WINDOW_MS: u64 = 2_000;

// ============================================================================
// Sample Source
// ============================================================================

/// Expected interval between sensor frames (ms).
///
/// Hold detection fires on the first frame after the hold window, so this is
/// also the expected hold latency.
pub const NOMINAL_SAMPLE_INTERVAL_MS: u64 = 10;

/// Inter-sample gaps larger than `factor * nominal interval` during an open
/// press are logged as degraded hold latency.
pub const GAP_WARNING_FACTOR: u32 = 10;

/// Longest accepted frame line in bytes, newline included. Longer lines are
/// dropped as garbage.
pub const MAX_LINE_BYTES: usize = 1_024;

// ============================================================================
// Serial Port
// ============================================================================

pub const SERIAL_PORT: &str = "/dev/cu.usbmodem12341";

pub const SERIAL_BAUD: u32 = 115_200;

/// Per-read timeout on the serial port (ms).
pub const SERIAL_READ_TIMEOUT_MS: u64 = 10_000;

/// Delay between serial open attempts (ms).
pub const SERIAL_RECONNECT_DELAY_MS: u64 = 1_000;

/// 0 retries forever.
pub const SERIAL_MAX_CONNECT_ATTEMPTS: u32 = 0;

// ============================================================================
// TCP Line Stream
// ============================================================================

pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 30;

/// No frame for this long counts as a dead connection.
pub const TCP_READ_TIMEOUT_SECS: u64 = 30;

pub const TCP_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Initial reconnection delay (doubles each attempt).
pub const TCP_INITIAL_RECONNECT_DELAY_SECS: u64 = 2;

pub const TCP_MAX_RECONNECT_DELAY_SECS: u64 = 60;

// ============================================================================
// Actions
// ============================================================================

pub const START_VOLUME: u8 = 50;

pub const VOLUME_STEP: u8 = 10;

pub const MIN_VOLUME: u8 = 0;

pub const MAX_VOLUME: u8 = 100;

/// External action commands are killed after this long (ms).
pub const COMMAND_TIMEOUT_MS: u64 = 2_000;
