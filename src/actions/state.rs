//! Auxiliary action state threaded through the dispatcher.

use crate::config::VolumeConfig;
use serde::{Deserialize, Serialize};

/// State shared by consecutive handler invocations.
///
/// Handlers receive the current value and return the next one; the
/// dispatcher is the only owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionState {
    /// Output volume, percent.
    pub volume: u8,
    /// Whether playback is believed to be running.
    pub playing: bool,
}

impl ActionState {
    pub fn new(volume: &VolumeConfig) -> Self {
        Self {
            volume: volume.start,
            playing: false,
        }
    }
}

impl Default for ActionState {
    fn default() -> Self {
        Self::new(&VolumeConfig::default())
    }
}
