//! Zone resolution from the position channel.

use crate::types::Zone;

/// Position bands. `red_pos > blue_pos` is guaranteed by config validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneThresholds {
    /// Above this: left (red electrode) zone.
    pub red_pos: f64,
    /// Below this: right (blue electrode) zone.
    pub blue_pos: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            red_pos: crate::config::defaults::RED_POS_THRESHOLD,
            blue_pos: crate::config::defaults::BLUE_POS_THRESHOLD,
        }
    }
}

/// Map a position value to a zone.
///
/// Both comparisons are strict, so a position exactly on either threshold is
/// `Center`. No hysteresis: the classifier only calls this at press time.
pub fn resolve_zone(position: f64, thresholds: &ZoneThresholds) -> Zone {
    if position > thresholds.red_pos {
        Zone::Left
    } else if position < thresholds.blue_pos {
        Zone::Right
    } else {
        Zone::Center
    }
}
