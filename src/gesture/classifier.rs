//! Gesture Classifier
//!
//! Two-state machine over the highpass sum:
//!
//! ```text
//!            sum > activate / Tap(zone)
//!   Idle ─────────────────────────────────▶ Pressed(zone, since)
//!    ▲                                           │
//!    │  now - since > hold_window / Hold(zone)   │
//!    ├───────────────────────────────────────────┤
//!    │  sum < deactivate / Release               │
//!    └───────────────────────────────────────────┘
//! ```
//!
//! Rules are checked in order press, hold, release and the first match wins,
//! so one sample never produces two events. The zone is captured when the
//! press is detected and reused for the hold.
//!
//! Holds are detected on the first sample that arrives after the window has
//! elapsed; hold latency is therefore bounded by the sample interval, not by
//! a timer.

use super::zone::{resolve_zone, ZoneThresholds};
use crate::config::GestureConfig;
use crate::types::{GestureEvent, Sample, Zone};
use std::time::{Duration, Instant};

/// Interaction memory carried between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    Pressed { zone: Zone, since: Instant },
}

/// Immutable classifier parameters, taken from `[gesture]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierParams {
    pub activate_threshold: f64,
    pub deactivate_threshold: f64,
    pub zones: ZoneThresholds,
    pub hold_window: Duration,
}

impl From<&GestureConfig> for ClassifierParams {
    fn from(cfg: &GestureConfig) -> Self {
        Self {
            activate_threshold: cfg.activate_threshold,
            deactivate_threshold: cfg.deactivate_threshold,
            zones: cfg.zone_thresholds(),
            hold_window: cfg.hold_window(),
        }
    }
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self::from(&GestureConfig::default())
    }
}

/// Converts samples into gesture events. Owns `InteractionState` exclusively.
#[derive(Debug)]
pub struct GestureClassifier {
    params: ClassifierParams,
    state: InteractionState,
}

impl GestureClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self {
            params,
            state: InteractionState::Idle,
        }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self.state, InteractionState::Pressed { .. })
    }

    /// Drop any open interaction. Used after the source reconnects, where the
    /// gap would otherwise surface as a spurious hold.
    pub fn reset(&mut self) {
        self.state = InteractionState::Idle;
    }

    /// Feed one sample that arrived at `now`.
    pub fn process(&mut self, sample: &Sample, now: Instant) -> Option<GestureEvent> {
        let sum = sample.highpass_sum();

        match self.state {
            InteractionState::Idle => {
                if sum > self.params.activate_threshold {
                    let zone = resolve_zone(sample.position, &self.params.zones);
                    self.state = InteractionState::Pressed { zone, since: now };
                    return Some(GestureEvent::Tap(zone));
                }
                None
            }
            InteractionState::Pressed { zone, since } => {
                if now.saturating_duration_since(since) > self.params.hold_window {
                    self.state = InteractionState::Idle;
                    return Some(GestureEvent::Hold(zone));
                }
                if sum < self.params.deactivate_threshold {
                    self.state = InteractionState::Idle;
                    return Some(GestureEvent::Release);
                }
                None
            }
        }
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(ClassifierParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hp_a: f64, hp_b: f64, position: f64) -> Sample {
        Sample::from_channels([0.0, 0.0, hp_a, hp_b, position, 0.0])
    }

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_quiet_signal_stays_idle() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        for (i, hp) in [0.0, 0.2, 0.25, -0.8, 0.5].iter().enumerate() {
            // exactly at the activate threshold is not a press
            assert_eq!(c.process(&sample(*hp, 0.0, 0.0), at(t0, i as u64 * 10)), None);
        }
        assert_eq!(c.state(), InteractionState::Idle);
    }

    #[test]
    fn test_press_emits_tap_with_current_zone() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        assert_eq!(
            c.process(&sample(0.4, 0.4, -0.4), t0),
            Some(GestureEvent::Tap(Zone::Right))
        );
        assert_eq!(
            c.state(),
            InteractionState::Pressed { zone: Zone::Right, since: t0 }
        );
    }

    #[test]
    fn test_no_second_tap_while_pressed() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        assert!(c.process(&sample(0.6, 0.0, 0.0), t0).is_some());
        assert_eq!(c.process(&sample(0.9, 0.0, -0.4), at(t0, 10)), None);
        assert_eq!(c.process(&sample(0.9, 0.0, -0.4), at(t0, 20)), None);
    }

    #[test]
    fn test_short_press_is_tap_then_release() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        let mut events = Vec::new();
        events.extend(c.process(&sample(0.3, 0.3, 0.0), t0));
        events.extend(c.process(&sample(0.0, 0.0, 0.0), at(t0, 100)));
        events.extend(c.process(&sample(-0.3, -0.3, 0.0), at(t0, 300)));
        events.extend(c.process(&sample(-0.3, -0.3, 0.0), at(t0, 3_000)));
        assert_eq!(events, vec![GestureEvent::Tap(Zone::Left), GestureEvent::Release]);
        assert!(!c.is_pressed());
    }

    #[test]
    fn test_hold_uses_zone_captured_at_press() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        c.process(&sample(0.3, 0.3, 0.0), t0);
        // Finger drifted to the right side before the window elapsed
        assert_eq!(
            c.process(&sample(0.0, 0.0, -0.9), at(t0, 2_001)),
            Some(GestureEvent::Hold(Zone::Left))
        );
        assert_eq!(c.state(), InteractionState::Idle);
    }

    #[test]
    fn test_hold_window_is_strict() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        c.process(&sample(0.3, 0.3, -0.1), t0);
        assert_eq!(c.process(&sample(0.0, 0.0, -0.1), at(t0, 2_000)), None);
        assert_eq!(
            c.process(&sample(0.0, 0.0, -0.1), at(t0, 2_010)),
            Some(GestureEvent::Hold(Zone::Center))
        );
    }

    #[test]
    fn test_hold_wins_over_release_on_same_sample() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        c.process(&sample(0.3, 0.3, -0.1), t0);
        assert_eq!(
            c.process(&sample(-1.0, -1.0, -0.1), at(t0, 2_500)),
            Some(GestureEvent::Hold(Zone::Center))
        );
        // The release edge after a hold is not reported again
        assert_eq!(c.process(&sample(-1.0, -1.0, -0.1), at(t0, 2_510)), None);
    }

    #[test]
    fn test_press_can_follow_hold_immediately() {
        let mut c = GestureClassifier::default();
        let t0 = Instant::now();
        c.process(&sample(0.3, 0.3, 0.0), t0);
        assert_eq!(
            c.process(&sample(0.3, 0.3, -0.5), at(t0, 2_100)),
            Some(GestureEvent::Hold(Zone::Left))
        );
        assert_eq!(
            c.process(&sample(0.3, 0.3, -0.5), at(t0, 2_110)),
            Some(GestureEvent::Tap(Zone::Right))
        );
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut c = GestureClassifier::default();
        c.process(&sample(0.6, 0.0, 0.0), Instant::now());
        assert!(c.is_pressed());
        c.reset();
        assert_eq!(c.state(), InteractionState::Idle);
    }

    #[test]
    fn test_params_from_config() {
        let cfg = GestureConfig {
            activate_threshold: 1.0,
            hold_window_ms: 750,
            ..GestureConfig::default()
        };
        let params = ClassifierParams::from(&cfg);
        assert_eq!(params.activate_threshold, 1.0);
        assert_eq!(params.hold_window, Duration::from_millis(750));
        assert_eq!(params.zones.red_pos, -0.05);
    }
}
