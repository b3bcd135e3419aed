//! Gesture recognition: the press/hold/release state machine and zone
//! resolution.

pub mod classifier;
pub mod zone;

pub use classifier::{ClassifierParams, GestureClassifier, InteractionState};
pub use zone::{resolve_zone, ZoneThresholds};
