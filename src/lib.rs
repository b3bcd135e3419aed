//! touchstrip: gesture recognition for a two-electrode capacitive touch strip
//!
//! ## Architecture
//!
//! - **Acquisition**: serial/TCP line transports and the six-channel frame parser
//! - **Gesture**: press/hold/release classifier and position-to-zone resolution
//! - **Actions**: handler registry, sequential dispatcher and built-in media actions
//! - **Pipeline**: sample sources and the single-consumer processing loop

pub mod acquisition;
pub mod actions;
pub mod config;
pub mod gesture;
pub mod pipeline;
pub mod types;

pub use config::TouchConfig;

pub use types::{BindingKey, GestureEvent, Sample, Zone, SAMPLE_CHANNELS};

pub use acquisition::{parse_frame, ParseError, SourceError};

pub use gesture::{
    resolve_zone, ClassifierParams, GestureClassifier, InteractionState, ZoneThresholds,
};

pub use actions::{
    registry_from_config, ActionDispatcher, ActionHandler, ActionRegistry, ActionState,
    DispatchOutcome, HandlerError, RegistryError,
};

pub use pipeline::{LoopExit, LoopStats, ProcessingLoop, SampleSource, SourceEvent};
