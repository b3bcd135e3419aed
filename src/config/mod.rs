//! Touch Configuration Module
//!
//! Thresholds, transport settings and gesture bindings loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. Explicit `--config` path
//! 2. `TOUCHSTRIP_CONFIG` environment variable (path to TOML file)
//! 3. `touchstrip.toml` in the current working directory
//! 4. Built-in defaults (the values the strip was originally tuned with)
//!
//! The loaded config is passed explicitly to the pipeline; there is no
//! process-global instance.

mod touch_config;
pub mod defaults;
pub mod validation;

pub use touch_config::*;
