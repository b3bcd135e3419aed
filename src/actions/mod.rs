//! Gesture actions: handler contract, registry, dispatcher and the built-in
//! volume/playback actions.

pub mod builtin;
pub mod dispatcher;
pub mod state;

pub use builtin::{registry_from_config, BuiltinAction, ConfiguredAction};
pub use dispatcher::{
    handler_fn, ActionDispatcher, ActionHandler, ActionRegistry, ActionRegistryBuilder,
    DispatchOutcome, DispatchStats, FnHandler, HandlerError, RegistryError,
};
pub use state::ActionState;
