//! Action Dispatcher
//!
//! Routes each `GestureEvent` to the handler bound to its `BindingKey` and
//! threads `ActionState` from one invocation to the next. A failing handler
//! is logged and its result discarded; the state it was given stays current.

use super::state::ActionState;
use crate::types::{BindingKey, GestureEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Handler Contract
// ============================================================================

/// Failure reported by an action handler. Never fatal to the sensing loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("command '{program}' exited with {status}")]
    CommandFailed { program: String, status: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{program}' timed out after {timeout_ms} ms")]
    Timeout { program: String, timeout_ms: u64 },

    #[error("{0}")]
    Failed(String),
}

/// A user-defined reaction to a gesture.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the action and return the updated auxiliary state.
    async fn invoke(
        &self,
        gesture: GestureEvent,
        state: ActionState,
    ) -> Result<ActionState, HandlerError>;
}

/// Handler backed by a plain closure.
pub struct FnHandler<F> {
    name: String,
    func: F,
}

/// Wrap a synchronous closure as an [`ActionHandler`].
pub fn handler_fn<F>(name: impl Into<String>, func: F) -> FnHandler<F>
where
    F: Fn(GestureEvent, ActionState) -> Result<ActionState, HandlerError> + Send + Sync,
{
    FnHandler {
        name: name.into(),
        func,
    }
}

#[async_trait]
impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(GestureEvent, ActionState) -> Result<ActionState, HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        gesture: GestureEvent,
        state: ActionState,
    ) -> Result<ActionState, HandlerError> {
        (self.func)(gesture, state)
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no action bound for required gesture '{0}'")]
    MissingBinding(BindingKey),
}

/// Immutable gesture → handler map. Construct via [`ActionRegistry::builder`].
#[derive(Clone)]
pub struct ActionRegistry {
    handlers: HashMap<BindingKey, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    pub fn get(&self, key: BindingKey) -> Option<&Arc<dyn ActionHandler>> {
        self.handlers.get(&key)
    }

    pub fn is_bound(&self, key: BindingKey) -> bool {
        self.handlers.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, handler) in &self.handlers {
            map.entry(key, &handler.name());
        }
        map.finish()
    }
}

#[derive(Default)]
pub struct ActionRegistryBuilder {
    handlers: HashMap<BindingKey, Arc<dyn ActionHandler>>,
}

impl ActionRegistryBuilder {
    /// Bind a handler, replacing any earlier binding for the same key.
    pub fn bind(self, key: BindingKey, handler: impl ActionHandler + 'static) -> Self {
        self.bind_arc(key, Arc::new(handler))
    }

    pub fn bind_arc(mut self, key: BindingKey, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(key, handler);
        self
    }

    /// Fails unless every key in [`BindingKey::REQUIRED`] is bound.
    pub fn build(self) -> Result<ActionRegistry, RegistryError> {
        if let Some(missing) = BindingKey::REQUIRED
            .into_iter()
            .find(|key| !self.handlers.contains_key(key))
        {
            return Err(RegistryError::MissingBinding(missing));
        }
        Ok(ActionRegistry {
            handlers: self.handlers,
        })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Result of dispatching one event.
#[derive(Debug)]
pub enum DispatchOutcome {
    Handled { handler: String },
    /// Optional binding (center hold) left empty.
    Unbound,
    Failed { handler: String, error: HandlerError },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: u64,
    pub unbound: u64,
    pub failed: u64,
}

pub struct ActionDispatcher {
    registry: ActionRegistry,
    state: ActionState,
    stats: DispatchStats,
}

impl ActionDispatcher {
    pub fn new(registry: ActionRegistry, initial_state: ActionState) -> Self {
        Self {
            registry,
            state: initial_state,
            stats: DispatchStats::default(),
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Invoke the handler bound to `event`.
    ///
    /// Calls are sequential; the state returned by one handler is the input
    /// of the next.
    pub async fn dispatch(&mut self, event: GestureEvent) -> DispatchOutcome {
        let key = event.binding_key();
        let Some(handler) = self.registry.get(key).cloned() else {
            self.stats.unbound += 1;
            debug!(gesture = %event, binding = %key, "No action bound");
            return DispatchOutcome::Unbound;
        };

        let name = handler.name().to_string();
        match handler.invoke(event, self.state).await {
            Ok(next) => {
                if next != self.state {
                    info!(
                        handler = %name,
                        volume = next.volume,
                        playing = next.playing,
                        "Action state updated"
                    );
                }
                self.state = next;
                self.stats.handled += 1;
                DispatchOutcome::Handled { handler: name }
            }
            Err(error) => {
                self.stats.failed += 1;
                warn!(
                    handler = %name,
                    gesture = %event,
                    error = %error,
                    "Action failed — state unchanged"
                );
                DispatchOutcome::Failed {
                    handler: name,
                    error,
                }
            }
        }
    }
}
