//! Built-in actions and the config-driven handler.
//!
//! The built-ins only update `ActionState`; the audible effect (mixer volume,
//! player control) comes from the optional external command bound alongside.
//! For example, to drive an MPRIS player:
//!
//! ```toml
//! [actions.tap_center]
//! action = "toggle_playback"
//! command = ["playerctl", "play-pause"]
//!
//! [actions.tap_right]
//! action = "volume_up"
//! command = ["pactl", "set-sink-volume", "@DEFAULT_SINK@", "{volume}%"]
//! ```

use super::dispatcher::{ActionHandler, ActionRegistry, HandlerError, RegistryError};
use super::state::ActionState;
use crate::config::{ActionsConfig, BindingConfig, VolumeConfig};
use crate::types::{BindingKey, GestureEvent, Zone};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

/// State transitions available without any external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinAction {
    VolumeDown,
    VolumeUp,
    TogglePlayback,
    PreviousTrack,
    NextTrack,
    Noop,
}

impl BuiltinAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinAction::VolumeDown => "volume_down",
            BuiltinAction::VolumeUp => "volume_up",
            BuiltinAction::TogglePlayback => "toggle_playback",
            BuiltinAction::PreviousTrack => "previous_track",
            BuiltinAction::NextTrack => "next_track",
            BuiltinAction::Noop => "noop",
        }
    }

    /// Pure state update. Volume moves by `step` and is clamped to
    /// `min..=max`.
    pub fn apply(&self, state: ActionState, volume: &VolumeConfig) -> ActionState {
        match self {
            BuiltinAction::VolumeDown => ActionState {
                volume: state.volume.saturating_sub(volume.step).max(volume.min),
                ..state
            },
            BuiltinAction::VolumeUp => ActionState {
                volume: state.volume.saturating_add(volume.step).min(volume.max),
                ..state
            },
            BuiltinAction::TogglePlayback => ActionState {
                playing: !state.playing,
                ..state
            },
            BuiltinAction::PreviousTrack | BuiltinAction::NextTrack | BuiltinAction::Noop => state,
        }
    }
}

impl std::fmt::Display for BuiltinAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handler built from one `[actions.*]` binding.
#[derive(Debug, Clone)]
pub struct ConfiguredAction {
    name: String,
    action: BuiltinAction,
    command: Vec<String>,
    volume: VolumeConfig,
    timeout: Duration,
}

impl ConfiguredAction {
    pub fn new(
        key: BindingKey,
        binding: &BindingConfig,
        volume: VolumeConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            name: format!("{}:{}", key.config_name(), binding.action),
            action: binding.action,
            command: binding.command.clone(),
            volume,
            timeout,
        }
    }

    /// Substitute `{volume}`, `{playing}` and `{gesture}` in the command.
    fn render_command(&self, gesture: GestureEvent, state: &ActionState) -> Vec<String> {
        let volume = state.volume.to_string();
        let playing = state.playing.to_string();
        let gesture = gesture.binding_key().config_name();
        self.command
            .iter()
            .map(|arg| {
                arg.replace("{volume}", &volume)
                    .replace("{playing}", &playing)
                    .replace("{gesture}", gesture)
            })
            .collect()
    }

    async fn run_command(&self, argv: &[String]) -> Result<(), HandlerError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| HandlerError::Timeout {
                program: program.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })?
            .map_err(|source| HandlerError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let status = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr)
            };
            Err(HandlerError::CommandFailed {
                program: program.clone(),
                status,
            })
        }
    }
}

#[async_trait]
impl ActionHandler for ConfiguredAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        gesture: GestureEvent,
        state: ActionState,
    ) -> Result<ActionState, HandlerError> {
        let next = self.action.apply(state, &self.volume);
        match self.action {
            BuiltinAction::VolumeDown | BuiltinAction::VolumeUp => {
                info!("{}: {} → {}", self.action, state.volume, next.volume);
            }
            BuiltinAction::TogglePlayback => {
                info!("{}", if next.playing { "Play" } else { "Pause" });
            }
            BuiltinAction::PreviousTrack => info!("Previous track"),
            BuiltinAction::NextTrack => info!("Next track"),
            BuiltinAction::Noop => {}
        }

        if !self.command.is_empty() {
            let argv = self.render_command(gesture, &next);
            self.run_command(&argv).await?;
        }
        Ok(next)
    }
}

/// Build the registry described by `[actions]`.
pub fn registry_from_config(
    actions: &ActionsConfig,
    volume: &VolumeConfig,
) -> Result<ActionRegistry, RegistryError> {
    let all_keys = [
        BindingKey::Tap(Zone::Left),
        BindingKey::Tap(Zone::Center),
        BindingKey::Tap(Zone::Right),
        BindingKey::Hold(Zone::Left),
        BindingKey::Hold(Zone::Center),
        BindingKey::Hold(Zone::Right),
        BindingKey::Release,
    ];

    all_keys
        .into_iter()
        .filter_map(|key| actions.binding(key).map(|binding| (key, binding)))
        .fold(ActionRegistry::builder(), |builder, (key, binding)| {
            builder.bind(
                key,
                ConfiguredAction::new(key, binding, *volume, actions.command_timeout()),
            )
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(volume: u8, playing: bool) -> ActionState {
        ActionState { volume, playing }
    }

    #[test]
    fn test_volume_steps_and_clamps() {
        let cfg = VolumeConfig::default();
        assert_eq!(BuiltinAction::VolumeUp.apply(state(50, false), &cfg).volume, 60);
        assert_eq!(BuiltinAction::VolumeUp.apply(state(95, false), &cfg).volume, 100);
        assert_eq!(BuiltinAction::VolumeDown.apply(state(50, false), &cfg).volume, 40);
        assert_eq!(BuiltinAction::VolumeDown.apply(state(5, false), &cfg).volume, 0);

        let narrow = VolumeConfig { start: 30, step: 25, min: 20, max: 70 };
        assert_eq!(BuiltinAction::VolumeDown.apply(state(30, false), &narrow).volume, 20);
        assert_eq!(BuiltinAction::VolumeUp.apply(state(60, false), &narrow).volume, 70);
    }

    #[test]
    fn test_toggle_and_track_actions() {
        let cfg = VolumeConfig::default();
        assert!(BuiltinAction::TogglePlayback.apply(state(50, false), &cfg).playing);
        assert!(!BuiltinAction::TogglePlayback.apply(state(50, true), &cfg).playing);
        assert_eq!(BuiltinAction::NextTrack.apply(state(50, true), &cfg), state(50, true));
        assert_eq!(BuiltinAction::Noop.apply(state(10, false), &cfg), state(10, false));
    }

    #[test]
    fn test_default_registry_matches_stock_bindings() {
        let registry =
            registry_from_config(&ActionsConfig::default(), &VolumeConfig::default()).unwrap();
        assert_eq!(registry.len(), 6);
        assert_eq!(
            registry.get(BindingKey::Tap(Zone::Left)).unwrap().name(),
            "tap_left:volume_down"
        );
        assert_eq!(
            registry.get(BindingKey::Hold(Zone::Right)).unwrap().name(),
            "hold_right:next_track"
        );
        assert!(!registry.is_bound(BindingKey::Hold(Zone::Center)));
    }

    #[test]
    fn test_render_command_placeholders() {
        let binding = BindingConfig {
            action: BuiltinAction::VolumeUp,
            command: vec![
                "mixer".into(),
                "{volume}%".into(),
                "--tag={gesture}".into(),
                "{playing}".into(),
            ],
        };
        let action = ConfiguredAction::new(
            BindingKey::Tap(Zone::Right),
            &binding,
            VolumeConfig::default(),
            Duration::from_secs(1),
        );
        let argv = action.render_command(GestureEvent::Tap(Zone::Right), &state(60, true));
        assert_eq!(argv, vec!["mixer", "60%", "--tag=tap_right", "true"]);
    }

    #[tokio::test]
    async fn test_builtin_without_command() {
        let action = ConfiguredAction::new(
            BindingKey::Tap(Zone::Left),
            &BindingConfig::builtin(BuiltinAction::VolumeDown),
            VolumeConfig::default(),
            Duration::from_secs(1),
        );
        let next = action
            .invoke(GestureEvent::Tap(Zone::Left), state(50, false))
            .await
            .unwrap();
        assert_eq!(next.volume, 40);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let binding = BindingConfig {
            action: BuiltinAction::VolumeUp,
            command: vec!["/nonexistent/touchstrip-test-binary".into()],
        };
        let action = ConfiguredAction::new(
            BindingKey::Tap(Zone::Right),
            &binding,
            VolumeConfig::default(),
            Duration::from_secs(1),
        );
        let err = action
            .invoke(GestureEvent::Tap(Zone::Right), state(50, false))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_reports_status() {
        let binding = BindingConfig {
            action: BuiltinAction::Noop,
            command: vec!["sh".into(), "-c".into(), "echo boom >&2; exit 3".into()],
        };
        let action = ConfiguredAction::new(
            BindingKey::Release,
            &binding,
            VolumeConfig::default(),
            Duration::from_secs(5),
        );
        let err = action
            .invoke(GestureEvent::Release, state(50, false))
            .await
            .unwrap_err();
        match err {
            HandlerError::CommandFailed { program, status } => {
                assert_eq!(program, "sh");
                assert!(status.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_command_times_out() {
        let binding = BindingConfig {
            action: BuiltinAction::Noop,
            command: vec!["sleep".into(), "5".into()],
        };
        let action = ConfiguredAction::new(
            BindingKey::Release,
            &binding,
            VolumeConfig::default(),
            Duration::from_millis(50),
        );
        let err = action
            .invoke(GestureEvent::Release, state(50, false))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Timeout { timeout_ms: 50, .. }));
    }
}
