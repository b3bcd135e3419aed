//! Processing Loop Integration Tests
//!
//! Scripted sources drive the full line -> gesture -> action path with
//! tokio's paused clock, so hold timing is exact and the tests run instantly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use touchstrip::actions::{
    handler_fn, registry_from_config, ActionDispatcher, ActionRegistry, ActionState,
    DispatchOutcome, HandlerError,
};
use touchstrip::config::{TcpConfig, TouchConfig};
use touchstrip::gesture::{ClassifierParams, GestureClassifier};
use touchstrip::pipeline::{
    GestureHooks, LineReaderSource, LoopExit, ProcessingLoop, SampleSource, SourceEvent,
    TcpSource,
};
use touchstrip::types::{BindingKey, GestureEvent, Zone};
use touchstrip::SourceError;

// ============================================================================
// Helpers
// ============================================================================

enum Step {
    /// Wait, then deliver the line.
    Line(u64, &'static str),
    /// Fail the read (connection dropped).
    Drop,
    /// Connection dropped and was restored by the source itself.
    Reconnected,
}

/// Source that replays a fixed script on the (paused) tokio clock.
struct ScriptedSource {
    steps: VecDeque<Step>,
    reconnects: u32,
}

impl ScriptedSource {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            reconnects: 0,
        }
    }
}

#[async_trait]
impl SampleSource for ScriptedSource {
    async fn next_line(&mut self) -> Result<SourceEvent, SourceError> {
        match self.steps.pop_front() {
            Some(Step::Line(delay_ms, line)) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(SourceEvent::Line(line.to_string()))
            }
            Some(Step::Drop) => Err(SourceError::ConnectionClosed),
            Some(Step::Reconnected) => Ok(SourceEvent::Reconnected),
            None => Ok(SourceEvent::Eof),
        }
    }

    async fn reconnect(&mut self) -> Result<(), SourceError> {
        self.reconnects += 1;
        Ok(())
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// Records every gesture with the state after dispatch.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(GestureEvent, bool, ActionState)>>>);

impl GestureHooks for Recorder {
    fn on_gesture(&mut self, event: GestureEvent, outcome: &DispatchOutcome, state: &ActionState) {
        let handled = matches!(outcome, DispatchOutcome::Handled { .. });
        self.0.lock().unwrap().push((event, handled, *state));
    }
}

impl Recorder {
    fn events(&self) -> Vec<GestureEvent> {
        self.0.lock().unwrap().iter().map(|(e, _, _)| *e).collect()
    }
}

fn default_loop(recorder: Recorder) -> ProcessingLoop<Recorder> {
    loop_with_params(recorder, ClassifierParams::from(&TouchConfig::default().gesture))
}

fn loop_with_params(recorder: Recorder, params: ClassifierParams) -> ProcessingLoop<Recorder> {
    let config = TouchConfig::default();
    let registry = registry_from_config(&config.actions, &config.volume).unwrap();
    ProcessingLoop::new(
        GestureClassifier::new(params),
        ActionDispatcher::new(registry, ActionState::new(&config.volume)),
        recorder,
        CancellationToken::new(),
    )
}

const PRESS_LEFT: &str = "520 500 0.45 0.40 0.039 510";
const PRESS_CENTER: &str = "430 500 0.30 0.30 -0.150 465";
const PRESS_RIGHT: &str = "352 500 0.40 0.45 -0.350 426";
const CONTACT: &str = "430 500 0.01 -0.02 -0.150 465";
const LIFT: &str = "430 500 -0.40 -0.35 -0.150 465";

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn default_bindings_drive_volume_and_playback() {
    let recorder = Recorder::default();
    let mut pipeline = default_loop(recorder.clone());
    let mut source = ScriptedSource::new(vec![
        // tap left: volume 50 -> 40
        Step::Line(0, PRESS_LEFT),
        Step::Line(150, LIFT),
        // tap right twice: 40 -> 60
        Step::Line(500, PRESS_RIGHT),
        Step::Line(150, LIFT),
        Step::Line(500, PRESS_RIGHT),
        Step::Line(150, LIFT),
        // tap center: playing false -> true
        Step::Line(500, PRESS_CENTER),
        Step::Line(150, LIFT),
    ]);

    let exit = pipeline.run(&mut source).await.unwrap();
    assert_eq!(exit, LoopExit::Eof);

    let state = pipeline.action_state();
    assert_eq!(state.volume, 60);
    assert!(state.playing);

    let stats = pipeline.stats();
    assert_eq!(stats.taps, 4);
    assert_eq!(stats.releases, 4);
    assert_eq!(stats.holds, 0);
    assert_eq!(recorder.events().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn hold_needs_a_sample_after_the_window() {
    let recorder = Recorder::default();
    let mut pipeline = default_loop(recorder.clone());
    let mut source = ScriptedSource::new(vec![
        Step::Line(0, PRESS_CENTER),
        Step::Line(1000, CONTACT),
        Step::Line(1900, CONTACT),
        Step::Line(100, LIFT),
    ]);

    pipeline.run(&mut source).await.unwrap();

    // Center hold is unbound by default; the lift after the hold is ignored
    assert_eq!(
        recorder.events(),
        vec![GestureEvent::Tap(Zone::Center), GestureEvent::Hold(Zone::Center)]
    );
    let recorded = recorder.0.lock().unwrap();
    assert!(recorded[0].1, "tap center should be handled");
    assert!(!recorded[1].1, "hold center should be unbound");
    let gap = pipeline.stats().max_sample_gap;
    assert!(gap >= Duration::from_millis(1900) && gap < Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn malformed_lines_are_counted_and_skipped() {
    let recorder = Recorder::default();
    let mut pipeline = default_loop(recorder.clone());
    let mut source = ScriptedSource::new(vec![
        Step::Line(0, "garbage at startup"),
        Step::Line(10, "1.0 2.0"),
        Step::Line(10, PRESS_LEFT),
        Step::Line(10, "1.0 2.0 abc 3.0 4.0 5.0"),
        Step::Line(10, LIFT),
    ]);

    pipeline.run(&mut source).await.unwrap();

    assert_eq!(recorder.events(), vec![GestureEvent::Tap(Zone::Left), GestureEvent::Release]);
    let stats = pipeline.stats();
    assert_eq!(stats.lines_read, 5);
    assert_eq!(stats.parse_failures, 3);
    assert_eq!(stats.samples, 2);
}

#[tokio::test(start_paused = true)]
async fn handler_failure_does_not_disturb_next_gesture() {
    let bump = |_: GestureEvent, s: ActionState| -> Result<ActionState, HandlerError> {
        Ok(ActionState {
            volume: s.volume + 1,
            ..s
        })
    };
    let mut builder = ActionRegistry::builder();
    for key in BindingKey::REQUIRED {
        builder = builder.bind(key, handler_fn(key.config_name(), bump));
    }
    let registry = builder
        .bind(
            BindingKey::Tap(Zone::Right),
            handler_fn("flaky", |_, _| Err(HandlerError::Failed("player offline".into()))),
        )
        .build()
        .unwrap();

    let recorder = Recorder::default();
    let mut pipeline = ProcessingLoop::new(
        GestureClassifier::new(ClassifierParams::default()),
        ActionDispatcher::new(registry, ActionState::default()),
        recorder.clone(),
        CancellationToken::new(),
    );
    let mut source = ScriptedSource::new(vec![
        Step::Line(0, PRESS_RIGHT),
        Step::Line(100, LIFT),
        Step::Line(500, PRESS_LEFT),
        Step::Line(100, LIFT),
    ]);

    pipeline.run(&mut source).await.unwrap();

    assert_eq!(recorder.events().len(), 4);
    assert_eq!(pipeline.stats().handler_failures, 1);
    // Release, tap left, release succeeded; the failed tap right changed nothing
    assert_eq!(pipeline.action_state().volume, ActionState::default().volume + 3);
}

#[tokio::test(start_paused = true)]
async fn source_error_surfaces_and_loop_resumes_after_reconnect() {
    let recorder = Recorder::default();
    let mut pipeline = default_loop(recorder.clone());
    let mut source = ScriptedSource::new(vec![
        Step::Line(0, PRESS_LEFT),
        Step::Drop,
        // Lift after reconnect belongs to a press that was discarded
        Step::Line(50, LIFT),
        Step::Line(500, PRESS_RIGHT),
        Step::Line(100, LIFT),
    ]);

    let err = pipeline.run(&mut source).await.unwrap_err();
    assert!(matches!(err, SourceError::ConnectionClosed));

    pipeline.reset_interaction();
    source.reconnect().await.unwrap();
    assert_eq!(pipeline.run(&mut source).await.unwrap(), LoopExit::Eof);

    assert_eq!(source.reconnects, 1);
    assert_eq!(
        recorder.events(),
        vec![
            GestureEvent::Tap(Zone::Left),
            GestureEvent::Tap(Zone::Right),
            GestureEvent::Release,
        ]
    );
    // 50 - 10 + 10
    assert_eq!(pipeline.action_state().volume, 50);
}

#[tokio::test(start_paused = true)]
async fn source_side_reconnect_discards_open_press() {
    let recorder = Recorder::default();
    let mut pipeline = default_loop(recorder.clone());
    let mut source = ScriptedSource::new(vec![
        Step::Line(0, PRESS_LEFT),
        Step::Line(100, CONTACT),
        Step::Reconnected,
        // Well past the hold window, but the press did not survive the outage
        Step::Line(3000, CONTACT),
        Step::Line(100, LIFT),
        Step::Line(500, PRESS_RIGHT),
        Step::Line(100, LIFT),
    ]);

    assert_eq!(pipeline.run(&mut source).await.unwrap(), LoopExit::Eof);

    assert_eq!(
        recorder.events(),
        vec![
            GestureEvent::Tap(Zone::Left),
            GestureEvent::Tap(Zone::Right),
            GestureEvent::Release,
        ]
    );
    let stats = pipeline.stats();
    assert_eq!(stats.source_reconnects, 1);
    assert_eq!(stats.holds, 0);
    assert_eq!(source.reconnects, 0);
}

#[tokio::test]
async fn tcp_peer_dropped_mid_press_yields_no_hold() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let bridge = tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.unwrap();
        first.write_all(format!("{PRESS_LEFT}\n").as_bytes()).await.unwrap();
        drop(first);
        let (mut second, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        second.write_all(format!("{CONTACT}\n").as_bytes()).await.unwrap();
        // Listener goes away with this task, so the next reconnect fails
    });

    let config = TcpConfig {
        connect_timeout_secs: 5,
        read_timeout_secs: 5,
        max_reconnect_attempts: 1,
        initial_reconnect_delay_secs: 0,
        ..TcpConfig::default()
    };
    let mut source = TcpSource::connect("127.0.0.1", port, config).await.unwrap();

    let recorder = Recorder::default();
    let params = ClassifierParams {
        hold_window: Duration::from_millis(200),
        ..ClassifierParams::default()
    };
    let mut pipeline = loop_with_params(recorder.clone(), params);

    let err = pipeline.run(&mut source).await.unwrap_err();
    assert!(matches!(err, SourceError::ConnectionFailed(_)));
    bridge.await.unwrap();

    assert_eq!(recorder.events(), vec![GestureEvent::Tap(Zone::Left)]);
    let stats = pipeline.stats();
    assert_eq!(stats.taps, 1);
    assert_eq!(stats.holds, 0);
    assert_eq!(stats.source_reconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_a_waiting_loop() {
    let token = CancellationToken::new();
    let config = TouchConfig::default();
    let registry = registry_from_config(&config.actions, &config.volume).unwrap();
    let mut pipeline = ProcessingLoop::new(
        GestureClassifier::default(),
        ActionDispatcher::new(registry, ActionState::default()),
        (),
        token.clone(),
    );

    // Reader that never produces data
    let (_writer, reader) = tokio::io::duplex(64);
    let mut source = LineReaderSource::new(BufReader::new(reader), "idle");

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        token.cancel();
    });

    assert_eq!(pipeline.run(&mut source).await.unwrap(), LoopExit::Cancelled);
    canceller.await.unwrap();
    assert_eq!(pipeline.stats().lines_read, 0);
}
