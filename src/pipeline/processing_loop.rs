//! Single-consumer processing loop shared across all input modes.
//!
//! line -> parse -> classify -> dispatch, strictly in arrival order. The
//! source read is the only place the loop waits for new work; handler
//! execution is awaited inline so `ActionState` is never touched by two
//! dispatches at once.

use std::io::Write;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::{SampleSource, SourceEvent};
use crate::acquisition::{parse_frame, SourceError};
use crate::actions::{ActionDispatcher, ActionState, DispatchOutcome};
use crate::gesture::GestureClassifier;
use crate::types::GestureEvent;

// ============================================================================
// Gesture Hooks
// ============================================================================

/// Observer called after every dispatched gesture. Pass `()` when nothing
/// besides logging is needed.
pub trait GestureHooks: Send {
    fn on_gesture(&mut self, event: GestureEvent, outcome: &DispatchOutcome, state: &ActionState);
}

impl GestureHooks for () {
    fn on_gesture(
        &mut self,
        _event: GestureEvent,
        _outcome: &DispatchOutcome,
        _state: &ActionState,
    ) {
    }
}

impl<H: GestureHooks> GestureHooks for Option<H> {
    fn on_gesture(&mut self, event: GestureEvent, outcome: &DispatchOutcome, state: &ActionState) {
        if let Some(hooks) = self {
            hooks.on_gesture(event, outcome, state);
        }
    }
}

#[derive(Serialize)]
struct EventRecord<'a> {
    timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    event: GestureEvent,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    handler: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    volume: u8,
    playing: bool,
}

/// Writes one JSON object per gesture (`--events-json`).
pub struct JsonEventWriter<W> {
    out: W,
}

impl<W: Write + Send> JsonEventWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> GestureHooks for JsonEventWriter<W> {
    fn on_gesture(&mut self, event: GestureEvent, outcome: &DispatchOutcome, state: &ActionState) {
        let (outcome_name, handler, error) = match outcome {
            DispatchOutcome::Handled { handler } => ("handled", Some(handler.as_str()), None),
            DispatchOutcome::Unbound => ("unbound", None, None),
            DispatchOutcome::Failed { handler, error } => {
                ("failed", Some(handler.as_str()), Some(error.to_string()))
            }
        };
        let record = EventRecord {
            timestamp: chrono::Utc::now(),
            event,
            outcome: outcome_name,
            handler,
            error,
            volume: state.volume,
            playing: state.playing,
        };

        let written = serde_json::to_writer(&mut self.out, &record)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(self.out))
            .and_then(|()| self.out.flush());
        if let Err(e) = written {
            warn!(error = %e, "Failed to write gesture event");
        }
    }
}

// ============================================================================
// Loop Statistics
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub lines_read: u64,
    pub samples: u64,
    pub parse_failures: u64,
    pub taps: u64,
    pub holds: u64,
    pub releases: u64,
    pub handler_failures: u64,
    /// Times the source re-established its transport on its own.
    pub source_reconnects: u64,
    /// Largest gap between consecutive parsed samples.
    pub max_sample_gap: Duration,
}

impl LoopStats {
    pub fn gestures(&self) -> u64 {
        self.taps + self.holds + self.releases
    }
}

/// Why `run` returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Eof,
    Cancelled,
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Owns the classifier and dispatcher for the lifetime of the process.
///
/// `run` can be called again after a source error and reconnect; classifier
/// and action state carry over (call [`reset_interaction`] first when the
/// stream was interrupted).
///
/// [`reset_interaction`]: ProcessingLoop::reset_interaction
pub struct ProcessingLoop<H: GestureHooks = ()> {
    classifier: GestureClassifier,
    dispatcher: ActionDispatcher,
    hooks: H,
    cancel_token: CancellationToken,
    gap_warning: Option<Duration>,
    last_sample_at: Option<Instant>,
    stats: LoopStats,
}

impl<H: GestureHooks> ProcessingLoop<H> {
    pub fn new(
        classifier: GestureClassifier,
        dispatcher: ActionDispatcher,
        hooks: H,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            hooks,
            cancel_token,
            gap_warning: None,
            last_sample_at: None,
            stats: LoopStats::default(),
        }
    }

    /// Warn when samples stop arriving for longer than `gap` while a press
    /// is open (hold detection is late by that much).
    pub fn with_gap_warning(mut self, gap: Option<Duration>) -> Self {
        self.gap_warning = gap;
        self
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn action_state(&self) -> ActionState {
        self.dispatcher.state()
    }

    pub fn into_hooks(self) -> H {
        self.hooks
    }

    /// Drop any open press, e.g. after the stream was interrupted. No
    /// release is emitted for it.
    pub fn reset_interaction(&mut self) {
        if self.classifier.is_pressed() {
            info!("Discarding open press after stream interruption");
        }
        self.classifier.reset();
        self.last_sample_at = None;
    }

    /// Read until end of data, cancellation, or a source failure.
    pub async fn run<S: SampleSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<LoopExit, SourceError> {
        info!(source = source.source_name(), "Processing touch frames");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown signal received");
                    return Ok(LoopExit::Cancelled);
                }
                result = source.next_line() => result?,
            };

            match event {
                SourceEvent::Line(line) => {
                    let now = tokio::time::Instant::now().into_std();
                    self.process_line(&line, now).await;
                }
                SourceEvent::Reconnected => {
                    self.stats.source_reconnects += 1;
                    warn!(source = source.source_name(), "Source reconnected after an outage");
                    self.reset_interaction();
                }
                SourceEvent::Eof => {
                    info!(
                        source = source.source_name(),
                        lines = self.stats.lines_read,
                        "Source reached end"
                    );
                    return Ok(LoopExit::Eof);
                }
            }
        }
    }

    /// Handle one raw line observed at `now`. Returns the gesture it
    /// produced, if any.
    pub async fn process_line(&mut self, line: &str, now: Instant) -> Option<GestureEvent> {
        self.stats.lines_read += 1;

        let sample = match parse_frame(line) {
            Ok(sample) => sample,
            Err(e) => {
                self.stats.parse_failures += 1;
                debug!(error = %e, line = line.trim_end(), "Skipping malformed frame");
                return None;
            }
        };
        self.stats.samples += 1;
        self.track_gap(now);

        let event = self.classifier.process(&sample, now)?;
        match event {
            GestureEvent::Tap(_) => self.stats.taps += 1,
            GestureEvent::Hold(_) => self.stats.holds += 1,
            GestureEvent::Release => self.stats.releases += 1,
        }
        info!(
            gesture = %event,
            position = sample.position,
            highpass = sample.highpass_sum(),
            "Gesture detected"
        );

        let outcome = self.dispatcher.dispatch(event).await;
        if matches!(outcome, DispatchOutcome::Failed { .. }) {
            self.stats.handler_failures += 1;
        }
        let state = self.dispatcher.state();
        self.hooks.on_gesture(event, &outcome, &state);
        Some(event)
    }

    fn track_gap(&mut self, now: Instant) {
        if let Some(previous) = self.last_sample_at.replace(now) {
            let gap = now.saturating_duration_since(previous);
            if gap > self.stats.max_sample_gap {
                self.stats.max_sample_gap = gap;
            }
            if let Some(limit) = self.gap_warning {
                if gap > limit && self.classifier.is_pressed() {
                    warn!(
                        gap_ms = gap.as_millis(),
                        limit_ms = limit.as_millis(),
                        "Sample gap during press — hold detection delayed"
                    );
                }
            }
        }
    }

    pub fn log_summary(&self) {
        let stats = &self.stats;
        let dispatch = self.dispatcher.stats();
        let state = self.dispatcher.state();
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            lines = stats.lines_read,
            samples = stats.samples,
            parse_failures = stats.parse_failures,
            "Frames"
        );
        info!(
            taps = stats.taps,
            holds = stats.holds,
            releases = stats.releases,
            unbound = dispatch.unbound,
            handler_failures = stats.handler_failures,
            "Gestures"
        );
        info!(
            volume = state.volume,
            playing = state.playing,
            max_sample_gap_ms = stats.max_sample_gap.as_millis(),
            source_reconnects = stats.source_reconnects,
            "Final state"
        );
    }
}
