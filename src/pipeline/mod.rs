//! Processing Pipeline Module
//!
//! ```text
//! SampleSource ──line──▶ parse_frame ──Sample──▶ GestureClassifier
//!                                                     │ GestureEvent
//!                                                     ▼
//!                              GestureHooks ◀── ActionDispatcher
//! ```
//!
//! One task drives all of it; see [`ProcessingLoop`].

pub mod processing_loop;
pub mod source;

pub use processing_loop::{GestureHooks, JsonEventWriter, LoopExit, LoopStats, ProcessingLoop};
pub use source::{
    LineReaderSource, ReplaySource, SampleSource, SerialSource, SourceEvent, StdinSource,
    TcpSource,
};
