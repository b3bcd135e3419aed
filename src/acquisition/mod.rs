//! Sensor data acquisition module
//!
//! Transport clients for the touch strip's line protocol plus the frame
//! parser that turns one line into a `Sample`.

pub mod frame_parser;
pub mod line_buffer;
pub mod serial_client;
pub mod tcp_client;

pub use frame_parser::{parse_frame, ParseError};
pub use line_buffer::LineBuffer;
pub use serial_client::SerialClient;
pub use tcp_client::{LineStreamClient, LineStreamStats};

use thiserror::Error;

/// Transport failures. Not recoverable by the classifier; surfaced to the
/// caller of the processing loop, which decides between reconnect and exit.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Source '{0}' cannot reconnect")]
    ReconnectUnsupported(String),
}
