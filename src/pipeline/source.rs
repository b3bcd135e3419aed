//! Sample source abstraction for sensor frame ingestion.
//!
//! Provides a unified trait for reading raw frame lines from different
//! transports: serial port (the sensor board's UART), TCP (serial bridges),
//! stdin (piped simulators), and file replay. Sources only deliver lines;
//! parsing happens in the processing loop so a bad line never costs a
//! connection.

use crate::acquisition::{LineBuffer, LineStreamClient, SerialClient, SourceError};
use crate::config::{defaults, SerialConfig, TcpConfig};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// Events produced by a sample source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// One raw line, newline included if the transport sent one.
    Line(String),
    /// The transport dropped and was re-established inside `next_line`.
    /// Anything in progress before the outage is stale.
    Reconnected,
    /// Source reached end of data (EOF for files/stdin).
    Eof,
}

/// Trait abstracting where frame lines come from.
///
/// `next_line` may block until data arrives; that wait is the processing
/// loop's only suspension point. Connection establishment and its retry
/// policy happen before the first line is yielded.
#[async_trait]
pub trait SampleSource: Send {
    /// Read the next raw line.
    ///
    /// Returns `Err` on transport failure; the caller decides whether to
    /// `reconnect()` or stop.
    async fn next_line(&mut self) -> Result<SourceEvent, SourceError>;

    /// Re-establish the transport after `next_line` failed.
    async fn reconnect(&mut self) -> Result<(), SourceError> {
        Err(SourceError::ReconnectUnsupported(self.source_name().to_string()))
    }

    /// Human-readable name for logging (e.g. "serial", "stdin", "TCP").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Line Reader Source (stdin / file replay / any async reader)
// ============================================================================

/// Reads lines from any buffered async reader, with optional pacing.
pub struct LineReaderSource<R> {
    reader: R,
    name: String,
    line_buffer: LineBuffer,
    delay: Option<Duration>,
    yielded_first: bool,
}

impl<R: AsyncBufRead + Unpin + Send> LineReaderSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_buffer: LineBuffer::new(defaults::MAX_LINE_BYTES),
            delay: None,
            yielded_first: false,
        }
    }

    /// Sleep this long before every line after the first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = (!delay.is_zero()).then_some(delay);
        self
    }
}

/// Reads frames piped into the process:
/// `touch-sim | touchstrip --stdin`
pub type StdinSource = LineReaderSource<BufReader<tokio::io::Stdin>>;

impl StdinSource {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

/// Replays a captured frame log.
pub type ReplaySource = LineReaderSource<BufReader<tokio::fs::File>>;

impl ReplaySource {
    /// Open a capture file; `delay` paces lines to approximate the original
    /// sample rate (hold detection depends on arrival time).
    pub async fn open(path: &Path, delay: Duration) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            SourceError::ConnectionFailed(format!("{}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), delay_ms = delay.as_millis(), "Replaying frame capture");
        Ok(Self::new(BufReader::new(file), "replay").with_delay(delay))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SampleSource for LineReaderSource<R> {
    async fn next_line(&mut self) -> Result<SourceEvent, SourceError> {
        if self.yielded_first {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
        }

        loop {
            let limit = self.line_buffer.remaining();
            let bytes = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', self.line_buffer.bytes_mut())
                .await?;
            let line = if bytes == 0 {
                match self.line_buffer.finish() {
                    Some(line) => line,
                    None => return Ok(SourceEvent::Eof),
                }
            } else {
                match self.line_buffer.complete() {
                    Some(line) => line,
                    None => continue,
                }
            };
            self.yielded_first = true;
            return Ok(SourceEvent::Line(line));
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Serial Source (sensor board UART)
// ============================================================================

/// Reads frames from the sensor board's serial port.
///
/// The port is blocking, so each open/read runs on the blocking pool. If the
/// read future is dropped (cancellation), the port goes with the abandoned
/// blocking task and the source reports itself disconnected.
pub struct SerialSource {
    client: Option<SerialClient>,
    port_name: String,
    reconnect_delay: Duration,
    max_connect_attempts: u32,
}

impl SerialSource {
    /// Open the port, retrying every `reconnect_delay_ms` until it succeeds
    /// or `max_connect_attempts` (0 = unlimited) is reached.
    pub async fn connect(config: &SerialConfig) -> Result<Self, SourceError> {
        let mut source = Self {
            client: Some(SerialClient::new(config)),
            port_name: config.port.clone(),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_connect_attempts: config.max_connect_attempts,
        };
        source.open_with_retry().await?;
        Ok(source)
    }

    fn take_client(&mut self) -> Result<SerialClient, SourceError> {
        self.client.take().ok_or_else(|| {
            SourceError::ConnectionFailed(format!(
                "{}: serial reader was abandoned",
                self.port_name
            ))
        })
    }

    /// Run a blocking client operation off the async runtime.
    async fn with_client<T, F>(&mut self, op: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SerialClient) -> Result<T, SourceError> + Send + 'static,
    {
        let mut client = self.take_client()?;
        let (client, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut client);
            (client, result)
        })
        .await
        .map_err(|e| SourceError::ConnectionFailed(format!("serial worker failed: {e}")))?;
        self.client = Some(client);
        result
    }

    async fn open_with_retry(&mut self) -> Result<(), SourceError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            info!(port = %self.port_name, attempt = attempt, "Connecting to serial port");

            match self.with_client(SerialClient::open).await {
                Ok(()) => {
                    info!(port = %self.port_name, "Serial port connected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        port = %self.port_name,
                        attempt = attempt,
                        error = %e,
                        "Failed to connect"
                    );
                    if self.max_connect_attempts > 0 && attempt >= self.max_connect_attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl SampleSource for SerialSource {
    async fn next_line(&mut self) -> Result<SourceEvent, SourceError> {
        loop {
            match self.with_client(SerialClient::read_line).await? {
                Some(line) => return Ok(SourceEvent::Line(line)),
                None => debug!(port = %self.port_name, "No complete line yet, still waiting"),
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), SourceError> {
        if let Some(client) = self.client.as_mut() {
            client.close();
        } else {
            // Reader was abandoned by a cancelled read; start from a fresh handle
            warn!(port = %self.port_name, "Serial reader lost — reopening");
        }
        self.open_with_retry().await
    }

    fn source_name(&self) -> &str {
        "serial"
    }
}

// ============================================================================
// TCP Source (serial-over-network bridge)
// ============================================================================

/// Reads frame lines from a TCP bridge.
///
/// Wraps [`LineStreamClient`], which handles timeouts and reconnection
/// internally; an error from `next_line` means its retries are exhausted.
/// A line read over a fresh connection is preceded by
/// [`SourceEvent::Reconnected`].
pub struct TcpSource {
    client: LineStreamClient,
    pending: Option<String>,
}

impl TcpSource {
    /// Connect to a bridge and return a ready source.
    pub async fn connect(host: &str, port: u16, config: TcpConfig) -> Result<Self, SourceError> {
        let mut client = LineStreamClient::new(host, port, config);
        client.connect().await?;
        Ok(Self {
            client,
            pending: None,
        })
    }
}

#[async_trait]
impl SampleSource for TcpSource {
    async fn next_line(&mut self) -> Result<SourceEvent, SourceError> {
        if let Some(line) = self.pending.take() {
            return Ok(SourceEvent::Line(line));
        }

        let reconnections = self.client.stats().reconnections;
        let line = self.client.read_line().await?;
        if self.client.stats().reconnections > reconnections {
            self.pending = Some(line);
            return Ok(SourceEvent::Reconnected);
        }
        Ok(SourceEvent::Line(line))
    }

    async fn reconnect(&mut self) -> Result<(), SourceError> {
        self.pending = None;
        self.client.reconnect().await
    }

    fn source_name(&self) -> &str {
        "TCP"
    }
}
