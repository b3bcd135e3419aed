//! TCP line-stream client
//!
//! For sensor boards exposed through a serial-to-network bridge (ser2net,
//! ESP-Link and similar). The wire format is the same newline-terminated
//! frame text the board prints on its UART.

use super::{LineBuffer, SourceError};
use crate::config::{defaults, TcpConfig};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{Duration, Instant};

/// TCP line client with reconnection and timeout resilience
pub struct LineStreamClient {
    host: String,
    port: u16,
    config: TcpConfig,
    stream: Option<BufReader<TcpStream>>,
    line_buffer: LineBuffer,
    last_data: Option<Instant>,
    /// Total lines received since creation
    lines_received: u64,
    /// Total reconnections performed
    reconnections: u64,
    /// Total timeouts encountered
    timeouts: u64,
}

/// Connection health statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStreamStats {
    pub connected: bool,
    pub lines_received: u64,
    pub reconnections: u64,
    pub timeouts: u64,
    pub oversized_lines: u64,
}

impl LineStreamClient {
    pub fn new(host: &str, port: u16, config: TcpConfig) -> Self {
        Self {
            host: host.to_string(),
            port,
            config,
            stream: None,
            line_buffer: LineBuffer::new(defaults::MAX_LINE_BYTES),
            last_data: None,
            lines_received: 0,
            reconnections: 0,
            timeouts: 0,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Connect with timeout and TCP keepalive.
    pub async fn connect(&mut self) -> Result<(), SourceError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.address();
        tracing::info!(address = %addr, "Connecting to sensor stream");

        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SourceError::Timeout)?
            .map_err(|e| SourceError::ConnectionFailed(format!("{addr}: {e}")))?;

        // Keepalive so a powered-off bridge is noticed
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(30))
            .with_interval(std::time::Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);
        let _ = stream.set_nodelay(true);

        self.stream = Some(BufReader::new(stream));
        self.line_buffer.clear();
        self.last_data = Some(Instant::now());

        tracing::info!(address = %addr, "Sensor stream connected");
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(ref mut reader) = self.stream {
            let _ = reader.get_mut().shutdown().await;
        }
        self.stream = None;
        self.line_buffer.clear();
    }

    /// Reconnect with exponential backoff.
    ///
    /// Returns Ok(()) when reconnected, Err if max attempts exhausted.
    pub async fn reconnect(&mut self) -> Result<(), SourceError> {
        self.disconnect().await;

        let max_attempts = self.config.max_reconnect_attempts;
        for attempt in 1..=max_attempts {
            let delay_secs = self
                .config
                .initial_reconnect_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt - 1))
                .min(self.config.max_reconnect_delay_secs);

            tracing::warn!(
                attempt = attempt,
                max_attempts = max_attempts,
                delay_secs = delay_secs,
                "Sensor stream reconnecting after failure"
            );

            tokio::time::sleep(Duration::from_secs(delay_secs)).await;

            match self.connect().await {
                Ok(()) => {
                    self.reconnections += 1;
                    tracing::info!(
                        attempt = attempt,
                        total_reconnections = self.reconnections,
                        "Sensor stream reconnection successful"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt = attempt, error = %e, "Reconnection attempt failed");
                }
            }
        }

        tracing::error!(
            max_attempts = max_attempts,
            "Sensor stream reconnection exhausted — all attempts failed"
        );
        Err(SourceError::ConnectionFailed(format!(
            "Failed to reconnect to {} after {} attempts",
            self.address(),
            max_attempts
        )))
    }

    /// Read the next line, reconnecting once on timeout or drop.
    pub async fn read_line(&mut self) -> Result<String, SourceError> {
        if self.stream.is_none() {
            self.connect().await?;
        }

        match self.read_line_inner().await {
            Ok(line) => Ok(line),
            Err(SourceError::Timeout) => {
                self.timeouts += 1;
                tracing::warn!(
                    timeout_secs = self.config.read_timeout_secs,
                    total_timeouts = self.timeouts,
                    "Sensor stream silent — attempting reconnect"
                );
                self.reconnect().await?;
                self.read_line_inner().await
            }
            Err(SourceError::ConnectionClosed) => {
                tracing::warn!("Sensor stream closed by peer — attempting reconnect");
                self.reconnect().await?;
                self.read_line_inner().await
            }
            Err(e) => Err(e),
        }
    }

    /// Inner line read with timeout. Does NOT auto-reconnect.
    async fn read_line_inner(&mut self) -> Result<String, SourceError> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| SourceError::ConnectionFailed("Not connected".to_string()))?;

        let read_timeout = Duration::from_secs(self.config.read_timeout_secs);
        loop {
            let limit = self.line_buffer.remaining();
            let mut limited = (&mut *reader).take(limit);
            let read = limited.read_until(b'\n', self.line_buffer.bytes_mut());
            let bytes = tokio::time::timeout(read_timeout, read)
                .await
                .map_err(|_| SourceError::Timeout)??;

            if bytes == 0 {
                self.stream = None;
                return Err(SourceError::ConnectionClosed);
            }

            // Oversized lines still count as data for the silence timeout
            self.last_data = Some(Instant::now());
            if let Some(line) = self.line_buffer.complete() {
                self.lines_received += 1;
                return Ok(line);
            }
        }
    }

    /// Time since the last line, if any arrived.
    pub fn silent_for(&self) -> Option<Duration> {
        self.last_data.map(|t| t.elapsed())
    }

    pub fn stats(&self) -> LineStreamStats {
        LineStreamStats {
            connected: self.stream.is_some(),
            lines_received: self.lines_received,
            reconnections: self.reconnections,
            timeouts: self.timeouts,
            oversized_lines: self.line_buffer.oversized(),
        }
    }
}
