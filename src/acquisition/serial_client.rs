//! Serial (UART) line reader for the sensor board.
//!
//! Blocking by nature; `pipeline::source::SerialSource` runs it on the
//! blocking thread pool.

use super::{LineBuffer, SourceError};
use crate::config::{defaults, SerialConfig};
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::time::Duration;

pub struct SerialClient {
    port_name: String,
    baud: u32,
    read_timeout: Duration,
    reader: Option<BufReader<Box<dyn SerialPort>>>,
    /// Bytes of a line that was interrupted by a read timeout.
    pending: LineBuffer,
    lines_received: u64,
}

impl SerialClient {
    pub fn new(config: &SerialConfig) -> Self {
        Self {
            port_name: config.port.clone(),
            baud: config.baud,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            reader: None,
            pending: LineBuffer::new(defaults::MAX_LINE_BYTES),
            lines_received: 0,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    pub fn lines_received(&self) -> u64 {
        self.lines_received
    }

    pub fn oversized_lines(&self) -> u64 {
        self.pending.oversized()
    }

    /// Single open attempt. Retry policy belongs to the caller.
    pub fn open(&mut self) -> Result<(), SourceError> {
        let port = serialport::new(&self.port_name, self.baud)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| {
                SourceError::ConnectionFailed(format!(
                    "{} @ {} baud: {}",
                    self.port_name, self.baud, e
                ))
            })?;

        self.reader = Some(BufReader::new(port));
        self.pending.clear();
        Ok(())
    }

    pub fn close(&mut self) {
        self.reader = None;
        self.pending.clear();
    }

    /// Read one newline-terminated line.
    ///
    /// Returns `Ok(None)` when the port timed out before a full line arrived;
    /// the partial bytes are kept for the next call. Invalid UTF-8 is replaced
    /// so the frame parser rejects the affected token instead of the read
    /// failing. Lines longer than `MAX_LINE_BYTES` are dropped.
    pub fn read_line(&mut self) -> Result<Option<String>, SourceError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SourceError::ConnectionFailed("Serial port not open".to_string()))?;

        let limit = self.pending.remaining();
        match reader.by_ref().take(limit).read_until(b'\n', self.pending.bytes_mut()) {
            Ok(0) => {
                self.close();
                Err(SourceError::ConnectionClosed)
            }
            Ok(_) => {
                let line = self.pending.complete();
                if line.is_some() {
                    self.lines_received += 1;
                }
                Ok(line)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => {
                self.close();
                Err(SourceError::Io(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_before_open_fails() {
        let mut client = SerialClient::new(&SerialConfig::default());
        assert!(!client.is_open());
        assert!(matches!(
            client.read_line(),
            Err(SourceError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let config = SerialConfig {
            port: "/dev/touchstrip-does-not-exist".to_string(),
            ..SerialConfig::default()
        };
        let mut client = SerialClient::new(&config);
        let err = client.open().unwrap_err();
        assert!(err.to_string().contains("/dev/touchstrip-does-not-exist"));
        assert!(!client.is_open());
    }
}
