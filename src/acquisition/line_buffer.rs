//! Length-capped line assembly shared by the transport clients.
//!
//! A sensor frame is well under a hundred bytes. A stream that stops
//! sending newlines (wrong baud rate, binary garbage, a misbehaving bridge)
//! must not grow the buffer without limit, so reads go through a `take`
//! sized by [`LineBuffer::remaining`] and anything longer than the cap is
//! dropped up to and including its newline.

use tracing::warn;

#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
    /// Inside an oversized line; bytes are dropped until the next newline.
    discarding: bool,
    oversized: u64,
}

impl LineBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len.min(256)),
            max_len: max_len.max(1),
            discarding: false,
            oversized: 0,
        }
    }

    /// Byte limit for the next read. Never zero, so a zero-byte read still
    /// means end of stream.
    pub fn remaining(&self) -> u64 {
        (self.max_len - self.buf.len()) as u64
    }

    /// Target for `read_until`.
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    /// Inspect the buffer after a read appended to it.
    ///
    /// Returns the finished line (newline included) when one is complete.
    /// `None` means more bytes are needed.
    pub fn complete(&mut self) -> Option<String> {
        if self.buf.last() == Some(&b'\n') {
            let dropped = std::mem::take(&mut self.discarding);
            let line = (!dropped).then(|| String::from_utf8_lossy(&self.buf).into_owned());
            self.buf.clear();
            return line;
        }

        if self.buf.len() >= self.max_len {
            if !self.discarding {
                self.oversized += 1;
                warn!(
                    max_bytes = self.max_len,
                    total_oversized = self.oversized,
                    "Line exceeds length limit, dropping it"
                );
            }
            self.discarding = true;
            self.buf.clear();
        }
        None
    }

    /// Flush a final unterminated line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let dropped = std::mem::take(&mut self.discarding);
        let line = (!dropped && !self.buf.is_empty())
            .then(|| String::from_utf8_lossy(&self.buf).into_owned());
        self.buf.clear();
        line
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Lines dropped for exceeding the cap.
    pub fn oversized(&self) -> u64 {
        self.oversized
    }
}
