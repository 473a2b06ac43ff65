//! Inbound frame extraction.
//!
//! The transport delivers arbitrary chunks; a frame header or body may span
//! several deliveries. [`FrameBuffer`] accumulates chunks and yields complete
//! `[tag][len][payload]` frames, so the decoder only ever sees whole bodies.

use crate::error::{Error, Result};

/// Frame header size: 1 tag byte + 4 length bytes.
const HEADER_LEN: usize = 5;

/// One complete inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type byte
    pub tag: u8,
    /// Frame body (after the length field)
    pub payload: Vec<u8>,
}

/// Accumulates transport chunks and extracts complete frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty frame buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transport delivery.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered, not yet consumed bytes.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next complete frame, if one is fully buffered.
    ///
    /// Returns `Ok(None)` when more data is needed. A declared length under
    /// 4 cannot cover the length field itself and is a fatal protocol error.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let tag = self.buf[0];
        let len = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        if len < 4 {
            return Err(Error::Protocol(format!(
                "frame length {len} cannot cover the length field"
            )));
        }

        let body_len = (len - 4) as usize;
        if self.buf.len() < HEADER_LEN + body_len {
            return Ok(None);
        }

        let payload = self.buf[HEADER_LEN..HEADER_LEN + body_len].to_vec();
        self.buf.drain(..HEADER_LEN + body_len);
        Ok(Some(Frame { tag, payload }))
    }
}
