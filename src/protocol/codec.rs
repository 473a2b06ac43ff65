//! PostgreSQL wire protocol encoding and decoding primitives.
//!
//! PostgreSQL uses big-endian (network byte order) for all integers.
//! Strings are NUL-terminated unless a length is carried out of band.

use zerocopy::FromBytes;
use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE};

use crate::error::{Error, Result};

/// Message encoder that handles the length field.
///
/// PostgreSQL message format:
/// - Type byte (1 byte, absent for startup-phase messages) - NOT included in length
/// - Length (4 bytes, big-endian) - includes itself
/// - Payload (Length - 4 bytes)
pub struct Encoder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> Encoder<'a> {
    /// Start a message with a type byte.
    pub fn new(buf: &'a mut Vec<u8>, tag: u8) -> Self {
        buf.push(tag);
        Self::untagged(buf)
    }

    /// Start a message without a type byte (StartupMessage, SSLRequest).
    /// The length prefix is still emitted.
    pub fn untagged(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]); // Placeholder for length
        Self { buf, start }
    }

    /// Append a 2-byte big-endian signed integer.
    pub fn push_int16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a 4-byte big-endian signed integer.
    pub fn push_int32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Append string bytes followed by a NUL terminator.
    pub fn push_cstring(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// Append string bytes with no terminator.
    pub fn push_raw_string(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Append raw bytes with no terminator.
    pub fn push_raw(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append cstring key/value pairs terminated by an empty cstring.
    /// Used for StartupMessage options.
    pub fn push_hash(&mut self, pairs: &[(&str, &str)]) {
        for (name, value) in pairs {
            self.push_cstring(name);
            self.push_cstring(value);
        }
        self.buf.push(0);
    }

    /// Fill in the length field covering itself plus the payload.
    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as i32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}

/// Cursor-advancing decoder over one frame body.
///
/// Every read fails with [`Error::Underflow`] when fewer bytes remain than
/// the field requires. Underflow means the frame boundary can no longer be
/// trusted, so callers treat it as fatal to the connection.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Create a decoder over a complete frame body.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Returns true when all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(Error::Underflow {
                needed: n,
                available: self.data.len(),
            });
        }
        let (head, rest) = self.data.split_at(n);
        self.data = rest;
        Ok(head)
    }

    /// Read a single byte (message tag or sub-code).
    pub fn shift_code(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a 2-byte big-endian signed integer.
    pub fn shift_int16(&mut self) -> Result<i16> {
        let bytes = self.take(2)?;
        let value = I16BE::ref_from_bytes(bytes)
            .map_err(|e| Error::Protocol(format!("shift_int16: {e:?}")))?;
        Ok(value.get())
    }

    /// Read a 4-byte big-endian signed integer.
    pub fn shift_int32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        let value = I32BE::ref_from_bytes(bytes)
            .map_err(|e| Error::Protocol(format!("shift_int32: {e:?}")))?;
        Ok(value.get())
    }

    /// Read up to the next NUL, consuming the terminator.
    pub fn shift_cstring(&mut self) -> Result<&'a str> {
        match memchr::memchr(0, self.data) {
            Some(pos) => {
                let bytes = &self.data[..pos];
                self.data = &self.data[pos + 1..];
                simdutf8::compat::from_utf8(bytes)
                    .map_err(|e| Error::Decode(format!("shift_cstring: invalid UTF-8: {e}")))
            }
            None => Err(Error::Underflow {
                needed: self.data.len() + 1,
                available: self.data.len(),
            }),
        }
    }

    /// Read exactly `n` raw bytes.
    pub fn shift_raw_string(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read cstrings until an empty one terminates the list.
    ///
    /// Used for ErrorResponse/NoticeResponse field lists where each entry is
    /// a 1-byte field code followed by text.
    pub fn shift_multi_cstring(&mut self) -> Result<Vec<&'a str>> {
        let mut entries = Vec::new();
        loop {
            let entry = self.shift_cstring()?;
            if entry.is_empty() {
                return Ok(entries);
            }
            entries.push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_roundtrip() {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf, b'T');
        enc.push_int16(-2);
        enc.push_int32(0x0102_0304);
        enc.finish();

        assert_eq!(buf[0], b'T');
        let mut dec = Decoder::new(&buf[1..]);
        assert_eq!(dec.shift_int32().unwrap(), 10); // length covers itself
        assert_eq!(dec.shift_int16().unwrap(), -2);
        assert_eq!(dec.shift_int32().unwrap(), 0x0102_0304);
        assert!(dec.is_empty());
    }

    #[test]
    fn cstring_roundtrip() {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf, b'Q');
        enc.push_cstring("SELECT 1");
        enc.finish();

        let mut dec = Decoder::new(&buf[5..]);
        assert_eq!(dec.shift_cstring().unwrap(), "SELECT 1");
        assert!(dec.is_empty());
    }

    #[test]
    fn untagged_length_covers_itself() {
        let mut buf = Vec::new();
        let mut enc = Encoder::untagged(&mut buf);
        enc.push_int32(196608);
        enc.finish();

        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[0..4], &8_i32.to_be_bytes());
        assert_eq!(&buf[4..8], &196608_i32.to_be_bytes());
    }

    #[test]
    fn hash_and_multi_cstring() {
        let mut buf = Vec::new();
        let mut enc = Encoder::untagged(&mut buf);
        enc.push_hash(&[("user", "alice"), ("database", "db")]);
        enc.finish();

        let mut dec = Decoder::new(&buf[4..]);
        let entries = dec.shift_multi_cstring().unwrap();
        assert_eq!(entries, vec!["user", "alice", "database", "db"]);
        assert!(dec.is_empty());
    }

    #[test]
    fn underflow_is_reported() {
        let mut dec = Decoder::new(&[0x01]);
        match dec.shift_int32() {
            Err(Error::Underflow {
                needed: 4,
                available: 1,
            }) => {}
            other => panic!("expected underflow, got {:?}", other),
        }
    }

    #[test]
    fn missing_nul_is_underflow() {
        let mut dec = Decoder::new(b"abc");
        assert!(matches!(
            dec.shift_cstring(),
            Err(Error::Underflow { .. })
        ));
    }

    #[test]
    fn raw_string_exact() {
        let mut dec = Decoder::new(b"abcdef");
        assert_eq!(dec.shift_raw_string(4).unwrap(), b"abcd");
        assert_eq!(dec.remaining(), 2);
    }
}
