//! Append-only little-endian byte buffer builder.

use crate::round_up_to_8;

/// Accumulates encoded bytes. Never fails — callers size inputs correctly
/// before handing them to a `Writer`.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `text` as `round_up_to_8(len + 1)` bytes: the string bytes,
    /// one NUL terminator, then zero padding up to the 8-byte boundary.
    pub fn put_text(&mut self, text: &str) {
        let total = round_up_to_8(text.len() + 1);
        self.put_bytes(text.as_bytes());
        self.buf.resize(self.buf.len() + (total - text.len()), 0);
    }

    /// Write `blob` as an 8-byte length word followed by
    /// `round_up_to_8(len)` bytes of zero-padded payload.
    pub fn put_blob(&mut self, blob: &[u8]) {
        self.put_u64(blob.len() as u64);
        let padded = round_up_to_8(blob.len());
        self.put_bytes(blob);
        self.buf.resize(self.buf.len() + (padded - blob.len()), 0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
