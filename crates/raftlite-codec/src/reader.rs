//! Cursor-based little-endian byte reader.
//!
//! Every `get_*` method checks that enough bytes remain before advancing
//! the cursor; on a short read the cursor position is left untouched, so a
//! caller can retry once more data has arrived.

use raftlite_error::{RaftliteError, Result};

use crate::round_up_to_8;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(RaftliteError::parse(format!(
                "need {n} bytes, only {} remain",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8 bytes")))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().expect("8 bytes")))
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().expect("8 bytes")))
    }

    /// Read a NUL-terminated, zero-padded text field occupying
    /// `round_up_to_8(strlen + 1)` bytes. `declared_len` is the number of
    /// meaningful (pre-NUL) bytes, if already known from a length-prefixed
    /// context; pass `None` to scan for the first NUL within the reader.
    pub fn get_text(&mut self, declared_len: Option<usize>) -> Result<String> {
        let strlen = match declared_len {
            Some(n) => n,
            None => self
                .buf[self.pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| RaftliteError::parse("unterminated text field"))?,
        };
        let total = round_up_to_8(strlen + 1);
        let field = self.take(total)?;
        let text = std::str::from_utf8(&field[..strlen])
            .map_err(|e| RaftliteError::parse(format!("invalid utf-8 in text field: {e}")))?;
        Ok(text.to_owned())
    }

    /// Read an 8-byte length word followed by `round_up_to_8(len)` bytes
    /// of payload, returning only the unpadded payload.
    pub fn get_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u64()? as usize;
        let padded = round_up_to_8(len);
        let field = self.take(padded)?;
        Ok(field[..len].to_vec())
    }
}
