//! Wire encoding for [`raftlite_types::Value`]/[`raftlite_types::Tuple`] and
//! for the 4-byte command header shared by every FSM command.
//!
//! All integers are little-endian. Text is `round_up_to_8(strlen + 1)` bytes
//! (the `+1` covers a trailing NUL, kept even though Rust strings aren't
//! NUL-terminated, so the wire layout matches the spec exactly); blobs are
//! an 8-byte little-endian length word followed by `round_up_to_8(len)`
//! bytes of zero-padded payload.

mod reader;
mod tuple_codec;
mod writer;

pub use reader::Reader;
pub use tuple_codec::{decode_params_tuple, decode_row_tuple, encode_params_tuple, encode_row_tuple};
pub use writer::Writer;

use raftlite_error::{RaftliteError, Result};

/// Round `n` up to the next multiple of 8.
#[must_use]
pub const fn round_up_to_8(n: usize) -> usize {
    (n + 7) & !7
}

/// The 8-byte header shared by every command.
///
/// Layout: `format` (1 byte, must be 1), `kind` (1 byte), two reserved
/// zero bytes, then a reserved zero `u32` — the whole header is one
/// 8-byte-aligned word, matching the alignment convention used for every
/// other wire structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub format: u8,
    pub kind: u8,
}

impl Header {
    pub const CURRENT_FORMAT: u8 = 1;
    pub const WIRE_LEN: usize = 8;

    #[must_use]
    pub fn new(kind: u8) -> Self {
        Self {
            format: Self::CURRENT_FORMAT,
            kind,
        }
    }

    pub fn encode(self, out: &mut Writer) {
        out.put_u8(self.format);
        out.put_u8(self.kind);
        out.put_u8(0);
        out.put_u8(0);
        out.put_u32(0);
    }

    pub fn decode(src: &mut Reader) -> Result<Self> {
        let format = src.get_u8()?;
        let kind = src.get_u8()?;
        let _reserved_bytes = src.get_bytes(2)?;
        let _reserved_word = src.get_u32()?;
        if format != Self::CURRENT_FORMAT {
            return Err(RaftliteError::protocol(format!(
                "unsupported command format byte: {format}"
            )));
        }
        Ok(Self { format, kind })
    }
}
