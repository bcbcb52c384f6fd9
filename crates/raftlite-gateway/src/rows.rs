//! Row-stream wire framing for `query`/`query_sql` responses (spec §4.7):
//! a run of row-format tuples terminated by one of two 8-byte sentinels.

use raftlite_codec::{encode_row_tuple, Writer};
use raftlite_types::Tuple;

/// More rows remain; the client must issue another `query` call to
/// continue draining the statement.
pub const ROW_STREAM_PART: u64 = 0xEEEE_EEEE_EEEE_EEEE;
/// The statement is exhausted; this is the last batch.
pub const ROW_STREAM_DONE: u64 = 0xFFFF_FFFF_FFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eof {
    Part,
    Done,
}

impl Eof {
    #[must_use]
    pub const fn sentinel(self) -> u64 {
        match self {
            Self::Part => ROW_STREAM_PART,
            Self::Done => ROW_STREAM_DONE,
        }
    }
}

/// Encode a batch of rows followed by the PART/DONE sentinel, each row
/// prefixed by its own byte length so a reader can step through them
/// without knowing arity ahead of time.
#[must_use]
pub fn encode_row_batch(rows: &[Tuple], eof: Eof) -> Vec<u8> {
    let mut w = Writer::with_capacity(64 * rows.len().max(1));
    w.put_u64(rows.len() as u64);
    for row in rows {
        let encoded = encode_row_tuple(row);
        w.put_u64(encoded.len() as u64);
        w.put_bytes(&encoded);
    }
    w.put_u64(eof.sentinel());
    w.into_vec()
}
