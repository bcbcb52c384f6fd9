//! The four Raft log-entry command variants and their wire codec.

use raftlite_codec::{Header, Reader, Writer};
use raftlite_error::{RaftliteError, Result};

pub const COMMAND_OPEN: u8 = 1;
pub const COMMAND_FRAMES: u8 = 2;
pub const COMMAND_UNDO: u8 = 3;
pub const COMMAND_CHECKPOINT: u8 = 4;

/// A batch of WAL frames carried by a `FRAMES` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramesBody {
    pub page_size: u16,
    pub page_numbers: Vec<u64>,
    pub pages: Vec<Vec<u8>>,
}

/// One Raft FSM command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open {
        filename: String,
    },
    Frames {
        filename: String,
        tx_id: u64,
        truncate: u32,
        is_commit: bool,
        frames: FramesBody,
    },
    Undo {
        tx_id: u64,
    },
    Checkpoint {
        filename: String,
    },
}

impl Command {
    #[must_use]
    pub fn kind(&self) -> u8 {
        match self {
            Self::Open { .. } => COMMAND_OPEN,
            Self::Frames { .. } => COMMAND_FRAMES,
            Self::Undo { .. } => COMMAND_UNDO,
            Self::Checkpoint { .. } => COMMAND_CHECKPOINT,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        Header::new(self.kind()).encode(&mut w);
        match self {
            Self::Open { filename } | Self::Checkpoint { filename } => {
                w.put_text(filename);
            }
            Self::Frames {
                filename,
                tx_id,
                truncate,
                is_commit,
                frames,
            } => {
                w.put_text(filename);
                w.put_u64(*tx_id);
                w.put_u32(*truncate);
                w.put_u8(u8::from(*is_commit));
                w.put_u8(0);
                w.put_u16(0);
                let n_pages = u32::try_from(frames.page_numbers.len()).expect("frame batch fits u32");
                w.put_u32(n_pages);
                w.put_u16(frames.page_size);
                w.put_u16(0);
                for &pgno in &frames.page_numbers {
                    w.put_u64(pgno);
                }
                for page in &frames.pages {
                    w.put_bytes(page);
                }
            }
            Self::Undo { tx_id } => {
                w.put_u64(*tx_id);
            }
        }
        w.into_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let header = Header::decode(&mut r)?;
        match header.kind {
            COMMAND_OPEN => Ok(Self::Open {
                filename: r.get_text(None)?,
            }),
            COMMAND_CHECKPOINT => Ok(Self::Checkpoint {
                filename: r.get_text(None)?,
            }),
            COMMAND_UNDO => Ok(Self::Undo { tx_id: r.get_u64()? }),
            COMMAND_FRAMES => {
                let filename = r.get_text(None)?;
                let tx_id = r.get_u64()?;
                let truncate = r.get_u32()?;
                let is_commit = r.get_u8()? != 0;
                let _pad1 = r.get_u8()?;
                let _pad2 = r.get_u16()?;
                let n_pages = r.get_u32()? as usize;
                let page_size = r.get_u16()?;
                let _pad3 = r.get_u16()?;
                let mut page_numbers = Vec::with_capacity(n_pages);
                for _ in 0..n_pages {
                    page_numbers.push(r.get_u64()?);
                }
                let mut pages = Vec::with_capacity(n_pages);
                for _ in 0..n_pages {
                    pages.push(r.get_bytes(page_size as usize)?.to_vec());
                }
                Ok(Self::Frames {
                    filename,
                    tx_id,
                    truncate,
                    is_commit,
                    frames: FramesBody {
                        page_size,
                        page_numbers,
                        pages,
                    },
                })
            }
            other => Err(RaftliteError::protocol(format!("unknown command type: {other}"))),
        }
    }
}
