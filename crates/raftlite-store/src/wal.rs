//! The WAL region: a 32-byte file header followed by (24-byte frame
//! header, page) pairs.

use raftlite_error::{RaftliteError, Result};
use raftlite_types::{PageNumber, PageSize};

use crate::checksum::{checksum, is_native_checksum};

pub const WAL_HEADER_LEN: usize = 32;
pub const FRAME_HEADER_LEN: usize = 24;

/// WAL magic number (big-endian convention, native checksum variant).
pub const WAL_MAGIC_NATIVE: u32 = 0x377f_0683;
/// WAL magic number, big-endian checksum variant.
pub const WAL_MAGIC_BIG_ENDIAN: u32 = 0x377f_0682;

/// The 32-byte WAL header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalHeader {
    pub magic: u32,
    pub format_version: u32,
    pub page_size: PageSize,
    pub checkpoint_seq: u32,
    pub salt1: u32,
    pub salt2: u32,
    pub checksum1: u32,
    pub checksum2: u32,
}

impl WalHeader {
    pub const FORMAT_VERSION: u32 = 3007000;

    /// A fresh header for a brand-new or just-restarted WAL, with salts
    /// supplied by the caller (the spec leaves salt generation to the
    /// store; callers typically use a random source or an incrementing
    /// counter when restarting after a checkpoint).
    #[must_use]
    pub fn new(page_size: PageSize, checkpoint_seq: u32, salt1: u32, salt2: u32, native: bool) -> Self {
        let magic = if native { WAL_MAGIC_NATIVE } else { WAL_MAGIC_BIG_ENDIAN };
        let mut header = Self {
            magic,
            format_version: Self::FORMAT_VERSION,
            page_size,
            checkpoint_seq,
            salt1,
            salt2,
            checksum1: 0,
            checksum2: 0,
        };
        let (c1, c2) = checksum(&header.bytes_before_checksum(), (0, 0), native);
        header.checksum1 = c1;
        header.checksum2 = c2;
        header
    }

    fn bytes_before_checksum(self) -> [u8; 24] {
        let mut buf = [0_u8; 24];
        buf[0..4].copy_from_slice(&self.magic.to_be_bytes());
        buf[4..8].copy_from_slice(&self.format_version.to_be_bytes());
        buf[8..12].copy_from_slice(&self.page_size.as_u32().to_be_bytes());
        buf[12..16].copy_from_slice(&self.checkpoint_seq.to_be_bytes());
        buf[16..20].copy_from_slice(&self.salt1.to_be_bytes());
        buf[20..24].copy_from_slice(&self.salt2.to_be_bytes());
        buf
    }

    #[must_use]
    pub fn is_native_checksum(self) -> bool {
        is_native_checksum(self.magic)
    }

    #[must_use]
    pub fn encode(self) -> [u8; WAL_HEADER_LEN] {
        let mut buf = [0_u8; WAL_HEADER_LEN];
        buf[0..24].copy_from_slice(&self.bytes_before_checksum());
        buf[24..28].copy_from_slice(&self.checksum1.to_be_bytes());
        buf[28..32].copy_from_slice(&self.checksum2.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < WAL_HEADER_LEN {
            return Err(RaftliteError::parse("WAL header shorter than 32 bytes"));
        }
        let magic = u32::from_be_bytes(bytes[0..4].try_into().expect("4 bytes"));
        if magic != WAL_MAGIC_NATIVE && magic != WAL_MAGIC_BIG_ENDIAN {
            return Err(RaftliteError::corrupt(format!("bad WAL magic: {magic:#x}")));
        }
        let format_version = u32::from_be_bytes(bytes[4..8].try_into().expect("4 bytes"));
        let page_size_field = u32::from_be_bytes(bytes[8..12].try_into().expect("4 bytes"));
        let page_size = PageSize::new(page_size_field)
            .ok_or_else(|| RaftliteError::corrupt("invalid WAL page size"))?;
        let checkpoint_seq = u32::from_be_bytes(bytes[12..16].try_into().expect("4 bytes"));
        let salt1 = u32::from_be_bytes(bytes[16..20].try_into().expect("4 bytes"));
        let salt2 = u32::from_be_bytes(bytes[20..24].try_into().expect("4 bytes"));
        let checksum1 = u32::from_be_bytes(bytes[24..28].try_into().expect("4 bytes"));
        let checksum2 = u32::from_be_bytes(bytes[28..32].try_into().expect("4 bytes"));
        let header = Self {
            magic,
            format_version,
            page_size,
            checkpoint_seq,
            salt1,
            salt2,
            checksum1,
            checksum2,
        };
        let native = header.is_native_checksum();
        let (c1, c2) = checksum(&header.bytes_before_checksum(), (0, 0), native);
        if (c1, c2) != (checksum1, checksum2) {
            return Err(RaftliteError::corrupt("WAL header checksum mismatch"));
        }
        Ok(header)
    }
}

/// A single WAL frame header (24 bytes) plus its page payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub page_number: PageNumber,
    /// Database size in pages after commit, for the last frame of a
    /// transaction; zero for every other frame.
    pub commit_marker: u32,
    pub salt1: u32,
    pub salt2: u32,
    pub checksum1: u32,
    pub checksum2: u32,
    pub page: Vec<u8>,
}

impl Frame {
    /// Build the next frame in a WAL, chaining the checksum from `prior`
    /// and the header's salts.
    #[must_use]
    pub fn next(
        header: &WalHeader,
        prior_checksum: (u32, u32),
        page_number: PageNumber,
        commit_marker: u32,
        page: Vec<u8>,
    ) -> Self {
        let native = header.is_native_checksum();
        let mut frame_header_head = [0_u8; 8];
        frame_header_head[0..4].copy_from_slice(&page_number.get().to_be_bytes());
        frame_header_head[4..8].copy_from_slice(&commit_marker.to_be_bytes());
        let after_head = checksum(&frame_header_head, prior_checksum, native);
        let after_page = checksum(&page, after_head, native);
        Self {
            page_number,
            commit_marker,
            salt1: header.salt1,
            salt2: header.salt2,
            checksum1: after_page.0,
            checksum2: after_page.1,
            page,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + self.page.len());
        buf.extend_from_slice(&self.page_number.get().to_be_bytes());
        buf.extend_from_slice(&self.commit_marker.to_be_bytes());
        buf.extend_from_slice(&self.salt1.to_be_bytes());
        buf.extend_from_slice(&self.salt2.to_be_bytes());
        buf.extend_from_slice(&self.checksum1.to_be_bytes());
        buf.extend_from_slice(&self.checksum2.to_be_bytes());
        buf.extend_from_slice(&self.page);
        buf
    }

    /// Decode one frame, verifying its checksum chains from `prior`.
    /// Returns `Ok(None)` if the header's salts don't match `header`
    /// (the usual signal that this slot holds a stale, pre-restart frame).
    pub fn decode(
        bytes: &[u8],
        page_size: PageSize,
        header: &WalHeader,
        prior_checksum: (u32, u32),
    ) -> Result<Option<Self>> {
        if bytes.len() < FRAME_HEADER_LEN + page_size.as_usize() {
            return Err(RaftliteError::parse("frame shorter than header + page"));
        }
        let page_number = u32::from_be_bytes(bytes[0..4].try_into().expect("4 bytes"));
        let Some(page_number) = PageNumber::new(page_number) else {
            return Ok(None);
        };
        let commit_marker = u32::from_be_bytes(bytes[4..8].try_into().expect("4 bytes"));
        let salt1 = u32::from_be_bytes(bytes[8..12].try_into().expect("4 bytes"));
        let salt2 = u32::from_be_bytes(bytes[12..16].try_into().expect("4 bytes"));
        let checksum1 = u32::from_be_bytes(bytes[16..20].try_into().expect("4 bytes"));
        let checksum2 = u32::from_be_bytes(bytes[20..24].try_into().expect("4 bytes"));
        if salt1 != header.salt1 || salt2 != header.salt2 {
            return Ok(None);
        }
        let page = bytes[FRAME_HEADER_LEN..FRAME_HEADER_LEN + page_size.as_usize()].to_vec();

        let native = header.is_native_checksum();
        let mut head = [0_u8; 8];
        head[0..4].copy_from_slice(&page_number.get().to_be_bytes());
        head[4..8].copy_from_slice(&commit_marker.to_be_bytes());
        let after_head = checksum(&head, prior_checksum, native);
        let after_page = checksum(&page, after_head, native);
        if after_page != (checksum1, checksum2) {
            return Ok(None);
        }

        Ok(Some(Self {
            page_number,
            commit_marker,
            salt1,
            salt2,
            checksum1,
            checksum2,
            page,
        }))
    }

    #[must_use]
    pub fn is_commit(&self) -> bool {
        self.commit_marker != 0
    }

    #[must_use]
    pub fn checksum(&self) -> (u32, u32) {
        (self.checksum1, self.checksum2)
    }
}

/// Testable property P3: frame count derived from a WAL file's byte size.
#[must_use]
pub fn frame_count(wal_size: u64, page_size: PageSize) -> u64 {
    if wal_size < WAL_HEADER_LEN as u64 {
        return 0;
    }
    let frame_len = (FRAME_HEADER_LEN + page_size.as_usize()) as u64;
    (wal_size - WAL_HEADER_LEN as u64) / frame_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_encode_decode() {
        let header = WalHeader::new(PageSize::DEFAULT, 0, 111, 222, true);
        let bytes = header.encode();
        let decoded = WalHeader::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut bytes = WalHeader::new(PageSize::DEFAULT, 0, 1, 2, true).encode();
        bytes[0] = 0xFF;
        assert!(WalHeader::decode(&bytes).is_err());
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut bytes = WalHeader::new(PageSize::DEFAULT, 0, 1, 2, true).encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(WalHeader::decode(&bytes).is_err());
    }

    #[test]
    fn frame_chain_round_trips() {
        let header = WalHeader::new(PageSize::new(512).unwrap(), 0, 1, 2, true);
        let seed = (header.checksum1, header.checksum2);
        let page = vec![9_u8; 512];
        let frame = Frame::next(&header, seed, PageNumber::ONE, 1, page.clone());
        let encoded = frame.encode();
        let decoded = Frame::decode(&encoded, PageSize::new(512).unwrap(), &header, seed)
            .unwrap()
            .expect("frame should decode");
        assert_eq!(decoded, frame);
        assert!(decoded.is_commit());
    }

    #[test]
    fn frame_count_formula_matches_p3() {
        let page_size = PageSize::new(4096).unwrap();
        let frame_len = (FRAME_HEADER_LEN + 4096) as u64;
        assert_eq!(frame_count(WAL_HEADER_LEN as u64, page_size), 0);
        assert_eq!(frame_count(WAL_HEADER_LEN as u64 + frame_len, page_size), 1);
        assert_eq!(frame_count(WAL_HEADER_LEN as u64 + frame_len * 3, page_size), 3);
    }
}
