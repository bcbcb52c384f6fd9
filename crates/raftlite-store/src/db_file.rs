//! A database file object: main-DB page array, its associated WAL region,
//! and shm region, keyed by filename in the [`crate::Store`].

use raftlite_error::{RaftliteError, Result};
use raftlite_types::{PageNumber, PageSize};

use crate::main_db::MainDb;
use crate::shm::ShmRegion;
use crate::wal::{Frame, WalHeader};

/// One named database: main file, WAL, and shm, plus an open-handle
/// refcount used by `xDelete`'s refusal rule.
#[derive(Debug)]
pub struct DatabaseFile {
    filename: String,
    main: MainDb,
    wal_header: Option<WalHeader>,
    frames: Vec<Frame>,
    shm: ShmRegion,
    refcount: u32,
    /// The mxFrame value visible to other connections: the physical WAL
    /// tail (`frames.len()`) can run ahead of this while a commit is
    /// polled but not yet applied/published.
    published_mx_frame: u64,
}

impl DatabaseFile {
    #[must_use]
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            main: MainDb::new(),
            wal_header: None,
            frames: Vec::new(),
            shm: ShmRegion::new(),
            refcount: 0,
            published_mx_frame: 0,
        }
    }

    #[must_use]
    pub fn published_mx_frame(&self) -> u64 {
        self.published_mx_frame
    }

    pub fn set_published_mx_frame(&mut self, value: u64) {
        self.published_mx_frame = value;
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn main(&self) -> &MainDb {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut MainDb {
        &mut self.main
    }

    #[must_use]
    pub fn shm(&self) -> &ShmRegion {
        &self.shm
    }

    pub fn shm_mut(&mut self) -> &mut ShmRegion {
        &mut self.shm
    }

    #[must_use]
    pub fn mx_frame(&self) -> u64 {
        self.frames.len() as u64
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn open_handle(&mut self) {
        self.refcount += 1;
    }

    pub fn close_handle(&mut self) {
        self.refcount = self.refcount.saturating_sub(1);
    }

    /// Resolve the WAL's page size lazily from the main DB's page size,
    /// and initialize a fresh WAL header if this is the first frame.
    fn ensure_wal_header(&mut self) -> Result<&WalHeader> {
        if self.wal_header.is_none() {
            let page_size = self
                .main
                .page_size()
                .ok_or_else(|| RaftliteError::protocol("WAL page size unresolved before main DB header write"))?;
            self.wal_header = Some(WalHeader::new(page_size, 0, 1, 2, true));
        }
        Ok(self.wal_header.as_ref().expect("just set"))
    }

    /// Append one frame at the WAL tail, chaining its checksum from the
    /// previous frame (or the header, if this is the first frame).
    pub fn append_frame(&mut self, page_number: PageNumber, commit_marker: u32, page: Vec<u8>) -> Result<()> {
        let header = *self.ensure_wal_header()?;
        let seed = self
            .frames
            .last()
            .map_or((header.checksum1, header.checksum2), Frame::checksum);
        let frame = Frame::next(&header, seed, page_number, commit_marker, page);
        self.frames.push(frame);
        Ok(())
    }

    /// Truncate the WAL's in-memory frame list back to `mx_frame` (used by
    /// `VfsAbort`). Only ever called with a prefix length, never to grow.
    pub fn truncate_wal_frames(&mut self, mx_frame: u64) -> Result<()> {
        let mx_frame = mx_frame as usize;
        if mx_frame > self.frames.len() {
            return Err(RaftliteError::protocol("abort truncate would grow the WAL"));
        }
        self.frames.truncate(mx_frame);
        Ok(())
    }

    /// Truncate the WAL to zero frames as part of a full checkpoint. Any
    /// other non-zero truncation target is refused per the specification.
    pub fn checkpoint_truncate(&mut self) -> Result<()> {
        self.frames.clear();
        self.wal_header = None;
        self.published_mx_frame = 0;
        Ok(())
    }

    /// Apply the frames of a committed transaction to the main DB pages,
    /// as a full checkpoint would (used by `VfsCheckpoint`'s page-store
    /// half, independent of the truncate step).
    pub fn replay_frames_into_main(&mut self) -> Result<()> {
        for frame in self.frames.clone() {
            self.main.write_page(frame.page_number, &frame.page)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn page_size(&self) -> Option<PageSize> {
        self.main.page_size()
    }

    /// Install a WAL header written verbatim by a caller (the VFS layer,
    /// relaying the SQL engine's own header write). Resets the frame list,
    /// matching a fresh or just-restarted WAL.
    pub fn set_wal_header_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let header = WalHeader::decode(bytes)?;
        self.wal_header = Some(header);
        self.frames.clear();
        Ok(())
    }

    /// Append a frame given as already-encoded wire bytes (header +
    /// page), validating its checksum chain against the current tail.
    pub fn append_raw_frame_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let header = *self.ensure_wal_header()?;
        let page_size = header.page_size;
        let seed = self
            .frames
            .last()
            .map_or((header.checksum1, header.checksum2), Frame::checksum);
        let frame = Frame::decode(bytes, page_size, &header, seed)?
            .ok_or_else(|| RaftliteError::corrupt("WAL frame failed checksum or salt validation"))?;
        self.frames.push(frame);
        Ok(())
    }

    /// The WAL file's current byte length: header plus every frame.
    #[must_use]
    pub fn wal_byte_len(&self) -> u64 {
        let Some(header) = self.wal_header else {
            return 0;
        };
        let frame_len = crate::wal::FRAME_HEADER_LEN + header.page_size.as_usize();
        (crate::wal::WAL_HEADER_LEN + self.frames.len() * frame_len) as u64
    }

    /// Render the WAL region as the flat byte stream the VFS exposes to
    /// readers (header, then each frame in order).
    #[must_use]
    pub fn wal_bytes(&self) -> Vec<u8> {
        let Some(header) = self.wal_header else {
            return Vec::new();
        };
        let mut out = header.encode().to_vec();
        for frame in &self.frames {
            out.extend_from_slice(&frame.encode());
        }
        out
    }

    #[must_use]
    pub fn wal_header(&self) -> Option<WalHeader> {
        self.wal_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_page(page_size: u16) -> Vec<u8> {
        let mut page = vec![0_u8; 4096];
        page[16..18].copy_from_slice(&page_size.to_be_bytes());
        page
    }

    #[test]
    fn appending_frames_chains_checksums() {
        let mut db = DatabaseFile::new("test.db");
        db.main_mut().write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        db.append_frame(PageNumber::ONE, 1, vec![0_u8; 4096]).unwrap();
        assert_eq!(db.mx_frame(), 1);
        assert!(db.frames()[0].is_commit());
    }

    #[test]
    fn abort_truncates_tail_only() {
        let mut db = DatabaseFile::new("test.db");
        db.main_mut().write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        db.append_frame(PageNumber::ONE, 0, vec![1_u8; 4096]).unwrap();
        db.append_frame(PageNumber::ONE, 1, vec![2_u8; 4096]).unwrap();
        db.truncate_wal_frames(1).unwrap();
        assert_eq!(db.mx_frame(), 1);
    }

    #[test]
    fn abort_truncate_cannot_grow() {
        let mut db = DatabaseFile::new("test.db");
        assert!(db.truncate_wal_frames(1).is_err());
    }

    #[test]
    fn checkpoint_truncate_clears_wal_and_resets_header() {
        let mut db = DatabaseFile::new("test.db");
        db.main_mut().write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        db.append_frame(PageNumber::ONE, 1, vec![0_u8; 4096]).unwrap();
        db.checkpoint_truncate().unwrap();
        assert_eq!(db.mx_frame(), 0);
    }

    #[test]
    fn refcount_tracks_open_and_close() {
        let mut db = DatabaseFile::new("test.db");
        db.open_handle();
        db.open_handle();
        assert_eq!(db.refcount(), 2);
        db.close_handle();
        assert_eq!(db.refcount(), 1);
    }
}
