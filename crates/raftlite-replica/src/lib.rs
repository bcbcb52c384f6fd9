//! Poll/Apply/Abort/Checkpoint: the bridge between a connection's local
//! commit and the replicated, shared-visible state of the page store.

use raftlite_error::{RaftliteError, Result};
use raftlite_store::shm::WRITE_LOCK;
use raftlite_store::DatabaseFile;
use raftlite_types::PageNumber;

/// A pending write transaction's dirty pages, extracted by [`poll`].
/// `pages[i]` corresponds to `page_numbers[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub page_numbers: Vec<u64>,
    pub pages: Vec<Vec<u8>>,
    /// The mxFrame this transaction's frames end at, once applied.
    pub end_mx_frame: u64,
    pub is_commit: bool,
}

impl PendingTx {
    #[must_use]
    pub fn n_pages(&self) -> usize {
        self.page_numbers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page_numbers.is_empty()
    }
}

/// `VfsPoll`: a pure inspection of the WAL tail beyond the last published
/// mxFrame. Idempotent — calling twice without an intervening apply/abort
/// returns the same result.
#[must_use]
pub fn poll(db: &DatabaseFile) -> PendingTx {
    let start = db.published_mx_frame() as usize;
    let frames = &db.frames()[start.min(db.frames().len())..];
    let is_commit = frames.last().is_some_and(|f| f.is_commit());
    PendingTx {
        page_numbers: frames.iter().map(|f| u64::from(f.page_number.get())).collect(),
        pages: frames.iter().map(|f| f.page.clone()).collect(),
        end_mx_frame: db.frames().len() as u64,
        is_commit,
    }
}

/// `VfsApply`: publish a polled (or received-from-the-log) transaction —
/// advance the published mxFrame and release the write lock. Tolerant of
/// a follower applying frames nobody locally polled.
pub fn apply(db: &mut DatabaseFile, tx: &PendingTx) -> Result<()> {
    if tx.end_mx_frame < db.published_mx_frame() {
        return Err(RaftliteError::protocol("apply would move mxFrame backwards"));
    }
    db.set_published_mx_frame(tx.end_mx_frame);
    let _ = db.shm_mut().unlock_exclusive(WRITE_LOCK);
    Ok(())
}

/// Apply frames carried by a `FRAMES` command. On a follower, these pages
/// are new: append each as a frame, then publish through to the last one,
/// honoring `is_commit` only on the final frame. On the leader that
/// proposed the command, the SQL engine already wrote these exact pages to
/// the WAL tail directly through the VFS before Poll ever ran — in that
/// case this degrades to a no-op replay that just advances the published
/// mark, since re-appending would duplicate frames already on disk.
pub fn apply_frames(
    db: &mut DatabaseFile,
    page_numbers: &[u64],
    pages: &[Vec<u8>],
    is_commit: bool,
) -> Result<()> {
    if page_numbers.len() != pages.len() {
        return Err(RaftliteError::protocol("page_numbers/pages length mismatch"));
    }
    let start = db.published_mx_frame() as usize;
    let already_written = db.frames().len() >= start + page_numbers.len()
        && db.frames()[start..start + page_numbers.len()]
            .iter()
            .zip(page_numbers)
            .all(|(frame, &pgno)| u64::from(frame.page_number.get()) == pgno);
    if already_written {
        db.set_published_mx_frame((start + page_numbers.len()) as u64);
        return Ok(());
    }
    for (i, (&pgno, page)) in page_numbers.iter().zip(pages).enumerate() {
        let number = PageNumber::new(u32::try_from(pgno).unwrap_or(u32::MAX))
            .ok_or_else(|| RaftliteError::protocol("page number 0 in FRAMES command"))?;
        let commit_marker = if is_commit && i + 1 == page_numbers.len() {
            db.main().page_count().max(number.get())
        } else {
            0
        };
        db.append_frame(number, commit_marker, page.clone())?;
    }
    db.set_published_mx_frame(db.frames().len() as u64);
    Ok(())
}

/// `VfsAbort`: truncate the WAL back to the last published mxFrame and
/// release the write lock. Readers, who never saw the aborted tail, are
/// unaffected.
pub fn abort(db: &mut DatabaseFile) -> Result<()> {
    let published = db.published_mx_frame();
    db.truncate_wal_frames(published)?;
    let _ = db.shm_mut().unlock_exclusive(WRITE_LOCK);
    Ok(())
}

/// `VfsCheckpoint`: attempt a full (`TRUNCATE`) checkpoint. Succeeds only
/// when every frame could be reclaimed (`log == 0 && ckpt == 0`); refused
/// while any read-mark lock is held.
pub fn checkpoint(db: &mut DatabaseFile) -> Result<()> {
    if db.shm().any_read_lock_held() {
        return Err(RaftliteError::Busy);
    }
    db.replay_frames_into_main()?;
    db.checkpoint_truncate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftlite_store::shm::WRITE_LOCK;

    fn header_page(page_size: u16) -> Vec<u8> {
        let mut page = vec![0_u8; 4096];
        page[16..18].copy_from_slice(&page_size.to_be_bytes());
        page
    }

    fn db_with_one_page() -> DatabaseFile {
        let mut db = DatabaseFile::new("t.db");
        db.main_mut().write_page(PageNumber::ONE, &header_page(4096)).unwrap();
        db
    }

    #[test]
    fn poll_is_idempotent() {
        let mut db = db_with_one_page();
        db.append_frame(PageNumber::ONE, 1, vec![1_u8; 4096]).unwrap();
        let first = poll(&db);
        let second = poll(&db);
        assert_eq!(first, second);
        assert_eq!(first.n_pages(), 1);
        assert!(first.is_commit);
    }

    #[test]
    fn apply_advances_published_mx_frame_and_releases_write_lock() {
        let mut db = db_with_one_page();
        db.shm_mut().lock_exclusive(WRITE_LOCK).unwrap();
        db.append_frame(PageNumber::ONE, 1, vec![1_u8; 4096]).unwrap();
        let tx = poll(&db);
        apply(&mut db, &tx).unwrap();
        assert_eq!(db.published_mx_frame(), 1);
        assert!(!db.shm().write_lock_held());
    }

    #[test]
    fn abort_truncates_unpublished_tail() {
        let mut db = db_with_one_page();
        db.shm_mut().lock_exclusive(WRITE_LOCK).unwrap();
        db.append_frame(PageNumber::ONE, 1, vec![1_u8; 4096]).unwrap();
        abort(&mut db).unwrap();
        assert_eq!(db.mx_frame(), 0);
        assert!(!db.shm().write_lock_held());
    }

    #[test]
    fn checkpoint_refused_while_read_lock_held() {
        let mut db = db_with_one_page();
        db.append_frame(PageNumber::ONE, 1, vec![1_u8; 4096]).unwrap();
        db.shm_mut().lock_shared(1).unwrap();
        assert!(matches!(checkpoint(&mut db), Err(RaftliteError::Busy)));
    }

    #[test]
    fn checkpoint_replays_frames_and_truncates_wal() {
        let mut db = db_with_one_page();
        let mut page_two = vec![2_u8; 4096];
        page_two[16..18].copy_from_slice(&4096_u16.to_be_bytes());
        db.append_frame(PageNumber::ONE, 1, page_two.clone()).unwrap();
        checkpoint(&mut db).unwrap();
        assert_eq!(db.mx_frame(), 0);
        let mut out = vec![0_u8; 4096];
        db.main().read_page(PageNumber::ONE, &mut out).unwrap();
        assert_eq!(out, page_two);
    }

    #[test]
    fn apply_frames_from_log_sets_commit_marker_on_last_frame_only() {
        let mut db = db_with_one_page();
        let pages = vec![vec![7_u8; 4096]];
        apply_frames(&mut db, &[1], &pages, true).unwrap();
        assert!(db.frames()[0].is_commit());
        assert_eq!(db.published_mx_frame(), 1);
    }

    #[test]
    fn apply_frames_skips_reappend_when_leader_already_wrote_them() {
        // Simulates the leader's own node: the frame is already physically
        // at the tail (written directly through the VFS) before the
        // encoded command comes back around through propose/apply.
        let mut db = db_with_one_page();
        db.append_frame(PageNumber::ONE, 1, vec![9_u8; 4096]).unwrap();
        let tail_len_before = db.frames().len();
        apply_frames(&mut db, &[1], &[vec![9_u8; 4096]], true).unwrap();
        assert_eq!(db.frames().len(), tail_len_before, "must not duplicate an already-written frame");
        assert_eq!(db.published_mx_frame(), 1);
    }
}
