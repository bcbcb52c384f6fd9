//! Shared-memory region: on-demand 32 KiB segments backing the WAL-index,
//! plus the lock table that arbitrates access to them.
//!
//! Lock slot numbering follows the upstream WAL-index convention: slot 0
//! is the write lock (invariant I3 — at most one writer at a time), and
//! slots 1..=5 are the five read-mark locks (`NREADER = 5`).

use raftlite_error::{RaftliteError, Result};

use crate::wal_index::WAL_SHM_SEGMENT_BYTES;

pub const WRITE_LOCK: usize = 0;
pub const N_READER: usize = 5;
pub const READ_LOCKS: std::ops::RangeInclusive<usize> = 1..=N_READER;
pub const N_LOCKS: usize = N_READER + 1;

/// One slot's shared/exclusive lock counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SlotCounters {
    shared: u32,
    exclusive: u32,
}

/// The shm region for one database: on-demand 32 KiB segments plus the
/// `N_LOCKS` lock-counter slots.
#[derive(Debug, Default)]
pub struct ShmRegion {
    segments: Vec<Option<Vec<u8>>>,
    locks: [SlotCounters; N_LOCKS],
    /// Per-reader visible-frame high-water marks; index 0 corresponds to
    /// read-mark lock slot 1, etc. `None` means the reader slot is unused.
    read_marks: [Option<u64>; N_READER],
}

impl ShmRegion {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `xShmMap`: return the segment at `index`, allocating it first if
    /// `extend` is set and it doesn't exist yet. With `extend=false` on an
    /// unallocated slot, returns `None` without error.
    pub fn map(&mut self, index: usize, extend: bool) -> Option<&mut [u8]> {
        if index >= self.segments.len() {
            if !extend {
                return None;
            }
            self.segments.resize_with(index + 1, || None);
        }
        if self.segments[index].is_none() {
            if !extend {
                return None;
            }
            self.segments[index] = Some(vec![0_u8; WAL_SHM_SEGMENT_BYTES]);
        }
        self.segments[index].as_deref_mut()
    }

    /// `xShmLock` acquire: shared locks may stack; an exclusive lock
    /// requires the slot to be completely uncontended.
    pub fn lock_shared(&mut self, slot: usize) -> Result<()> {
        let counters = self.slot_mut(slot)?;
        if counters.exclusive > 0 {
            return Err(RaftliteError::Busy);
        }
        counters.shared += 1;
        Ok(())
    }

    pub fn lock_exclusive(&mut self, slot: usize) -> Result<()> {
        let counters = self.slot_mut(slot)?;
        if counters.shared > 0 || counters.exclusive > 0 {
            return Err(RaftliteError::Busy);
        }
        counters.exclusive = 1;
        Ok(())
    }

    /// `xShmLock` release. Idempotent: unlocking an unheld lock is a no-op,
    /// which the SQL engine's open sequence relies on.
    pub fn unlock_shared(&mut self, slot: usize) -> Result<()> {
        let counters = self.slot_mut(slot)?;
        counters.shared = counters.shared.saturating_sub(1);
        Ok(())
    }

    pub fn unlock_exclusive(&mut self, slot: usize) -> Result<()> {
        let counters = self.slot_mut(slot)?;
        counters.exclusive = 0;
        Ok(())
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut SlotCounters> {
        self.locks
            .get_mut(slot)
            .ok_or_else(|| RaftliteError::internal(format!("lock slot {slot} out of range")))
    }

    /// Whether the write lock (slot 0) is currently held exclusively.
    #[must_use]
    pub fn write_lock_held(&self) -> bool {
        self.locks[WRITE_LOCK].exclusive > 0
    }

    /// Record reader `slot`'s (1-based within `READ_LOCKS`) visible frame
    /// high-water mark.
    pub fn set_read_mark(&mut self, reader_slot: usize, frame: u64) -> Result<()> {
        let idx = reader_index(reader_slot)?;
        self.read_marks[idx] = Some(frame);
        Ok(())
    }

    pub fn clear_read_mark(&mut self, reader_slot: usize) -> Result<()> {
        let idx = reader_index(reader_slot)?;
        self.read_marks[idx] = None;
        Ok(())
    }

    /// The lowest read mark currently set (invariant I4): the checkpointer
    /// must not reclaim a frame at or below this value.
    #[must_use]
    pub fn min_read_mark(&self) -> Option<u64> {
        self.read_marks.iter().flatten().min().copied()
    }

    /// Whether any read-mark lock slot is held (shared or exclusive),
    /// used to gate checkpoint truncation.
    #[must_use]
    pub fn any_read_lock_held(&self) -> bool {
        READ_LOCKS
            .clone()
            .any(|slot| self.locks[slot].shared > 0 || self.locks[slot].exclusive > 0)
    }

    /// Barriers and checkpoint-unmap are no-ops under single-process
    /// semantics; kept as named methods so call sites read the same as
    /// the multi-process original.
    pub fn barrier(&self) {}

    pub fn checkpoint_unmap(&mut self) {}
}

fn reader_index(reader_slot: usize) -> Result<usize> {
    if !READ_LOCKS.contains(&reader_slot) {
        return Err(RaftliteError::internal(format!(
            "reader slot {reader_slot} is out of the read-mark range"
        )));
    }
    Ok(reader_slot - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_with_extend_false_on_unallocated_slot_returns_none() {
        let mut shm = ShmRegion::new();
        assert!(shm.map(0, false).is_none());
    }

    #[test]
    fn map_with_extend_true_allocates_segment() {
        let mut shm = ShmRegion::new();
        let segment = shm.map(0, true).unwrap();
        assert_eq!(segment.len(), WAL_SHM_SEGMENT_BYTES);
    }

    #[test]
    fn shared_lock_stacks_but_blocks_exclusive() {
        let mut shm = ShmRegion::new();
        shm.lock_shared(WRITE_LOCK).unwrap();
        shm.lock_shared(WRITE_LOCK).unwrap();
        assert!(matches!(shm.lock_exclusive(WRITE_LOCK), Err(RaftliteError::Busy)));
    }

    #[test]
    fn exclusive_lock_excludes_shared() {
        let mut shm = ShmRegion::new();
        shm.lock_exclusive(WRITE_LOCK).unwrap();
        assert!(matches!(shm.lock_shared(WRITE_LOCK), Err(RaftliteError::Busy)));
    }

    #[test]
    fn unlock_never_held_lock_is_a_no_op() {
        let mut shm = ShmRegion::new();
        assert!(shm.unlock_shared(WRITE_LOCK).is_ok());
        assert!(shm.unlock_exclusive(WRITE_LOCK).is_ok());
    }

    #[test]
    fn write_lock_acquire_release_round_trip() {
        let mut shm = ShmRegion::new();
        shm.lock_exclusive(WRITE_LOCK).unwrap();
        assert!(shm.write_lock_held());
        shm.unlock_exclusive(WRITE_LOCK).unwrap();
        assert!(!shm.write_lock_held());
    }

    #[test]
    fn read_marks_track_minimum_across_readers() {
        let mut shm = ShmRegion::new();
        shm.set_read_mark(1, 10).unwrap();
        shm.set_read_mark(2, 4).unwrap();
        assert_eq!(shm.min_read_mark(), Some(4));
        shm.clear_read_mark(2).unwrap();
        assert_eq!(shm.min_read_mark(), Some(10));
    }

    #[test]
    fn reader_slot_out_of_range_is_rejected() {
        let mut shm = ShmRegion::new();
        assert!(shm.set_read_mark(0, 1).is_err());
        assert!(shm.set_read_mark(6, 1).is_err());
    }
}
