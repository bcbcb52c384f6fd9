//! Per-process bookkeeping of the single active writer per database
//! (invariant I3), shared by every leader record.

use std::collections::HashMap;

use raftlite_error::{RaftliteError, Result};

use crate::tx::{TxRecord, TxState};

/// Tracks at most one in-flight write transaction per database filename.
#[derive(Default)]
pub struct WriterBook {
    active: HashMap<String, TxRecord>,
}

impl WriterBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the write slot for `filename`. Fails with `Busy` if another,
    /// non-zombie transaction already holds it — a zombie left behind by a
    /// leadership handoff also blocks new writers until resolved, since its
    /// fate (commit or undo) is not yet known.
    pub fn try_begin(&mut self, filename: &str, tx_id: u64, owner_conn: u64) -> Result<()> {
        if self.active.contains_key(filename) {
            return Err(RaftliteError::Busy);
        }
        self.active.insert(filename.to_owned(), TxRecord::new(tx_id, owner_conn));
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&TxRecord> {
        self.active.get(filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut TxRecord> {
        self.active.get_mut(filename)
    }

    pub fn mark_written(&mut self, filename: &str) {
        if let Some(tx) = self.active.get_mut(filename) {
            tx.state = TxState::Written;
        }
    }

    /// Release the write slot for `filename`, returning its final record.
    pub fn clear(&mut self, filename: &str) -> Option<TxRecord> {
        self.active.remove(filename)
    }

    /// Transactions left zombied by a leadership handoff, awaiting UNDO.
    pub fn zombies(&self) -> impl Iterator<Item = (&String, &TxRecord)> {
        self.active.iter().filter(|(_, tx)| tx.is_zombie)
    }
}
