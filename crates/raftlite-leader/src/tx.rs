//! The transaction descriptor a leader record tracks for its database
//! (spec §3, "shared database registry entry").

/// Lifecycle of a write transaction as tracked by its owning leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Begun, no frames proposed yet.
    Pending,
    /// `step()` is running; frames may already be in the local WAL.
    Writing,
    /// Frames proposed and (for this node) published.
    Written,
    /// Rolled back; kept only long enough to reject stray use-after-undo.
    Undone,
}

/// One write transaction, identified by the Raft index it was opened at
/// (invariant I6: `tx_id` is the Raft last-applied index at BEGIN time,
/// hence strictly monotonic for a given leader term).
#[derive(Debug, Clone)]
pub struct TxRecord {
    pub tx_id: u64,
    pub owner_conn: u64,
    pub state: TxState,
    pub is_leader: bool,
    /// Set when this node lost leadership after proposing frames but
    /// before the commit was confirmed; resolved by UNDO on leadership
    /// regain (spec §4.5 point 5).
    pub is_zombie: bool,
}

impl TxRecord {
    #[must_use]
    pub fn new(tx_id: u64, owner_conn: u64) -> Self {
        Self {
            tx_id,
            owner_conn,
            state: TxState::Pending,
            is_leader: true,
            is_zombie: false,
        }
    }
}
