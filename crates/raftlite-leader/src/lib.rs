//! Single-writer-per-database discipline (spec §4.5) and the two-phase
//! commit/rollback exec dispatcher that bridges a connection's local
//! commit to a Raft proposal.

pub mod leader;
pub mod tx;
pub mod writer_book;

pub use leader::{CommitIntent, Leader};
pub use tx::{TxRecord, TxState};
pub use writer_book::WriterBook;
