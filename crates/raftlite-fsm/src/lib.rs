//! Command codec, the Raft FSM contract, and in-memory test doubles that
//! exercise replication semantics without a real Raft consensus crate.

pub mod command;
pub mod fsm;
pub mod raft_handle;

pub use command::{Command, FramesBody};
pub use fsm::{apply_or_abort, Fsm, RaftliteFsm};
pub use raft_handle::{FakeCluster, RaftHandle, SingleNodeRaft};
