//! The slice of the Raft consensus library's API this workspace consumes,
//! plus in-memory test doubles standing in for a real Raft implementation
//! (explicitly out of scope) so replication properties are still testable.

use raftlite_error::{RaftliteError, Result};

use crate::fsm::Fsm;

/// What the leader and gateway need from Raft: propose an entry, find out
/// whether this node is currently the leader, and wait for a
/// linearizability barrier.
pub trait RaftHandle {
    fn last_applied(&self) -> u64;
    fn is_leader(&self) -> bool;

    /// Propose `entry`; resolves once a quorum has committed it, at which
    /// point it has already been applied to the local FSM.
    fn propose(&mut self, entry: Vec<u8>) -> Result<u64>;

    /// A linearizable read barrier: blocks until this node has observed
    /// every entry committed before the barrier was requested.
    fn barrier(&mut self) -> Result<()>;
}

/// A single-node Raft stand-in: every proposal "commits" immediately by
/// applying straight to the local FSM. Sufficient for exercising the
/// leader/gateway/FSM wiring without a real consensus module.
pub struct SingleNodeRaft<F: Fsm> {
    fsm: F,
    last_applied: u64,
    leader: bool,
}

impl<F: Fsm> SingleNodeRaft<F> {
    #[must_use]
    pub fn new(fsm: F) -> Self {
        Self {
            fsm,
            last_applied: 0,
            leader: true,
        }
    }

    pub fn fsm_mut(&mut self) -> &mut F {
        &mut self.fsm
    }

    pub fn set_leader(&mut self, leader: bool) {
        self.leader = leader;
    }
}

impl<F: Fsm> RaftHandle for SingleNodeRaft<F> {
    fn last_applied(&self) -> u64 {
        self.last_applied
    }

    fn is_leader(&self) -> bool {
        self.leader
    }

    fn propose(&mut self, entry: Vec<u8>) -> Result<u64> {
        if !self.leader {
            return Err(RaftliteError::NotLeader);
        }
        self.fsm.apply(&entry)?;
        self.last_applied += 1;
        Ok(self.last_applied)
    }

    fn barrier(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drives the same entry stream through N independent FSMs in lockstep,
/// the way a real Raft cluster would replicate a committed log to every
/// follower — used to test property I5 (follower page stores are
/// byte-identical to the leader's) and S2 (multi-node convergence)
/// without depending on a real Raft crate.
pub struct FakeCluster<F: Fsm> {
    nodes: Vec<F>,
}

impl<F: Fsm> FakeCluster<F> {
    #[must_use]
    pub fn new(nodes: Vec<F>) -> Self {
        Self { nodes }
    }

    /// Apply `entry` to every node, in order. Returns the first error
    /// encountered, if any node diverges from the others.
    pub fn propose(&mut self, entry: &[u8]) -> Result<()> {
        for node in &mut self.nodes {
            node.apply(entry)?;
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[F] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [F] {
        &mut self.nodes
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use raftlite_store::Store;

    use super::*;
    use crate::command::Command;
    use crate::fsm::RaftliteFsm;

    #[test]
    fn single_node_raft_rejects_proposals_when_not_leader() {
        let fsm = RaftliteFsm::new(Arc::new(Mutex::new(Store::new())));
        let mut raft = SingleNodeRaft::new(fsm);
        raft.set_leader(false);
        let entry = Command::Open { filename: "a.db".into() }.encode();
        assert!(matches!(raft.propose(entry), Err(RaftliteError::NotLeader)));
    }

    #[test]
    fn single_node_raft_advances_last_applied_on_success() {
        let fsm = RaftliteFsm::new(Arc::new(Mutex::new(Store::new())));
        let mut raft = SingleNodeRaft::new(fsm);
        let entry = Command::Open { filename: "a.db".into() }.encode();
        raft.propose(entry).unwrap();
        assert_eq!(raft.last_applied(), 1);
    }

    #[test]
    fn fake_cluster_applies_same_entry_to_every_node() {
        let nodes: Vec<RaftliteFsm> = (0..3)
            .map(|_| RaftliteFsm::new(Arc::new(Mutex::new(Store::new()))))
            .collect();
        let mut cluster = FakeCluster::new(nodes);
        let entry = Command::Open { filename: "a.db".into() }.encode();
        cluster.propose(&entry).unwrap();
        for node in cluster.nodes() {
            assert!(node.store().lock().unwrap().get("a.db").is_some());
        }
    }
}
