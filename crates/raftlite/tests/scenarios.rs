//! End-to-end scenarios (S2, S4). S1, S3, S5, S6 exercise a concrete SQL
//! engine's planner/VDBE (`CREATE TABLE`, `INSERT`, `SELECT`) which this
//! workspace does not implement — that layer sits on top of
//! `raftlite_vfs` and is out of scope here. The scenarios below are the
//! subset expressible purely in terms of the replicated command stream,
//! the single-writer leader protocol, and the page store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use raftlite_fsm::{Command, FakeCluster, FramesBody, RaftHandle, RaftliteFsm, SingleNodeRaft};
use raftlite_leader::{Leader, WriterBook};
use raftlite_store::Store;
use raftlite_types::PageNumber;

const PAGE_SIZE: u16 = 512;

fn header_page() -> Vec<u8> {
    let mut page = vec![0_u8; PAGE_SIZE as usize];
    page[16..18].copy_from_slice(&PAGE_SIZE.to_be_bytes());
    page
}

fn open_entry(filename: &str) -> Vec<u8> {
    Command::Open { filename: filename.to_owned() }.encode()
}

fn single_page_commit(filename: &str, tx_id: u64, page_number: u64) -> Vec<u8> {
    Command::Frames {
        filename: filename.to_owned(),
        tx_id,
        truncate: 0,
        is_commit: true,
        frames: FramesBody { page_size: PAGE_SIZE, page_numbers: vec![page_number], pages: vec![vec![9u8; PAGE_SIZE as usize]] },
    }
    .encode()
}

/// S2: a 3-node cluster fed the same 2200-row insert stream converges —
/// every node ends up with the same published WAL position.
#[test]
fn s2_three_node_cluster_converges_after_a_long_insert_stream() {
    let nodes: Vec<RaftliteFsm> = (0..3).map(|_| RaftliteFsm::new(Arc::new(Mutex::new(Store::new())))).collect();
    let mut cluster = FakeCluster::new(nodes);

    cluster.propose(&open_entry("t.db")).unwrap();
    for node in cluster.nodes_mut() {
        let store = node.store();
        let mut store = store.lock().unwrap();
        store.get_mut("t.db").unwrap().main_mut().write_page(PageNumber::ONE, &header_page()).unwrap();
    }
    for i in 0..2200u64 {
        cluster.propose(&single_page_commit("t.db", i, i + 1)).unwrap();
    }

    let published: Vec<u64> = cluster
        .nodes()
        .iter()
        .map(|fsm| {
            let store = fsm.store();
            let store = store.lock().unwrap();
            store.get("t.db").unwrap().published_mx_frame()
        })
        .collect();

    assert_eq!(published.len(), 3);
    assert!(published.windows(2).all(|w| w[0] == w[1]), "nodes diverged: {published:?}");
    assert_eq!(published[0], 2200);
}

/// S4: `BEGIN; INSERT 163 rows; ROLLBACK` leaves the WAL exactly as it
/// was before the transaction started (nothing was ever proposed, so the
/// rollback is purely local); a subsequent single-row commit then leaves
/// exactly one committed frame behind.
#[test]
fn s4_rollback_then_single_commit_leaves_exactly_one_committed_frame() {
    let store = Arc::new(Mutex::new(Store::new()));
    let mut raft = SingleNodeRaft::new(RaftliteFsm::new(Arc::clone(&store)));
    raft.propose(open_entry("t.db")).unwrap();
    store.lock().unwrap().get_mut("t.db").unwrap().main_mut().write_page(PageNumber::ONE, &header_page()).unwrap();

    let mut book = WriterBook::new();
    let leader = Leader::new(1, "t.db", Duration::from_millis(50));

    // One prior committed, published row — establishes the WAL header so
    // "before" the 163-row transaction means something other than "no
    // WAL file yet".
    {
        let mut guard = store.lock().unwrap();
        let db = guard.get_mut("t.db").unwrap();
        db.append_frame(PageNumber::ONE, 1, vec![0u8; PAGE_SIZE as usize]).unwrap();
        let tx = raftlite_replica::poll(db);
        raftlite_replica::apply(db, &tx).unwrap();
    }
    let baseline_len = store.lock().unwrap().get("t.db").unwrap().wal_byte_len();

    // BEGIN; INSERT 163 rows (written locally, never proposed); ROLLBACK.
    book.try_begin("t.db", raft.last_applied(), 1).unwrap();
    {
        let mut guard = store.lock().unwrap();
        let db = guard.get_mut("t.db").unwrap();
        for pgno in 2..=164u32 {
            db.append_frame(PageNumber::new(pgno).unwrap(), 0, vec![3u8; PAGE_SIZE as usize]).unwrap();
        }
    }
    let undo_tx_id = {
        let mut guard = store.lock().unwrap();
        let db = guard.get_mut("t.db").unwrap();
        leader.prepare_rollback(&book, db).unwrap()
    };
    assert!(undo_tx_id.is_none(), "a transaction never proposed to Raft needs no UNDO replication");
    leader.finish_rollback(&mut book, undo_tx_id, &mut raft).unwrap();

    assert_eq!(store.lock().unwrap().get("t.db").unwrap().wal_byte_len(), baseline_len);

    // A fresh single-row transaction then commits cleanly, on top of the
    // one row that survived the rollback untouched.
    book.try_begin("t.db", raft.last_applied(), 1).unwrap();
    {
        let mut guard = store.lock().unwrap();
        let db = guard.get_mut("t.db").unwrap();
        db.append_frame(PageNumber::new(2).unwrap(), 1, vec![5u8; PAGE_SIZE as usize]).unwrap();
    }
    let intent = {
        let guard = store.lock().unwrap();
        let db = guard.get("t.db").unwrap();
        leader.prepare_commit(&book, db).unwrap()
    };
    leader.finish_commit(&mut book, intent, &mut raft).unwrap();

    let guard = store.lock().unwrap();
    let db = guard.get("t.db").unwrap();
    assert_eq!(db.frames().len(), 2, "the surviving pre-rollback row plus the new commit");
    assert!(db.frames().last().unwrap().is_commit());
}
