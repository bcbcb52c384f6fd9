//! The Raft FSM contract (`apply`, `snapshot`, `restore`) and the
//! concrete implementation driving a [`raftlite_store::Store`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use raftlite_codec::{Reader, Writer};
use raftlite_error::{RaftliteError, Result};
use raftlite_store::Store;

use crate::command::Command;

/// The Raft finite-state-machine contract every node implements.
pub trait Fsm {
    fn apply(&mut self, entry: &[u8]) -> Result<()>;
    fn snapshot(&self) -> Result<Vec<u8>>;
    fn restore(&mut self, buffer: &[u8]) -> Result<()>;
}

/// Apply `entry`, treating `Corrupt` as fatal: the FSM may not skip a
/// committed entry, so encountering corrupt data on apply means this
/// node's replica can no longer be trusted. Logs and aborts rather than
/// limping on with divergent state — correctness over availability.
pub fn apply_or_abort(fsm: &mut impl Fsm, entry: &[u8]) -> Result<()> {
    match fsm.apply(entry) {
        Err(RaftliteError::Corrupt { detail }) => {
            tracing::error!(detail = %detail, "fatal: FSM apply hit corrupt data, aborting");
            std::process::abort();
        }
        other => other,
    }
}

/// Drives a [`Store`] from the replicated command stream.
pub struct RaftliteFsm {
    store: Arc<Mutex<Store>>,
    /// tx_id -> owning filename, for transactions currently pending
    /// (proposed but not yet committed/undone).
    pending_tx: HashMap<u64, String>,
}

impl RaftliteFsm {
    #[must_use]
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self {
            store,
            pending_tx: HashMap::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    fn any_tx_pending_for(&self, filename: &str) -> bool {
        self.pending_tx.values().any(|f| f == filename)
    }
}

impl Fsm for RaftliteFsm {
    fn apply(&mut self, entry: &[u8]) -> Result<()> {
        let command = Command::decode(entry)?;
        match command {
            Command::Open { filename } => {
                self.store.lock().expect("store mutex poisoned").get_or_create(&filename);
                Ok(())
            }
            Command::Frames {
                filename,
                tx_id,
                truncate,
                is_commit,
                frames,
            } => {
                let mut store = self.store.lock().expect("store mutex poisoned");
                let db = store
                    .get_mut(&filename)
                    .ok_or_else(|| RaftliteError::not_found(&filename))?;
                if truncate > 0 {
                    db.checkpoint_truncate()?;
                }
                raftlite_replica::apply_frames(db, &frames.page_numbers, &frames.pages, is_commit)?;
                drop(store);
                if is_commit {
                    self.pending_tx.remove(&tx_id);
                } else {
                    self.pending_tx.insert(tx_id, filename);
                }
                Ok(())
            }
            Command::Undo { tx_id } => {
                let filename = self
                    .pending_tx
                    .remove(&tx_id)
                    .ok_or_else(|| RaftliteError::not_found(format!("tx {tx_id}")))?;
                let mut store = self.store.lock().expect("store mutex poisoned");
                let db = store
                    .get_mut(&filename)
                    .ok_or_else(|| RaftliteError::not_found(&filename))?;
                raftlite_replica::abort(db)
            }
            Command::Checkpoint { filename } => {
                if self.any_tx_pending_for(&filename) {
                    return Err(RaftliteError::Busy);
                }
                let mut store = self.store.lock().expect("store mutex poisoned");
                let db = store
                    .get_mut(&filename)
                    .ok_or_else(|| RaftliteError::not_found(&filename))?;
                raftlite_replica::checkpoint(db)
            }
        }
    }

    fn snapshot(&self) -> Result<Vec<u8>> {
        let store = self.store.lock().expect("store mutex poisoned");
        let mut filenames = Vec::new();
        store.foreach(|db| filenames.push(db.filename().to_owned()));
        filenames.sort();

        let mut w = Writer::new();
        w.put_u64(1);
        w.put_u64(filenames.len() as u64);
        for filename in &filenames {
            let db = store.get(filename).expect("listed above");
            let main_bytes = main_db_bytes(db);
            let wal_bytes = db.wal_bytes();
            w.put_text(filename);
            w.put_u64(main_bytes.len() as u64);
            w.put_u64(wal_bytes.len() as u64);
            w.put_bytes(&main_bytes);
            w.put_bytes(&wal_bytes);
        }
        Ok(w.into_vec())
    }

    fn restore(&mut self, buffer: &[u8]) -> Result<()> {
        let mut r = Reader::new(buffer);
        let format = r.get_u64()?;
        if format != 1 {
            return Err(RaftliteError::protocol(format!("unsupported snapshot format: {format}")));
        }
        let n_databases = r.get_u64()?;
        let mut store = self.store.lock().expect("store mutex poisoned");
        for _ in 0..n_databases {
            let filename = r.get_text(None)?;
            let main_size = r.get_u64()? as usize;
            let wal_size = r.get_u64()? as usize;
            let main_bytes = r.get_bytes(main_size)?.to_vec();
            let wal_bytes = r.get_bytes(wal_size)?.to_vec();
            let db = store.get_or_create(&filename);
            install_main_db_bytes(db, &main_bytes)?;
            if !wal_bytes.is_empty() {
                db.set_wal_header_bytes(&wal_bytes[..raftlite_store::wal::WAL_HEADER_LEN])?;
                let frame_len = raftlite_store::wal::FRAME_HEADER_LEN
                    + db.page_size().map_or(0, raftlite_types::PageSize::as_usize);
                let mut offset = raftlite_store::wal::WAL_HEADER_LEN;
                while offset + frame_len <= wal_bytes.len() {
                    db.append_raw_frame_bytes(&wal_bytes[offset..offset + frame_len])?;
                    offset += frame_len;
                }
            }
        }
        self.pending_tx.clear();
        Ok(())
    }
}

fn main_db_bytes(db: &raftlite_store::DatabaseFile) -> Vec<u8> {
    let Some(page_size) = db.page_size() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(db.main().page_count() as usize * page_size.as_usize());
    let mut buf = vec![0_u8; page_size.as_usize()];
    for n in 1..=db.main().page_count() {
        let number = raftlite_types::PageNumber::new(n).expect("1..=page_count is nonzero");
        let _ = db.main().read_page(number, &mut buf);
        out.extend_from_slice(&buf);
    }
    out
}

fn install_main_db_bytes(db: &mut raftlite_store::DatabaseFile, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let page_size_field = u16::from_be_bytes([bytes[16], bytes[17]]);
    let page_size = raftlite_types::PageSize::decode_header_field(page_size_field)?;
    let mut offset = 0;
    let mut n = 1_u32;
    while offset + page_size.as_usize() <= bytes.len() {
        let number = raftlite_types::PageNumber::new(n).expect("n starts at 1");
        db.main_mut().write_page(number, &bytes[offset..offset + page_size.as_usize()])?;
        offset += page_size.as_usize();
        n += 1;
    }
    Ok(())
}
