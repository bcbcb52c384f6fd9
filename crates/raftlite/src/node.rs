//! Wires the page store, VFS, database registry, and single-writer
//! bookkeeping into one handle a host embeds, then hands out a
//! [`Gateway`] per client connection (spec §2's component table).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use raftlite_gateway::{Gateway, SqlEngine};
use raftlite_leader::WriterBook;
use raftlite_registry::DbRegistry;
use raftlite_store::Store;
use raftlite_vfs::MemoryVfs;

use crate::config::NodeConfig;

/// One `raftlite` node's process-wide shared state. Cheap to clone
/// (everything inside is reference-counted) so a host can hand a `Node`
/// to as many connection-handling tasks as it likes.
#[derive(Clone)]
pub struct Node {
    config: NodeConfig,
    store: Arc<Mutex<Store>>,
    registry: Arc<DbRegistry>,
    writer_book: Arc<Mutex<WriterBook>>,
    vfs: Arc<MemoryVfs>,
    next_conn_id: Arc<AtomicU64>,
}

impl Node {
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        let store = Arc::new(Mutex::new(Store::new()));
        let registry = Arc::new(DbRegistry::new(Arc::clone(&store)));
        let vfs = Arc::new(MemoryVfs::new(config.vfs_name.clone(), Arc::clone(&store)));
        Self {
            config,
            store,
            registry,
            writer_book: Arc::new(Mutex::new(WriterBook::new())),
            vfs,
            next_conn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn registry(&self) -> &DbRegistry {
        &self.registry
    }

    #[must_use]
    pub fn vfs(&self) -> Arc<MemoryVfs> {
        Arc::clone(&self.vfs)
    }

    /// Hand out a fresh gateway for one client connection, over `engine`
    /// (the SQL engine instance that connection will drive). Connection
    /// ids are assigned in increasing order for the lifetime of the node.
    pub fn connect<E: SqlEngine>(&self, engine: E) -> Gateway<E> {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        Gateway::new(conn_id, Arc::clone(&self.store), Arc::clone(&self.writer_book), engine, self.config.busy_timeout)
    }
}
