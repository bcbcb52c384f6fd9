//! The process-wide database registry (spec §4.8): `get_or_create`, `get`,
//! and `foreach` over every database this node has ever opened, ordered by
//! registration, with a single delete-hook wired into the page store.

use std::sync::{Arc, Mutex};

use raftlite_error::Result;
use raftlite_store::Store;

/// Tracks which database filenames this node has registered, in the order
/// they were first seen, on top of the page store that actually holds
/// their bytes.
///
/// `get_or_create` appends to the tail of the queue; the delete hook
/// (installed once, here, on construction) walks the queue and drops the
/// matching entry whenever the page store reports a filename deleted.
pub struct DbRegistry {
    store: Arc<Mutex<Store>>,
    queue: Arc<Mutex<Vec<String>>>,
}

impl DbRegistry {
    #[must_use]
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        let queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let hook_queue = Arc::clone(&queue);
        store
            .lock()
            .expect("store mutex poisoned")
            .set_delete_hook(move |filename| {
                hook_queue.lock().expect("queue mutex poisoned").retain(|f| f != filename);
            });
        Self { store, queue }
    }

    #[must_use]
    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    /// Register `filename` if it hasn't been seen before, appending it to
    /// the tail of the queue. Idempotent.
    pub fn get_or_create(&self, filename: &str) {
        let mut store = self.store.lock().expect("store mutex poisoned");
        let already_registered = store.get(filename).is_some();
        store.get_or_create(filename);
        drop(store);
        if !already_registered {
            self.queue.lock().expect("queue mutex poisoned").push(filename.to_owned());
        }
    }

    #[must_use]
    pub fn contains(&self, filename: &str) -> bool {
        self.store.lock().expect("store mutex poisoned").get(filename).is_some()
    }

    /// Delete `filename` from the page store, firing the delete hook which
    /// in turn removes it from this registry's queue.
    pub fn delete(&self, filename: &str) -> Result<()> {
        self.store.lock().expect("store mutex poisoned").delete(filename)
    }

    /// Visit every registered filename in registration order.
    pub fn foreach(&self, mut f: impl FnMut(&str)) {
        for filename in self.queue.lock().expect("queue mutex poisoned").iter() {
            f(filename);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().expect("queue mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
