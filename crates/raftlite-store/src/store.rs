//! Process-wide page store: named databases plus scratch ("other") files.

use std::collections::HashMap;

use raftlite_error::{RaftliteError, Result};

use crate::db_file::DatabaseFile;

type DeleteHook = Box<dyn FnMut(&str) + Send>;

/// The page store the VFS reads and writes against. Keyed by filename;
/// "other" files (temp/scratch, forwarded to the host VFS in a real
/// deployment) are tracked separately as opaque byte buffers.
#[derive(Default)]
pub struct Store {
    databases: HashMap<String, DatabaseFile>,
    other_files: HashMap<String, Vec<u8>>,
    delete_hook: Option<DeleteHook>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, filename: &str) -> &mut DatabaseFile {
        self.databases
            .entry(filename.to_owned())
            .or_insert_with(|| DatabaseFile::new(filename))
    }

    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&DatabaseFile> {
        self.databases.get(filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut DatabaseFile> {
        self.databases.get_mut(filename)
    }

    /// `xDelete`: refuses if the database has open handles, or if it was
    /// never created.
    pub fn delete(&mut self, filename: &str) -> Result<()> {
        let refcount = self
            .databases
            .get(filename)
            .ok_or_else(|| RaftliteError::IoDelete {
                detail: format!("{filename} does not exist"),
            })?
            .refcount();
        if refcount > 0 {
            return Err(RaftliteError::IoDelete {
                detail: format!("{filename} has {refcount} open handle(s)"),
            });
        }
        if let Some(hook) = self.delete_hook.as_mut() {
            hook(filename);
        }
        self.databases.remove(filename);
        Ok(())
    }

    /// Install the single delete hook the registry uses to drop its own
    /// handles before a database disappears from the store.
    pub fn set_delete_hook(&mut self, hook: impl FnMut(&str) + Send + 'static) {
        self.delete_hook = Some(Box::new(hook));
    }

    pub fn foreach(&self, mut f: impl FnMut(&DatabaseFile)) {
        for db in self.databases.values() {
            f(db);
        }
    }

    pub fn create_other(&mut self, filename: &str) {
        self.other_files.entry(filename.to_owned()).or_default();
    }

    pub fn other(&self, filename: &str) -> Option<&[u8]> {
        self.other_files.get(filename).map(Vec::as_slice)
    }

    pub fn other_mut(&mut self, filename: &str) -> Option<&mut Vec<u8>> {
        self.other_files.get_mut(filename)
    }

    pub fn delete_other(&mut self, filename: &str) {
        self.other_files.remove(filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_refuses_with_open_handles() {
        let mut store = Store::new();
        store.get_or_create("a.db").open_handle();
        assert!(matches!(store.delete("a.db"), Err(RaftliteError::IoDelete { .. })));
    }

    #[test]
    fn delete_refuses_absent_file() {
        let mut store = Store::new();
        assert!(store.delete("missing.db").is_err());
    }

    #[test]
    fn delete_hook_runs_before_removal() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let mut store = Store::new();
        store.get_or_create("a.db");
        store.set_delete_hook(move |name| seen_clone.lock().unwrap().push(name.to_owned()));
        store.delete("a.db").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a.db".to_owned()]);
        assert!(store.get("a.db").is_none());
    }
}
