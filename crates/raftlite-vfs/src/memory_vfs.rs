//! An in-process VFS backed directly by a [`raftlite_store::Store`]: no
//! disk I/O, since durability comes from quorum replication rather than
//! fsync.

use std::sync::{Arc, Mutex};

use raftlite_error::{RaftliteError, Result};
use raftlite_store::Store;
use raftlite_types::{Cx, FileKind, PageNumber, PageSize, VfsOpenFlags};

use crate::traits::{Vfs, VfsFile};

/// Registered under a user-chosen name at non-default priority, per the
/// specification's VFS registration rule.
pub struct MemoryVfs {
    name: String,
    store: Arc<Mutex<Store>>,
}

impl MemoryVfs {
    #[must_use]
    pub fn new(name: impl Into<String>, store: Arc<Mutex<Store>>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }
}

impl Vfs for MemoryVfs {
    type File = MemoryVfsFile;

    fn open(&self, _cx: &Cx, filename: Option<&str>, flags: VfsOpenFlags) -> Result<Self::File> {
        let Some(filename) = filename else {
            if !flags.contains(VfsOpenFlags::DELETEONCLOSE) {
                return Err(RaftliteError::protocol(
                    "anonymous open requires DELETEONCLOSE and is forwarded to the host VFS",
                ));
            }
            return Ok(MemoryVfsFile::scratch());
        };

        let kind = FileKind::from_open_flags(flags);
        let mut store = self.store.lock().expect("store mutex poisoned");

        let exists = match kind {
            FileKind::MainDb | FileKind::Wal => store.get(filename).is_some(),
            FileKind::Other => store.other(filename).is_some(),
        };
        if exists && flags.contains(VfsOpenFlags::EXCLUSIVE) && flags.contains(VfsOpenFlags::CREATE) {
            return Err(RaftliteError::CantOpen {
                detail: format!("{filename} already exists (EEXIST)"),
            });
        }

        match kind {
            FileKind::MainDb => {
                store.get_or_create(filename).open_handle();
            }
            FileKind::Wal => {
                store.get_or_create(filename);
            }
            FileKind::Other => {
                store.create_other(filename);
            }
        }

        Ok(MemoryVfsFile {
            store: Some(Arc::clone(&self.store)),
            filename: filename.to_owned(),
            kind,
            deleteonclose: flags.contains(VfsOpenFlags::DELETEONCLOSE),
        })
    }

    fn delete(&self, _cx: &Cx, filename: &str) -> Result<()> {
        self.store.lock().expect("store mutex poisoned").delete(filename)
    }

    fn exists(&self, filename: &str) -> bool {
        let store = self.store.lock().expect("store mutex poisoned");
        store.get(filename).is_some() || store.other(filename).is_some()
    }
}

/// A handle into [`MemoryVfs`]'s store, or a standalone scratch buffer for
/// anonymous (`DELETEONCLOSE`) temp files.
pub struct MemoryVfsFile {
    store: Option<Arc<Mutex<Store>>>,
    filename: String,
    kind: FileKind,
    deleteonclose: bool,
}

impl MemoryVfsFile {
    fn scratch() -> Self {
        Self {
            store: None,
            filename: String::new(),
            kind: FileKind::Other,
            deleteonclose: true,
        }
    }
}

impl Drop for MemoryVfsFile {
    fn drop(&mut self) {
        if self.deleteonclose {
            if let Some(store) = &self.store {
                let mut store = store.lock().expect("store mutex poisoned");
                match self.kind {
                    FileKind::MainDb => {
                        if let Some(db) = store.get_mut(&self.filename) {
                            db.close_handle();
                        }
                        let _ = store.delete(&self.filename);
                    }
                    FileKind::Wal => {}
                    FileKind::Other => store.delete_other(&self.filename),
                }
            }
        } else if self.kind == FileKind::MainDb {
            if let Some(store) = &self.store {
                if let Some(db) = store.lock().expect("store mutex poisoned").get_mut(&self.filename) {
                    db.close_handle();
                }
            }
        }
    }
}

impl VfsFile for MemoryVfsFile {
    fn read(&mut self, _cx: &Cx, buf: &mut [u8], offset: u64) -> Result<()> {
        let Some(store) = &self.store else {
            buf.fill(0);
            return Ok(());
        };
        let store = store.lock().expect("store mutex poisoned");
        match self.kind {
            FileKind::MainDb => {
                let db = store
                    .get(&self.filename)
                    .ok_or_else(|| RaftliteError::not_found(&self.filename))?;
                let page_size = db
                    .page_size()
                    .ok_or_else(|| RaftliteError::IoRead {
                        detail: "page size not yet established".to_owned(),
                    })?
                    .as_u64();
                let page_no = (offset / page_size) + 1;
                let number = PageNumber::new(u32::try_from(page_no).unwrap_or(u32::MAX))
                    .ok_or_else(|| RaftliteError::IoRead { detail: "page 0 is invalid".to_owned() })?;
                db.main().read_page(number, buf)
            }
            FileKind::Wal => {
                let db = store
                    .get(&self.filename)
                    .ok_or_else(|| RaftliteError::not_found(&self.filename))?;
                let bytes = db.wal_bytes();
                let start = offset as usize;
                let end = start + buf.len();
                if end > bytes.len() {
                    buf.fill(0);
                    return Err(RaftliteError::IoShort {
                        detail: "WAL read past end of file".to_owned(),
                    });
                }
                buf.copy_from_slice(&bytes[start..end]);
                Ok(())
            }
            FileKind::Other => {
                let bytes = store
                    .other(&self.filename)
                    .ok_or_else(|| RaftliteError::not_found(&self.filename))?;
                let start = offset as usize;
                let end = start + buf.len();
                if end > bytes.len() {
                    buf.fill(0);
                    return Err(RaftliteError::IoShort {
                        detail: "scratch file read past end of file".to_owned(),
                    });
                }
                buf.copy_from_slice(&bytes[start..end]);
                Ok(())
            }
        }
    }

    fn write(&mut self, _cx: &Cx, buf: &[u8], offset: u64) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut store = store.lock().expect("store mutex poisoned");
        match self.kind {
            FileKind::MainDb => {
                let db = store.get_mut(&self.filename).expect("opened above");
                let page_size = db.page_size().map_or(buf.len() as u64, PageSize::as_u64);
                if page_size == 0 || offset % page_size != 0 {
                    return Err(RaftliteError::IoWrite {
                        detail: "main DB write is not page-aligned".to_owned(),
                    });
                }
                let page_no = (offset / page_size) + 1;
                let number = PageNumber::new(u32::try_from(page_no).unwrap_or(u32::MAX))
                    .ok_or_else(|| RaftliteError::IoWrite { detail: "page 0 is invalid".to_owned() })?;
                db.main_mut().write_page(number, buf)
            }
            FileKind::Wal => {
                let db = store.get_mut(&self.filename).expect("opened above");
                if offset == 0 && buf.len() == raftlite_store::wal::WAL_HEADER_LEN {
                    db.set_wal_header_bytes(buf)
                } else if offset == db.wal_byte_len() {
                    db.append_raw_frame_bytes(buf)
                } else {
                    Err(RaftliteError::protocol(
                        "WAL writes must be the header at offset 0 or a frame appended at the current tail",
                    ))
                }
            }
            FileKind::Other => {
                let bytes = store.other_mut(&self.filename).expect("opened above");
                let end = offset as usize + buf.len();
                if bytes.len() < end {
                    bytes.resize(end, 0);
                }
                bytes[offset as usize..end].copy_from_slice(buf);
                Ok(())
            }
        }
    }

    fn truncate(&mut self, _cx: &Cx, size: u64) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut store = store.lock().expect("store mutex poisoned");
        match self.kind {
            FileKind::MainDb => {
                let db = store.get_mut(&self.filename).expect("opened above");
                let page_size = db.page_size().map_or(1, PageSize::as_u64).max(1);
                if size % page_size != 0 {
                    return Err(RaftliteError::IoTruncate {
                        detail: "main DB truncate must be a multiple of the page size".to_owned(),
                    });
                }
                db.main_mut().truncate(u32::try_from(size / page_size).unwrap_or(u32::MAX))
            }
            FileKind::Wal => {
                if size != 0 {
                    return Err(RaftliteError::protocol("non-zero WAL truncation is refused"));
                }
                let db = store.get_mut(&self.filename).expect("opened above");
                db.checkpoint_truncate()
            }
            FileKind::Other => {
                let bytes = store.other_mut(&self.filename).expect("opened above");
                bytes.truncate(size as usize);
                Ok(())
            }
        }
    }

    fn file_size(&self) -> Result<u64> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let store = store.lock().expect("store mutex poisoned");
        Ok(match self.kind {
            FileKind::MainDb => {
                let db = store.get(&self.filename).ok_or_else(|| RaftliteError::not_found(&self.filename))?;
                u64::from(db.main().page_count()) * db.page_size().map_or(0, PageSize::as_u64)
            }
            FileKind::Wal => store
                .get(&self.filename)
                .map_or(0, raftlite_store::DatabaseFile::wal_byte_len),
            FileKind::Other => store.other(&self.filename).map_or(0, |b| b.len() as u64),
        })
    }

    fn sync(&mut self, _cx: &Cx) -> Result<()> {
        Ok(())
    }

    fn file_control_pragma(&mut self, name: &str, value: &str) -> Result<Option<String>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let mut store = store.lock().expect("store mutex poisoned");
        match name {
            "page_size" => {
                let requested: u32 = value
                    .parse()
                    .map_err(|_| RaftliteError::parse(format!("invalid page_size value: {value}")))?;
                let Some(page_size) = PageSize::new(requested) else {
                    return Err(RaftliteError::IoWrite {
                        detail: format!("page_size {requested} is not a valid power of two in range"),
                    });
                };
                let db = store.get_or_create(&self.filename);
                if let Some(existing) = db.page_size() {
                    if existing != page_size {
                        return Err(RaftliteError::IoWrite {
                            detail: "page_size cannot change once established".to_owned(),
                        });
                    }
                }
                Ok(None)
            }
            "journal_mode" => {
                if value.eq_ignore_ascii_case("wal") {
                    Ok(None)
                } else {
                    Err(RaftliteError::IoWrite {
                        detail: format!("journal_mode {value} is not supported; only WAL is"),
                    })
                }
            }
            _ => Ok(Some(String::new())),
        }
    }

    fn shm_map(&mut self, index: usize, extend: bool) -> Option<Vec<u8>> {
        let store = self.store.as_ref()?;
        let mut store = store.lock().expect("store mutex poisoned");
        let db = store.get_mut(&self.filename)?;
        db.shm_mut().map(index, extend).map(<[u8]>::to_vec)
    }

    fn shm_write_back(&mut self, index: usize, data: &[u8]) {
        let Some(store) = &self.store else { return };
        let mut store = store.lock().expect("store mutex poisoned");
        if let Some(db) = store.get_mut(&self.filename) {
            if let Some(segment) = db.shm_mut().map(index, true) {
                let len = segment.len().min(data.len());
                segment[..len].copy_from_slice(&data[..len]);
            }
        }
    }

    fn shm_lock_shared(&mut self, slot: usize) -> Result<()> {
        self.with_shm(|shm| shm.lock_shared(slot))
    }

    fn shm_lock_exclusive(&mut self, slot: usize) -> Result<()> {
        self.with_shm(|shm| shm.lock_exclusive(slot))
    }

    fn shm_unlock_shared(&mut self, slot: usize) -> Result<()> {
        self.with_shm(|shm| shm.unlock_shared(slot))
    }

    fn shm_unlock_exclusive(&mut self, slot: usize) -> Result<()> {
        self.with_shm(|shm| shm.unlock_exclusive(slot))
    }

    fn shm_barrier(&self) {}
}

impl MemoryVfsFile {
    fn with_shm(&mut self, f: impl FnOnce(&mut raftlite_store::ShmRegion) -> Result<()>) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut store = store.lock().expect("store mutex poisoned");
        let db = store
            .get_mut(&self.filename)
            .ok_or_else(|| RaftliteError::not_found(&self.filename))?;
        f(db.shm_mut())
    }
}
