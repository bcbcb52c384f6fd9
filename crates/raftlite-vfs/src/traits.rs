//! The abstract file-access surface the SQL engine expects from a VFS.

use raftlite_error::Result;
use raftlite_types::{Cx, VfsOpenFlags};

/// A registered virtual filesystem: resolves filenames to open files.
pub trait Vfs {
    type File: VfsFile;

    /// `xOpen`: resolve `filename` (or `None` for an anonymous scratch
    /// file, which requires `DELETEONCLOSE`) against `flags`.
    fn open(&self, cx: &Cx, filename: Option<&str>, flags: VfsOpenFlags) -> Result<Self::File>;

    /// `xDelete`: refuses if the file has open handles or doesn't exist.
    fn delete(&self, cx: &Cx, filename: &str) -> Result<()>;

    /// `xAccess`: whether `filename` currently exists in the store.
    fn exists(&self, filename: &str) -> bool;
}

/// A single open file handle.
pub trait VfsFile {
    /// `xRead` at `offset`. Implementations zero-fill `buf` on a short
    /// read past EOF before returning the short-read error.
    fn read(&mut self, cx: &Cx, buf: &mut [u8], offset: u64) -> Result<()>;

    /// `xWrite` at `offset`.
    fn write(&mut self, cx: &Cx, buf: &[u8], offset: u64) -> Result<()>;

    /// `xTruncate`: must be a multiple of the page size and may only
    /// shrink the file.
    fn truncate(&mut self, cx: &Cx, size: u64) -> Result<()>;

    /// `xFileSize`.
    fn file_size(&self) -> Result<u64>;

    /// `xSync`: a no-op under this VFS's single-process, quorum-durability
    /// model, but named so call sites read like the original.
    fn sync(&mut self, cx: &Cx) -> Result<()>;

    /// `xFileControl(PRAGMA)`: intercepts `page_size` and `journal_mode`.
    /// Returning `Ok(None)` means "not handled, let the SQL engine's
    /// normal pragma path continue" (the VFS's `NotFound` convention);
    /// `Ok(Some(value))` means the VFS fully answered the pragma.
    fn file_control_pragma(&mut self, name: &str, value: &str) -> Result<Option<String>>;

    /// `xShmMap`.
    fn shm_map(&mut self, index: usize, extend: bool) -> Option<Vec<u8>>;

    /// Write back a previously mapped shm segment (since this trait
    /// returns owned copies from `shm_map` rather than raw pointers).
    fn shm_write_back(&mut self, index: usize, data: &[u8]);

    fn shm_lock_shared(&mut self, slot: usize) -> Result<()>;
    fn shm_lock_exclusive(&mut self, slot: usize) -> Result<()>;
    fn shm_unlock_shared(&mut self, slot: usize) -> Result<()>;
    fn shm_unlock_exclusive(&mut self, slot: usize) -> Result<()>;

    /// `xShmBarrier` / checkpoint-unmap: no-ops under single-process
    /// semantics.
    fn shm_barrier(&self);
}
