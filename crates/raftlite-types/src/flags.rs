//! Open/sync/lock flag types shared by the VFS and store layers.

use bitflags::bitflags;

bitflags! {
    /// Mirrors the subset of SQLite's `xOpen` flags the VFS cares about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct VfsOpenFlags: u32 {
        const READONLY     = 0x0000_0001;
        const READWRITE    = 0x0000_0002;
        const CREATE       = 0x0000_0004;
        const EXCLUSIVE    = 0x0000_0010;
        const DELETEONCLOSE = 0x0000_0008;
        const MAIN_DB      = 0x0000_0100;
        const WAL          = 0x0000_0200;
        const OTHER        = 0x0000_0400;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct SyncFlags: u32 {
        const NORMAL  = 0x0000_0002;
        const FULL    = 0x0000_0003;
        const DATAONLY = 0x0000_0010;
    }
}

/// The namespace a VFS-opened file belongs to, per the specification's
/// three typed namespaces: main-DB, WAL, other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    MainDb,
    Wal,
    Other,
}

impl FileKind {
    /// Derive the file kind from `xOpen` flags, the way the VFS resolves
    /// `MAIN_DB` vs `WAL` vs `OTHER` at open time.
    #[must_use]
    pub fn from_open_flags(flags: VfsOpenFlags) -> Self {
        if flags.contains(VfsOpenFlags::MAIN_DB) {
            Self::MainDb
        } else if flags.contains(VfsOpenFlags::WAL) {
            Self::Wal
        } else {
            Self::Other
        }
    }
}

/// A shared-memory lock request kind, used by `xShmLock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    Shared,
    Exclusive,
}

/// Whether a lock request acquires or releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockOp {
    Lock,
    Unlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_prefers_main_db_over_wal_if_both_set() {
        let flags = VfsOpenFlags::MAIN_DB | VfsOpenFlags::WAL;
        assert_eq!(FileKind::from_open_flags(flags), FileKind::MainDb);
    }

    #[test]
    fn file_kind_defaults_to_other() {
        assert_eq!(
            FileKind::from_open_flags(VfsOpenFlags::READWRITE),
            FileKind::Other
        );
    }
}
