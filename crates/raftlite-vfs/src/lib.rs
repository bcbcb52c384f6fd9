//! The custom VFS: impersonates the SQL engine's file interface against a
//! [`raftlite_store::Store`], with no disk I/O on the hot path.

pub mod memory_vfs;
pub mod traits;

pub use memory_vfs::{MemoryVfs, MemoryVfsFile};
pub use traits::{Vfs, VfsFile};
