//! In-memory page store: the main-DB page array, WAL region, shm lock
//! table, and the per-filename registry that ties them together.

pub mod checksum;
pub mod db_file;
pub mod main_db;
pub mod shm;
pub mod store;
pub mod wal;
pub mod wal_index;

pub use db_file::DatabaseFile;
pub use main_db::MainDb;
pub use shm::ShmRegion;
pub use store::Store;
pub use wal::{Frame, WalHeader};
