//! The generic slot registry (`Registry<T>`, used by the gateway for
//! per-connection statement and leader handles) and the process-wide
//! database registry (`DbRegistry`, spec §4.8).

pub mod db_registry;
pub mod slots;

pub use db_registry::DbRegistry;
pub use slots::Registry;
