//! `raftlite`: the embeddable Raft-replicated SQL engine facade.
//!
//! This crate does not implement a SQL engine itself — that is supplied
//! by whatever sits on top of [`raftlite_vfs`] through the
//! [`raftlite_gateway::SqlEngine`] trait. What lives here is everything
//! a host needs to stand up one node: configuration, the shared page
//! store/VFS/registry wiring in [`node`], and the TCP transport traits
//! the replication layer dials peers through.

pub mod config;
pub mod node;
pub mod transport;

pub use config::NodeConfig;
pub use node::Node;
pub use transport::{Address, Connect, Listener, TcpBoundListener, TcpTransport};

/// Install a `tracing_subscriber` formatter reading `RUST_LOG`, the way
/// every long-running binary in this ecosystem starts up.
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
