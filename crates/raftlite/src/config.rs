//! Node configuration (spec §3.3 of the expanded design): everything a
//! host needs to stand up one `raftlite` node, loadable from TOML the way
//! the teacher threads `PageSize`/`SyncFlags` through pager/VFS
//! construction rather than hand-rolling a parser.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use raftlite_types::PageSize;

/// Construction parameters for a [`crate::node::Node`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name the VFS registers itself under (mirrors `sqlite3_vfs.zName`).
    pub vfs_name: String,
    /// Default page size for newly created databases.
    pub page_size: u32,
    /// WAL byte threshold past which a commit opportunistically triggers
    /// a distributed checkpoint (spec §4.5 point 4 / `gateway.c`'s
    /// `maybe_checkpoint`).
    pub checkpoint_threshold_bytes: u64,
    /// On-disk directory for any host that backs the in-memory store
    /// with snapshots; unused by the in-memory VFS itself.
    pub data_dir: String,
    /// How long `begin_write` retries a contended writer slot before
    /// giving up with `Busy`. Serializes as a table (`secs`/`nanos`), so
    /// it must come last — TOML forbids a scalar field after a table.
    pub busy_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            vfs_name: "raftlite".to_owned(),
            page_size: PageSize::DEFAULT.as_u32(),
            checkpoint_threshold_bytes: 1024 * 1024,
            data_dir: ".".to_owned(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl NodeConfig {
    /// Parse a config from TOML text, filling unset fields from
    /// [`Default`].
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = NodeConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed = NodeConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.vfs_name, cfg.vfs_name);
        assert_eq!(parsed.page_size, cfg.page_size);
    }

    #[test]
    fn partial_toml_fills_the_rest_from_defaults() {
        let parsed = NodeConfig::from_toml("vfs_name = \"custom\"\n").unwrap();
        assert_eq!(parsed.vfs_name, "custom");
        assert_eq!(parsed.page_size, NodeConfig::default().page_size);
    }
}
