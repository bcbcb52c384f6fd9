//! Domain error kinds for the raftlite workspace.
//!
//! One flat enum: every fallible function in every raftlite crate
//! returns `raftlite_error::Result<T>`.

use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RaftliteError>;

/// Domain-level error kinds, matching the error taxonomy of the
/// specification's error-handling design section.
#[derive(Debug, thiserror::Error)]
pub enum RaftliteError {
    /// Malformed command, unknown type tag, or bad format byte.
    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    /// Short or invalid serialized data.
    #[error("parse error: {detail}")]
    Parse { detail: String },

    /// Page-store read failed (short read past EOF, etc).
    #[error("I/O read error: {detail}")]
    IoRead { detail: String },

    /// Page-store write failed (partial page, out-of-pattern write).
    #[error("I/O write error: {detail}")]
    IoWrite { detail: String },

    /// A read returned fewer bytes than requested.
    #[error("I/O short read: {detail}")]
    IoShort { detail: String },

    /// Delete refused (open handles, or file absent).
    #[error("I/O delete error: {detail}")]
    IoDelete { detail: String },

    /// `xOpen` refused, e.g. `EXCLUSIVE|CREATE` on a file that already exists.
    #[error("cannot open: {detail}")]
    CantOpen { detail: String },

    /// Truncate refused (not a multiple of page size, or would grow).
    #[error("I/O truncate error: {detail}")]
    IoTruncate { detail: String },

    /// Durable sync failed.
    #[error("I/O fsync error: {detail}")]
    IoFsync { detail: String },

    /// Attempted to mutate state while not the Raft leader.
    #[error("not leader")]
    NotLeader,

    /// Lock conflict; caller may retry.
    #[error("busy")]
    Busy,

    /// Serialization conflict between a concurrent reader and writer.
    #[error("busy: snapshot conflict")]
    BusySnapshot,

    /// Database, statement, or file not found.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Allocation failure.
    #[error("out of memory")]
    NoMem,

    /// Page-size or header sanity failure.
    #[error("corrupt: {detail}")]
    Corrupt { detail: String },

    /// A value fell outside its legal domain.
    #[error("out of range: {what} = {value}")]
    OutOfRange { what: String, value: String },

    /// Write attempted against a read-only transaction or connection.
    #[error("read-only")]
    ReadOnly,

    /// SQL constraint or other SQL-engine-level error, surfaced verbatim.
    #[error("constraint violation: {message}")]
    Constraint { message: String },

    /// Catch-all for invariant violations that should never happen in a
    /// correct build; distinct from `Corrupt`, which denotes bad on-disk or
    /// on-wire data rather than a programming error.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl RaftliteError {
    /// Build an [`RaftliteError::Internal`] from any displayable message.
    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::Internal {
            detail: detail.to_string(),
        }
    }

    /// Build a [`RaftliteError::NotFound`] for the given subject.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    /// Build a [`RaftliteError::Protocol`] error.
    pub fn protocol(detail: impl fmt::Display) -> Self {
        Self::Protocol {
            detail: detail.to_string(),
        }
    }

    /// Build a [`RaftliteError::Parse`] error.
    pub fn parse(detail: impl fmt::Display) -> Self {
        Self::Parse {
            detail: detail.to_string(),
        }
    }

    /// Build a [`RaftliteError::Corrupt`] error.
    pub fn corrupt(detail: impl fmt::Display) -> Self {
        Self::Corrupt {
            detail: detail.to_string(),
        }
    }

    /// Whether this error is the kind of lock conflict a caller should retry.
    #[must_use]
    pub fn is_retryable_busy(&self) -> bool {
        matches!(self, Self::Busy | Self::BusySnapshot)
    }
}
