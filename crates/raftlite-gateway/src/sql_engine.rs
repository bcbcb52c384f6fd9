//! The slice of a SQL engine the gateway needs to drive statements: it
//! never touches pages or the WAL directly, only prepare/bind/step/finalize.
//! A real engine sits on top of `raftlite-vfs`; tests use a stand-in.

use raftlite_error::Result;
use raftlite_types::Tuple;

/// What `step` produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Row(Tuple),
    Done,
}

/// Abstract SQL engine, parameterized over its own statement handle type.
/// The gateway owns statement lifetime (registry slot); the engine only
/// needs to prepare/bind/step/finalize against whatever connection it
/// keeps internally.
pub trait SqlEngine {
    type Stmt;

    /// Attach the engine to the database the gateway just opened, mirroring
    /// `sqlite3_open` in a real implementation.
    fn open(&mut self, filename: &str) -> Result<()>;
    fn prepare(&mut self, sql: &str) -> Result<Self::Stmt>;
    fn bind(&mut self, stmt: &mut Self::Stmt, params: &Tuple) -> Result<()>;
    fn step(&mut self, stmt: &mut Self::Stmt) -> Result<StepOutcome>;
    fn finalize(&mut self, stmt: Self::Stmt) -> Result<()>;

    /// Number of `?` placeholders the prepared statement expects.
    fn param_count(&self, stmt: &Self::Stmt) -> usize;
    /// Whether the last `step` (or this statement in general) touched the
    /// WAL — determines whether the gateway must route the commit through
    /// the leader's single-writer/replicate path.
    fn is_write(&self, stmt: &Self::Stmt) -> bool;
    fn last_insert_rowid(&self) -> i64;
    fn rows_affected(&self) -> i64;
}
