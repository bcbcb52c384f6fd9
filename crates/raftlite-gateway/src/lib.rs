//! Per-connection request dispatch (spec §4.7): `open`/`prepare`/`exec`/
//! `query`/`finalize`/`exec_sql`/`query_sql`/`interrupt` against an
//! abstract [`SqlEngine`], barriered and single-writer-disciplined
//! through `raftlite-leader`.

pub mod gateway;
pub mod pragma;
pub mod rows;
pub mod sql_engine;

pub use gateway::{ExecResult, Gateway, QueryResult};
pub use rows::{Eof, ROW_STREAM_DONE, ROW_STREAM_PART};
pub use sql_engine::{SqlEngine, StepOutcome};
