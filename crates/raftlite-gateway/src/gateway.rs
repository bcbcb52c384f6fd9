//! Per-connection request dispatcher (spec §4.7): owns the one database
//! this connection may have open, the statements it has prepared against
//! it, and drives exec/query through the single-writer/replicate path on
//! writes and a Raft read barrier on every request.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use raftlite_error::{RaftliteError, Result};
use raftlite_fsm::RaftHandle;
use raftlite_leader::{Leader, WriterBook};
use raftlite_registry::Registry;
use raftlite_store::Store;
use raftlite_types::Tuple;

use crate::pragma::is_delete_database_pragma;
use crate::rows::{encode_row_batch, Eof};
use crate::sql_engine::{SqlEngine, StepOutcome};

/// Result of a non-streaming `exec`/`exec_sql` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub last_insert_rowid: i64,
    pub rows_affected: i64,
}

/// Result of a `query`/`query_sql` call: a framed batch plus whether more
/// remain.
pub struct QueryResult {
    pub wire: Vec<u8>,
    pub eof: Eof,
}

const ROW_BATCH_SIZE: usize = 512;

struct OpenDb {
    db_id: u64,
    filename: String,
    leader: Option<Leader>,
    /// Set while inside a write whose only effect, if it commits, should
    /// be deleting the database (spec §4.7's `delete_database` pragma).
    pending_delete: bool,
}

struct StmtSlot<S> {
    db_id: u64,
    sql: String,
    stmt: Option<S>,
}

/// One gateway per client connection. Generic over the SQL engine so the
/// dispatch logic here never depends on a concrete query executor.
pub struct Gateway<E: SqlEngine> {
    conn_id: u64,
    store: Arc<Mutex<Store>>,
    writer_book: Arc<Mutex<WriterBook>>,
    busy_timeout: Duration,
    engine: E,
    open_db: Option<OpenDb>,
    stmts: Registry<StmtSlot<E::Stmt>>,
    next_db_id: u64,
}

impl<E: SqlEngine> Gateway<E> {
    #[must_use]
    pub fn new(
        conn_id: u64,
        store: Arc<Mutex<Store>>,
        writer_book: Arc<Mutex<WriterBook>>,
        engine: E,
        busy_timeout: Duration,
    ) -> Self {
        Self {
            conn_id,
            store,
            writer_book,
            busy_timeout,
            engine,
            open_db: None,
            stmts: Registry::new(),
            next_db_id: 1,
        }
    }

    /// `open | db_name, flags | DB{id}`: one database per connection; a
    /// second `open` on an already-open connection is rejected as `Busy`
    /// rather than silently replacing the handle.
    pub fn open(&mut self, filename: &str) -> Result<u64> {
        if self.open_db.is_some() {
            return Err(RaftliteError::Busy);
        }
        self.store.lock().expect("store mutex poisoned").get_or_create(filename);
        self.engine.open(filename)?;
        let db_id = self.next_db_id;
        self.next_db_id += 1;
        self.open_db = Some(OpenDb {
            db_id,
            filename: filename.to_owned(),
            leader: None,
            pending_delete: false,
        });
        Ok(db_id)
    }

    fn require_open_db(&self) -> Result<&OpenDb> {
        self.open_db.as_ref().ok_or_else(|| RaftliteError::internal("no database open on this connection"))
    }

    fn stmt_id(stmt_id: u64) -> Result<usize> {
        usize::try_from(stmt_id).map_err(|_| RaftliteError::NotFound("bad stmt_id".into()))
    }

    /// `prepare | db_id, sql | STMT{db_id,id,params_count}`.
    pub fn prepare(&mut self, db_id: u64, sql: &str) -> Result<(u64, usize)> {
        if self.require_open_db()?.db_id != db_id {
            return Err(RaftliteError::NotFound("unknown db_id".into()));
        }
        if is_delete_database_pragma(sql) {
            // Never compiled by the engine; tracked on the connection and
            // resolved when the surrounding write transaction commits.
            let id = self.stmts.add(StmtSlot { db_id, sql: sql.to_owned(), stmt: None });
            return Ok((id as u64, 0));
        }
        let stmt = self.engine.prepare(sql)?;
        let params_count = self.engine.param_count(&stmt);
        let id = self.stmts.add(StmtSlot { db_id, sql: sql.to_owned(), stmt: Some(stmt) });
        Ok((id as u64, params_count))
    }

    /// `exec | stmt_id, params | RESULT{last_insert,rows_affected}`.
    pub fn exec(&mut self, stmt_id: u64, params: &Tuple, raft: &mut impl RaftHandle) -> Result<ExecResult> {
        raft.barrier()?;
        let id = Self::stmt_id(stmt_id)?;
        let sql = self
            .stmts
            .get(id)
            .ok_or_else(|| RaftliteError::NotFound("unknown stmt_id".into()))?
            .sql
            .clone();
        if is_delete_database_pragma(&sql) {
            self.open_db.as_mut().expect("prepare requires an open db").pending_delete = true;
            return Ok(ExecResult { last_insert_rowid: 0, rows_affected: 0 });
        }
        let filename = self.require_open_db()?.filename.clone();
        let is_write = {
            let slot = self.stmts.get(id).ok_or_else(|| RaftliteError::NotFound("unknown stmt_id".into()))?;
            let stmt = slot.stmt.as_ref().expect("non-pragma statement always compiled");
            self.engine.is_write(stmt)
        };
        if is_write {
            self.begin_write_if_needed(&filename, raft)?;
        }
        let mut stmt = self
            .stmts
            .get_mut(id)
            .and_then(|s| s.stmt.take())
            .expect("non-pragma statement always compiled");
        self.engine.bind(&mut stmt, params)?;
        loop {
            match self.engine.step(&mut stmt)? {
                StepOutcome::Done => break,
                StepOutcome::Row(_) => {
                    // exec() ignores result rows; query()/query_sql() stream them.
                }
            }
        }
        self.stmts.get_mut(id).expect("slot still present").stmt = Some(stmt);
        let result = ExecResult {
            last_insert_rowid: self.engine.last_insert_rowid(),
            rows_affected: self.engine.rows_affected(),
        };
        if is_write {
            self.commit_write(&filename, raft)?;
        }
        Ok(result)
    }

    /// `query | stmt_id, params | ROWS{...}`: drives the statement to
    /// exhaustion or up to `ROW_BATCH_SIZE` rows, whichever comes first.
    pub fn query(&mut self, stmt_id: u64, params: &Tuple, raft: &mut impl RaftHandle) -> Result<QueryResult> {
        raft.barrier()?;
        let id = Self::stmt_id(stmt_id)?;
        let mut stmt = self
            .stmts
            .get_mut(id)
            .and_then(|s| s.stmt.take())
            .ok_or_else(|| RaftliteError::internal("pragma statement has no rows"))?;
        self.engine.bind(&mut stmt, params)?;
        let mut rows = Vec::new();
        let mut eof = Eof::Done;
        for _ in 0..ROW_BATCH_SIZE {
            match self.engine.step(&mut stmt)? {
                StepOutcome::Row(row) => rows.push(row),
                StepOutcome::Done => break,
            }
        }
        if rows.len() == ROW_BATCH_SIZE {
            eof = Eof::Part;
        }
        self.stmts.get_mut(id).expect("slot still present").stmt = Some(stmt);
        Ok(QueryResult { wire: encode_row_batch(&rows, eof), eof })
    }

    /// `finalize | stmt_id | (ack)`.
    pub fn finalize(&mut self, stmt_id: u64) -> Result<()> {
        let id = Self::stmt_id(stmt_id)?;
        let slot = self.stmts.remove(id).ok_or_else(|| RaftliteError::NotFound("unknown stmt_id".into()))?;
        if let Some(stmt) = slot.stmt {
            self.engine.finalize(stmt)?;
        }
        Ok(())
    }

    /// `exec_sql | db_id, sql, params | RESULT{...}`: one-shot prepare +
    /// exec + finalize, for clients that don't want to manage a handle.
    pub fn exec_sql(&mut self, db_id: u64, sql: &str, params: &Tuple, raft: &mut impl RaftHandle) -> Result<ExecResult> {
        let (stmt_id, _) = self.prepare(db_id, sql)?;
        let result = self.exec(stmt_id, params, raft);
        let _ = self.finalize(stmt_id);
        result
    }

    /// `query_sql | db_id, sql, params | ROWS{...}`.
    pub fn query_sql(&mut self, db_id: u64, sql: &str, params: &Tuple, raft: &mut impl RaftHandle) -> Result<QueryResult> {
        let (stmt_id, _) = self.prepare(db_id, sql)?;
        let result = self.query(stmt_id, params, raft);
        let _ = self.finalize(stmt_id);
        result
    }

    /// `interrupt | (none) | (ack)`: best-effort; nothing to cancel in
    /// this single-threaded-per-connection model beyond rejecting a stale
    /// write so the caller can retry cleanly.
    pub fn interrupt(&mut self) -> Result<()> {
        if let Some(db) = &self.open_db {
            self.writer_book.lock().expect("writer book mutex poisoned").clear(&db.filename);
        }
        Ok(())
    }

    fn begin_write_if_needed(&mut self, filename: &str, raft: &impl RaftHandle) -> Result<()> {
        let needs_leader = self.open_db.as_ref().is_some_and(|d| d.leader.is_none());
        if needs_leader {
            if !raft.is_leader() {
                return Err(RaftliteError::NotLeader);
            }
            let tx_id = raft.last_applied();
            let leader = Leader::new(self.conn_id, filename.to_owned(), self.busy_timeout);
            self.writer_book
                .lock()
                .expect("writer book mutex poisoned")
                .try_begin(filename, tx_id, self.conn_id)?;
            self.open_db.as_mut().expect("checked above").leader = Some(leader);
        }
        Ok(())
    }

    /// Runs the two-phase commit split (see `raftlite-leader`): inspect
    /// the WAL tail under the store lock, then release the lock before
    /// proposing, since `propose` re-enters the same store through the
    /// FSM.
    fn commit_write(&mut self, filename: &str, raft: &mut impl RaftHandle) -> Result<()> {
        let Some(leader) = self.open_db.as_mut().and_then(|d| d.leader.take()) else {
            return Ok(());
        };
        let intent = {
            let mut store = self.store.lock().expect("store mutex poisoned");
            let db = store.get_mut(filename).ok_or_else(|| RaftliteError::not_found(filename))?;
            let book = self.writer_book.lock().expect("writer book mutex poisoned");
            leader.prepare_commit(&book, db)?
        };
        let pending_delete = self.open_db.as_ref().is_some_and(|d| d.pending_delete);
        let deletes_now = intent.is_none() && pending_delete;
        {
            let mut book = self.writer_book.lock().expect("writer book mutex poisoned");
            leader.finish_commit(&mut book, intent, raft)?;
        }
        if deletes_now {
            self.store.lock().expect("store mutex poisoned").delete(filename)?;
        }
        if let Some(open) = &mut self.open_db {
            open.pending_delete = false;
        }
        Ok(())
    }
}
