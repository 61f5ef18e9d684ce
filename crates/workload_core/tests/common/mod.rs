//! Deterministic storage double shared by integration tests.
//!
//! Every `execute`/`query` call is recorded. Results are scripted per call in
//! FIFO order; unscripted calls succeed with one affected row or an empty
//! cursor.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use workload_core::{Context, DbError, DbResult, RowCursor, Scan, ScanError, Storage, Value};

/// One scripted step of a cursor.
#[derive(Debug)]
pub enum Step {
    Row(Vec<Value>),
    Fail(DbError),
    /// Cancels the cursor's context, as a client disconnect would.
    Cancel,
}

pub fn row(id: &str, name: &str) -> Step {
    Step::Row(vec![Value::from(id), Value::from(name)])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Execute,
    Query,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub kind: CallKind,
    pub sql: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct ScriptedStorage {
    executes: Mutex<VecDeque<DbResult<usize>>>,
    queries: Mutex<VecDeque<DbResult<Vec<Step>>>>,
    calls: Mutex<Vec<Call>>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_execute(&self, result: DbResult<usize>) -> &Self {
        self.executes.lock().unwrap().push_back(result);
        self
    }

    pub fn push_query(&self, result: DbResult<Vec<Step>>) -> &Self {
        self.queries.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of cursors handed out.
    pub fn cursors_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of cursors released, counting each cursor at most once.
    pub fn cursors_released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn record(&self, kind: CallKind, sql: &str, args: &[Value]) {
        self.calls.lock().unwrap().push(Call {
            kind,
            sql: sql.to_string(),
            args: args.to_vec(),
        });
    }
}

impl Storage for ScriptedStorage {
    type Rows = ScriptedCursor;

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<usize> {
        ctx.check()?;
        self.record(CallKind::Execute, sql, args);
        self.executes.lock().unwrap().pop_front().unwrap_or(Ok(1))
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<ScriptedCursor> {
        ctx.check()?;
        self.record(CallKind::Query, sql, args);
        let steps = self
            .queries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))?;

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedCursor {
            state: CursorState::HasRows(steps.into()),
            current: None,
            ctx: ctx.clone(),
            released: Some(Arc::clone(&self.released)),
        })
    }
}

/// Cursor position: more steps pending, cleanly exhausted, or stopped on a
/// terminal error (taken at most once).
#[derive(Debug)]
enum CursorState {
    HasRows(VecDeque<Step>),
    Exhausted,
    Failed(Option<DbError>),
}

#[derive(Debug)]
pub struct ScriptedCursor {
    state: CursorState,
    current: Option<Vec<Value>>,
    ctx: Context,
    released: Option<Arc<AtomicUsize>>,
}

impl RowCursor for ScriptedCursor {
    fn advance(&mut self) -> bool {
        self.current = None;
        if self.released.is_none() {
            return false;
        }
        if self.ctx.is_cancelled() {
            if !matches!(self.state, CursorState::Failed(_)) {
                self.state = CursorState::Failed(Some(DbError::Cancelled));
            }
            return false;
        }

        let CursorState::HasRows(steps) = &mut self.state else {
            return false;
        };
        match steps.pop_front() {
            Some(Step::Row(values)) => {
                self.current = Some(values);
                true
            }
            Some(Step::Fail(err)) => {
                self.state = CursorState::Failed(Some(err));
                false
            }
            Some(Step::Cancel) => {
                self.ctx.cancel();
                self.state = CursorState::Failed(Some(DbError::Cancelled));
                false
            }
            None => {
                self.state = CursorState::Exhausted;
                false
            }
        }
    }

    fn scan(&mut self, dest: &mut [&mut dyn Scan]) -> DbResult<()> {
        let row = self.current.as_deref().ok_or(ScanError::NoCurrentRow)?;
        workload_core::storage::scan_row(row, dest)?;
        Ok(())
    }

    fn take_error(&mut self) -> Option<DbError> {
        match &mut self.state {
            CursorState::Failed(err) => err.take(),
            CursorState::HasRows(_) | CursorState::Exhausted => None,
        }
    }

    fn close(&mut self) {
        if let Some(released) = self.released.take() {
            released.fetch_add(1, Ordering::SeqCst);
        }
        self.current = None;
    }
}

impl Drop for ScriptedCursor {
    fn drop(&mut self) {
        self.close();
    }
}

pub fn unique_violation() -> DbError {
    DbError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY),
        Some("UNIQUE constraint failed: apps.id".to_string()),
    ))
}
