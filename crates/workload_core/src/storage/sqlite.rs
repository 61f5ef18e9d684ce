//! SQLite implementation of the storage port.
//!
//! # Responsibility
//! - Bind positional `Value` arguments through rusqlite parameter binding.
//! - Serialize access to the single connection.
//! - Produce buffered cursors that keep the row/exhausted/error distinction.
//!
//! # Invariants
//! - The connection lock is never held by a cursor; rows are stepped and
//!   buffered while the lock is held, then released before returning.
//! - A step failure after some rows becomes the cursor's terminal error.
//! - Cancellation is re-checked once the lock is held, and cancelling while a
//!   statement runs interrupts it; the call then reports `Cancelled`.
//! - TEXT columns that are not valid UTF-8 fail the read instead of being
//!   replaced.

use super::{scan_row, CancelHook, Context, RowCursor, Scan, ScanError, Storage, Value};
use crate::db::{DbError, DbResult};
use log::{debug, warn};
use rusqlite::types::{ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Shareable SQLite-backed storage handle.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::ConnectionPoisoned)
    }
}

impl Storage for SqliteStorage {
    type Rows = SqliteRows;

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<usize> {
        ctx.check()?;
        let conn = self.lock()?;
        let _interrupt = interrupt_on_cancel(ctx, &conn)?;
        let changed = conn
            .execute(sql, params_from_iter(args.iter()))
            .map_err(|err| cancelled_or(ctx, err))?;
        debug!("event=storage_execute module=storage status=ok changed={changed}");
        Ok(changed)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<SqliteRows> {
        ctx.check()?;
        let conn = self.lock()?;
        let _interrupt = interrupt_on_cancel(ctx, &conn)?;
        let mut stmt = conn.prepare(sql).map_err(|err| cancelled_or(ctx, err))?;
        let column_count = stmt.column_count();
        let mut rows = stmt
            .query(params_from_iter(args.iter()))
            .map_err(|err| cancelled_or(ctx, err))?;

        let mut buffered = VecDeque::new();
        let mut terminal = None;
        loop {
            if ctx.is_cancelled() {
                terminal = Some(DbError::Cancelled);
                break;
            }
            match rows.next() {
                Ok(Some(row)) => match read_row(row, column_count) {
                    Ok(values) => buffered.push_back(values),
                    Err(err) => {
                        terminal = Some(cancelled_or(ctx, err));
                        break;
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    terminal = Some(cancelled_or(ctx, err));
                    break;
                }
            }
        }

        if let Some(err) = &terminal {
            warn!(
                "event=storage_query module=storage status=error buffered_rows={} error={}",
                buffered.len(),
                err
            );
        }

        Ok(SqliteRows {
            pending: buffered,
            current: None,
            error: terminal,
            ctx: ctx.clone(),
            closed: false,
        })
    }
}

/// Re-checks `ctx` under the connection lock and arms an interrupt of the
/// running statement for the rest of the call.
///
/// The returned hook must be dropped before the lock is released so a late
/// cancel can never interrupt another caller's statement.
fn interrupt_on_cancel(ctx: &Context, conn: &Connection) -> DbResult<CancelHook> {
    ctx.check()?;
    let handle = conn.get_interrupt_handle();
    Ok(ctx.on_cancel(move || handle.interrupt()))
}

/// Reports a driver failure as `Cancelled` when the context was cancelled,
/// since an interrupted statement surfaces as `SQLITE_INTERRUPT`.
fn cancelled_or(ctx: &Context, err: rusqlite::Error) -> DbError {
    if ctx.is_cancelled() {
        return DbError::Cancelled;
    }
    err.into()
}

fn read_row(row: &Row<'_>, column_count: usize) -> rusqlite::Result<Vec<Value>> {
    (0..column_count)
        .map(|index| {
            Ok(match row.get_ref(index)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(number) => Value::Integer(number),
                ValueRef::Real(number) => Value::Real(number),
                ValueRef::Text(bytes) => {
                    let text = std::str::from_utf8(bytes).map_err(|err| {
                        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
                    })?;
                    Value::Text(text.to_owned())
                }
                ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
            })
        })
        .collect()
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Self::Null => ValueRef::Null,
            Self::Integer(number) => ValueRef::Integer(*number),
            Self::Real(number) => ValueRef::Real(*number),
            Self::Text(text) => ValueRef::Text(text.as_bytes()),
            Self::Blob(bytes) => ValueRef::Blob(bytes),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Cursor over rows buffered from one SQLite query.
#[derive(Debug)]
pub struct SqliteRows {
    pending: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
    error: Option<DbError>,
    ctx: Context,
    closed: bool,
}

impl RowCursor for SqliteRows {
    fn advance(&mut self) -> bool {
        self.current = None;
        if self.closed || self.error.is_some() {
            return false;
        }
        if self.ctx.is_cancelled() {
            self.error = Some(DbError::Cancelled);
            return false;
        }
        self.current = self.pending.pop_front();
        self.current.is_some()
    }

    fn scan(&mut self, dest: &mut [&mut dyn Scan]) -> DbResult<()> {
        let row = self.current.as_deref().ok_or(ScanError::NoCurrentRow)?;
        scan_row(row, dest)?;
        Ok(())
    }

    fn take_error(&mut self) -> Option<DbError> {
        self.error.take()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        self.current = None;
    }
}

impl Drop for SqliteRows {
    fn drop(&mut self) {
        self.close();
    }
}
