//! Storage port: the narrow datastore capability the service depends on.
//!
//! # Responsibility
//! - Define the two operations the service may use: `execute` and `query`.
//! - Define the row cursor contract returned by `query`.
//! - Provide the SQLite-backed implementation used in production.
//!
//! # Invariants
//! - Statements are parameterized; argument values travel separately from
//!   statement text and are bound by the driver.
//! - Implementations propagate driver errors untranslated.
//! - A cursor is released exactly once, whichever path its owner exits by.

mod context;
mod sqlite;
mod value;

pub use context::{CancelHook, CancelOnDrop, Context};
pub use sqlite::{SqliteRows, SqliteStorage};
pub use value::{scan_row, Scan, ScanError, Value};

use crate::db::DbResult;
use std::sync::Arc;

/// Minimal datastore capability required by the service layer.
pub trait Storage {
    /// Cursor type produced by [`Storage::query`].
    type Rows: RowCursor;

    /// Executes a mutating statement and returns the number of affected rows.
    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<usize>;

    /// Executes a query and returns a cursor over its result rows.
    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<Self::Rows>;
}

/// Single-use, single-consumer cursor over query results.
///
/// Iteration has three outcomes: another row is available, the result set is
/// exhausted, or iteration stopped on a terminal error. `advance` returns
/// `false` for both of the latter; `take_error` tells them apart.
pub trait RowCursor {
    /// Moves to the next row. Returns `false` when exhausted or failed.
    fn advance(&mut self) -> bool;

    /// Copies the current row into `dest`, one destination per column.
    fn scan(&mut self, dest: &mut [&mut dyn Scan]) -> DbResult<()>;

    /// Returns the terminal iteration error, if iteration stopped on one.
    fn take_error(&mut self) -> Option<crate::db::DbError>;

    /// Releases the cursor. Calling it more than once is a no-op.
    fn close(&mut self);
}

impl<T: Storage + ?Sized> Storage for &T {
    type Rows = T::Rows;

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<usize> {
        (**self).execute(ctx, sql, args)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<Self::Rows> {
        (**self).query(ctx, sql, args)
    }
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    type Rows = T::Rows;

    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<usize> {
        (**self).execute(ctx, sql, args)
    }

    fn query(&self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<Self::Rows> {
        (**self).query(ctx, sql, args)
    }
}
