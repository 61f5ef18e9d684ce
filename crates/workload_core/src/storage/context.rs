//! Request-scoped cancellation signal.
//!
//! A `Context` is created by the transport for each inbound request and
//! passed down to every storage call made on its behalf. Clones share the
//! same flag and the same set of cancel hooks.
//!
//! # Invariants
//! - A hook registered before or after cancellation runs at least once
//!   while its [`CancelHook`] guard is alive.
//! - Once a guard has been dropped its hook never runs again.

use crate::db::{DbError, DbResult};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Shared {
    cancelled: AtomicBool,
    next_hook_id: AtomicU64,
    hooks: Mutex<Vec<(u64, Hook)>>,
}

impl Shared {
    fn hooks(&self) -> MutexGuard<'_, Vec<(u64, Hook)>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks this context and every clone of it as cancelled, then runs the
    /// registered cancel hooks.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        for (_, hook) in self.shared.hooks().iter() {
            hook();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Returns `DbError::Cancelled` once the context has been cancelled.
    pub fn check(&self) -> DbResult<()> {
        if self.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        Ok(())
    }

    /// Registers `hook` to run on cancellation while the returned guard is
    /// alive. Runs it immediately when the context is already cancelled.
    ///
    /// Storage adapters use this to interrupt a statement that is already
    /// executing.
    pub fn on_cancel(&self, hook: impl Fn() + Send + Sync + 'static) -> CancelHook {
        let id = self.shared.next_hook_id.fetch_add(1, Ordering::Relaxed);
        let mut hooks = self.shared.hooks();
        if self.is_cancelled() {
            hook();
        }
        hooks.push((id, Box::new(hook)));

        CancelHook {
            shared: Arc::clone(&self.shared),
            id,
        }
    }

    /// Returns a guard that cancels this context when dropped, unless it was
    /// disarmed first.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            ctx: Some(self.clone()),
        }
    }
}

/// Keeps a cancel hook registered. Dropping it unregisters the hook.
pub struct CancelHook {
    shared: Arc<Shared>,
    id: u64,
}

impl Debug for CancelHook {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHook").field("id", &self.id).finish()
    }
}

impl Drop for CancelHook {
    fn drop(&mut self) {
        self.shared.hooks().retain(|(id, _)| *id != self.id);
    }
}

/// Cancels its context on drop. Held by request futures so that dropping the
/// future (client went away) stops storage work started on its behalf.
#[derive(Debug)]
pub struct CancelOnDrop {
    ctx: Option<Context>,
}

impl CancelOnDrop {
    /// Consumes the guard without cancelling.
    pub fn disarm(mut self) {
        self.ctx = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.cancel();
        }
    }
}
