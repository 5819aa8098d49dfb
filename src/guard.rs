//! Interruptible exclusive guard, one per vault slot.
//!
//! `Exclusive<T>` serializes every operation on one vault: lifecycle
//! commands and data channel I/O all take the same guard, so a vault has at
//! most one in-flight mutating operation at any time. Acquisition blocks,
//! but a blocked waiter can be interrupted through a [`CancelToken`]; an
//! interrupted acquisition returns [`GuardError::Interrupted`] without any
//! state change, and the caller is expected to retry the whole operation.
//!
//! The guard survives across create/delete cycles of the slot it protects;
//! only the protected contents reset.
//!
//! # Design
//!
//! The protected state lives in a `Mutex<Option<T>>`. Holding the guard
//! means having taken the `T` out of the option; releasing puts it back and
//! notifies the condvar. A cancelled token wakes all waiters it was
//! registered with through the same condvar, so interruption is
//! event-driven rather than polled.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

/// Errors from guard acquisition
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GuardError {
    /// Acquisition was cancelled while blocked; nothing was mutated
    #[error("Guard acquisition was interrupted")]
    Interrupted,
}

/// Lock a mutex, continuing through poison.
///
/// A panic in another thread must not wedge the whole slot; the protected
/// state is put back on every release path, so the contents stay coherent.
fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wakes waiters blocked on a guard. Implemented by every guard cell so a
/// token can interrupt waiters regardless of the protected type.
trait WakeWaiters: Send + Sync {
    fn wake_waiters(&self);
}

struct GuardCell<T> {
    state: Mutex<Option<T>>,
    available: Condvar,
}

impl<T: Send> WakeWaiters for GuardCell<T> {
    fn wake_waiters(&self) {
        // Taking the state mutex orders the wakeup after any waiter that
        // has checked the token but not yet started waiting.
        let _state = lock_ignore_poison(&self.state);
        self.available.notify_all();
    }
}

/// Cancellation signal for blocked guard acquisitions.
///
/// Cloneable; all clones share the same flag. Once cancelled, every pending
/// and future acquisition through this token fails with
/// [`GuardError::Interrupted`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn WakeWaiters>>>,
}

impl CancelToken {
    /// Create a token that has not been cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the token has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the token and wake every registered waiter
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let waiters = std::mem::take(&mut *lock_ignore_poison(&self.inner.waiters));
        for waiter in waiters {
            if let Some(cell) = waiter.upgrade() {
                cell.wake_waiters();
            }
        }
    }

    fn register(&self, cell: Weak<dyn WakeWaiters>) {
        lock_ignore_poison(&self.inner.waiters).push(cell);
    }
}

/// Exclusive, interruptible lock around a value
pub struct Exclusive<T> {
    cell: Arc<GuardCell<T>>,
}

impl<T: Send + 'static> Exclusive<T> {
    /// Create a guard around `value`
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(GuardCell {
                state: Mutex::new(Some(value)),
                available: Condvar::new(),
            }),
        }
    }

    /// Acquire the guard, blocking until it is free or `token` is cancelled.
    ///
    /// A token that is already cancelled fails immediately, even if the
    /// guard is free. On success the returned handle gives exclusive access
    /// to the value; dropping the handle releases the guard on every path.
    pub fn lock(&self, token: &CancelToken) -> Result<ExclusiveHandle<'_, T>, GuardError> {
        let mut registered = false;
        let mut state = lock_ignore_poison(&self.cell.state);
        loop {
            if token.is_cancelled() {
                return Err(GuardError::Interrupted);
            }
            if let Some(value) = state.take() {
                return Ok(ExclusiveHandle {
                    cell: &self.cell,
                    value: Some(value),
                });
            }
            if !registered {
                token.register(Arc::downgrade(&self.cell) as Weak<dyn WakeWaiters>);
                registered = true;
            }
            state = self
                .cell
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Exclusive access to the guarded value; releases the guard on drop
pub struct ExclusiveHandle<'a, T> {
    cell: &'a GuardCell<T>,
    value: Option<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for ExclusiveHandle<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveHandle")
            .field("value", &self.value)
            .finish()
    }
}

impl<T> Deref for ExclusiveHandle<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("guard handle holds the value")
    }
}

impl<T> DerefMut for ExclusiveHandle<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("guard handle holds the value")
    }
}

impl<T> Drop for ExclusiveHandle<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            let mut state = lock_ignore_poison(&self.cell.state);
            *state = Some(value);
            self.cell.available.notify_all();
        }
    }
}
