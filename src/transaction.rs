//! A trivial global lock dispatch system.
//!
//! Every emitter operation runs inside a `commit` scope. The outermost scope
//! on a thread locks a global mutex, so that a `fire` and everything it
//! cascades into runs to completion before another thread may touch any
//! emitter. Nested scopes on the same thread (a subscriber firing another
//! emitter, a token action canceling a subscription) re-enter without locking.

use std::cell::Cell;
use std::sync::{Mutex, MutexGuard, PoisonError};

lazy_static! {
    static ref DISPATCH_MUTEX: Mutex<()> = Mutex::new(());
}

thread_local!(
    static DEPTH: Cell<usize> = Cell::new(0)
);

/// Restores the nesting depth, even if the body unwinds.
struct Scope {
    _lock: Option<MutexGuard<'static, ()>>,
}

impl Scope {
    fn enter() -> Scope {
        let outermost = DEPTH.with(|depth| {
            let current = depth.get();
            depth.set(current + 1);
            current == 0
        });
        let lock = if outermost {
            // A subscriber that panicked poisons the mutex, but the guarded
            // unit carries no state that could be left inconsistent.
            Some(DISPATCH_MUTEX.lock().unwrap_or_else(PoisonError::into_inner))
        } else {
            None
        };
        Scope { _lock: lock }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `body` as one atomic dispatch.
///
/// If the thread is not inside a dispatch already, the global lock is
/// acquired. Otherwise the body simply runs, since the lock is already held
/// further up the stack.
pub fn commit<A, F: FnOnce() -> A>(body: F) -> A {
    let _scope = Scope::enter();
    body()
}

/// Whether the current thread is inside a dispatch.
pub fn in_dispatch() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}
