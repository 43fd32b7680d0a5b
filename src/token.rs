//! Cancellation tokens.
//!
//! A token collects cleanup actions ("cancelables") and runs each of them
//! exactly once when it is canceled. Tokens can be chained into trees, so that
//! canceling a parent also cancels its children.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use crate::transaction::commit;

/// A boxed cleanup action.
type Cancelable = Box<dyn FnOnce() + Send + 'static>;

struct TokenState {
    canceled: bool,
    next_key: u64,
    cancelables: Vec<(u64, Cancelable)>,
    chained: Vec<CancellationToken>,
}

/// A cleanup action registered on a token, withdrawn again when dropped.
///
/// Subscriptions scoped to a token hold one of these, so that a token
/// outliving many short subscriptions does not accumulate their actions.
pub(crate) struct Registration {
    token: Weak<Mutex<TokenState>>,
    key: Option<u64>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let (key, state) = match (self.key, self.token.upgrade()) {
            (Some(key), Some(state)) => (key, state),
            _ => return,
        };
        let removed = {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            guard
                .cancelables
                .iter()
                .position(|&(entry, _)| entry == key)
                .map(|index| guard.cancelables.remove(index))
        };
        // Run the action's destructor without holding the token
        drop(removed);
    }
}

/// A handle representing "this resource is no longer wanted".
///
/// Cloning a token yields another handle to the same token.
///
/// ```
/// # use tether::{ CancellationToken, EventEmitter };
/// let token = CancellationToken::new();
/// let emitter = EventEmitter::new();
/// emitter.subscribe_scoped(&token, |x: &i32| println!("{}", x));
/// assert_eq!(emitter.subscriptions(), 1);
/// token.cancel();
/// assert_eq!(emitter.subscriptions(), 0);
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<Mutex<TokenState>>,
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CancellationToken")
            .field("canceled", &state.canceled)
            .field("cancelables", &state.cancelables.len())
            .field("chained", &state.chained.len())
            .finish()
    }
}

impl CancellationToken {
    /// Create a fresh, uncanceled token.
    pub fn new() -> CancellationToken {
        CancellationToken {
            state: Arc::new(Mutex::new(TokenState {
                canceled: false,
                next_key: 0,
                cancelables: vec![],
                chained: vec![],
            })),
        }
    }

    /// Create a new token that is canceled together with this one.
    pub fn child(&self) -> CancellationToken {
        let child = CancellationToken::new();
        self.chain(&child);
        child
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `cancel` has been called.
    pub fn is_canceled(&self) -> bool {
        self.lock().canceled
    }

    /// Register a cleanup action.
    ///
    /// If the token has already been canceled, the action runs immediately.
    pub fn add_cancelable<F: FnOnce() + Send + 'static>(&self, action: F) {
        let mut registration = self.register(action);
        registration.key = None;
    }

    /// Register a cleanup action that is withdrawn when the returned
    /// registration is dropped.
    pub(crate) fn register<F: FnOnce() + Send + 'static>(&self, action: F) -> Registration {
        let mut state = self.lock();
        let key = if state.canceled {
            drop(state);
            commit(action);
            None
        } else {
            let key = state.next_key;
            state.next_key += 1;
            state.cancelables.push((key, Box::new(action)));
            Some(key)
        };
        Registration { token: Arc::downgrade(&self.state), key }
    }

    /// Number of cleanup actions waiting for `cancel`.
    pub fn cancelables(&self) -> usize {
        self.lock().cancelables.len()
    }

    /// Make sure `other` is canceled whenever this token is.
    ///
    /// Chaining onto a token that is already canceled cancels `other` right
    /// away.
    pub fn chain(&self, other: &CancellationToken) {
        let mut state = self.lock();
        if state.canceled {
            drop(state);
            other.cancel();
        } else {
            state.chained.push(other.clone());
        }
    }

    /// Cancel the token.
    ///
    /// Runs all registered actions in registration order, then cancels all
    /// chained tokens. Further calls are no-ops.
    pub fn cancel(&self) {
        let (cancelables, chained) = {
            let mut state = self.lock();
            if state.canceled {
                return;
            }
            state.canceled = true;
            (mem::take(&mut state.cancelables), mem::take(&mut state.chained))
        };
        debug!(
            cancelables = cancelables.len(),
            chained = chained.len(),
            "canceling token"
        );
        commit(move || {
            for (_, cancelable) in cancelables {
                cancelable();
            }
            for token in chained {
                token.cancel();
            }
        });
    }
}
