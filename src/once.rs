//! One-shot subscriptions.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tracing::warn;

use crate::error::{Error, Result};
use crate::subscription::Subscription;
use crate::transaction::in_dispatch;

enum SlotState<A> {
    Pending(Option<Waker>),
    Resolved(A),
    Canceled,
    Taken,
}

/// The shared cell a one-shot subscription resolves into.
pub struct OnceSlot<A> {
    state: Mutex<SlotState<A>>,
    resolved: Condvar,
}

impl<A> OnceSlot<A> {
    pub fn new() -> OnceSlot<A> {
        OnceSlot {
            state: Mutex::new(SlotState::Pending(None)),
            resolved: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, value: SlotState<A>) {
        let mut state = self.lock();
        let waker = match &mut *state {
            SlotState::Pending(waker) => waker.take(),
            _ => return,
        };
        *state = value;
        drop(state);
        self.resolved.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Resolve with a payload. Only the first settlement counts.
    pub fn resolve(&self, a: A) {
        self.settle(SlotState::Resolved(a));
    }

    /// Give up on the payload. Does nothing once resolved.
    pub fn cancel(&self) {
        self.settle(SlotState::Canceled);
    }

    fn is_pending(&self) -> bool {
        matches!(*self.lock(), SlotState::Pending(_))
    }
}

fn take<A>(state: &mut SlotState<A>) -> Option<Result<A>> {
    match mem::replace(state, SlotState::Taken) {
        SlotState::Pending(waker) => {
            *state = SlotState::Pending(waker);
            None
        }
        SlotState::Resolved(a) => Some(Ok(a)),
        SlotState::Canceled | SlotState::Taken => Some(Err(Error::Canceled)),
    }
}

/// The pending result of [`subscribe_once`](crate::EventEmitter::subscribe_once).
///
/// Resolves with the payload of the next fire of the emitter, or with
/// [`Error::Canceled`] if the subscription is canceled (directly, through its
/// token, or by `cancel_all`) or the emitter is dropped first. It can be
/// awaited as a [`Future`], polled with [`try_take`](OnceEvent::try_take) or
/// blocked on with [`wait`](OnceEvent::wait).
///
/// Dropping an unresolved `OnceEvent` cancels its subscription.
///
/// ```
/// # use tether::EventEmitter;
/// let emitter = EventEmitter::new();
/// let mut next = emitter.subscribe_once();
/// assert_eq!(next.try_take(), None);
/// emitter.fire('a');
/// emitter.fire('b');
/// assert_eq!(next.try_take(), Some(Ok('a')));
/// ```
pub struct OnceEvent<A> {
    slot: Arc<OnceSlot<A>>,
    subscription: Subscription,
}

impl<A> OnceEvent<A> {
    pub(crate) fn new(slot: Arc<OnceSlot<A>>, subscription: Subscription) -> OnceEvent<A> {
        OnceEvent { slot, subscription }
    }

    /// The subscription backing this one-shot event.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Whether a payload or cancellation has arrived.
    pub fn is_resolved(&self) -> bool {
        !self.slot.is_pending()
    }

    /// Cancel the underlying subscription.
    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    /// Take the outcome without blocking. `None` while still pending.
    ///
    /// After the outcome has been taken once, further calls report
    /// [`Error::Canceled`].
    pub fn try_take(&mut self) -> Option<Result<A>> {
        take(&mut self.slot.lock())
    }

    /// Block the current thread until the event fires or is canceled.
    ///
    /// The fire has to come from another thread, otherwise this never returns.
    pub fn wait(self) -> Result<A> {
        if in_dispatch() {
            warn!("blocking on a one-shot event from inside a dispatch, other threads cannot fire");
        }
        let mut state = self.slot.lock();
        loop {
            if let Some(outcome) = take(&mut state) {
                return outcome;
            }
            state = self
                .slot
                .resolved
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<A> Future for OnceEvent<A> {
    type Output = Result<A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<A>> {
        let mut state = self.slot.lock();
        match take(&mut state) {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                *state = SlotState::Pending(Some(cx.waker().clone()));
                Poll::Pending
            }
        }
    }
}

impl<A> Drop for OnceEvent<A> {
    fn drop(&mut self) {
        if self.slot.is_pending() {
            self.subscription.cancel();
        }
    }
}
