//! Observability, linking and channel swapping.
//!
//! These are the extended capabilities of an emitter: meta events that
//! report actions taken on its channels, forwarding of fired payloads to other
//! emitters, and exchanging the listeners of two emitters.

use std::mem;

use tracing::{debug, warn};

use crate::emitter::EventEmitter;
use crate::error::{Error, Result};
use crate::transaction::commit;

/// The meta events of an observable emitter.
#[derive(Clone)]
pub struct MetaEvents {
    pub subscribe: EventEmitter<()>,
    pub subscribe_once: EventEmitter<()>,
    pub cancel_all: EventEmitter<()>,
    pub cancel: EventEmitter<()>,
}

impl MetaEvents {
    pub fn new() -> MetaEvents {
        MetaEvents {
            subscribe: EventEmitter::new(),
            subscribe_once: EventEmitter::new(),
            cancel_all: EventEmitter::new(),
            cancel: EventEmitter::new(),
        }
    }

    /// Drop every subscription to the meta events.
    pub fn teardown(&self) {
        self.subscribe.cancel_all();
        self.subscribe_once.cancel_all();
        self.cancel_all.cancel_all();
        self.cancel.cancel_all();
    }
}

impl<A: Clone + Send + Sync + 'static> EventEmitter<A> {
    /// Allocate the meta events of this emitter.
    ///
    /// Only the first call has an effect. Afterwards the `on_*` accessors
    /// return emitters that fire (with `()`) whenever this emitter gains or
    /// loses subscriptions.
    ///
    /// ```
    /// # use tether::EventEmitter;
    /// # use std::sync::Arc;
    /// # use std::sync::atomic::{ AtomicUsize, Ordering };
    /// let emitter: EventEmitter<i32> = EventEmitter::new();
    /// assert!(emitter.on_subscribe().is_none());
    /// emitter.make_observable();
    /// let count = Arc::new(AtomicUsize::new(0));
    /// {
    ///     let count = count.clone();
    ///     emitter.on_subscribe().unwrap()
    ///         .subscribe(move |_| { count.fetch_add(1, Ordering::SeqCst); });
    /// }
    /// emitter.subscribe(|_| ());
    /// assert_eq!(count.load(Ordering::SeqCst), 1);
    /// ```
    pub fn make_observable(&self) {
        if commit(|| self.shared.hub().make_observable()) {
            debug!("emitter made observable");
        }
    }

    /// Whether the meta events have been allocated.
    pub fn is_observable(&self) -> bool {
        self.shared.hub().meta().is_some()
    }

    fn meta_event<F>(&self, pick: F) -> Option<EventEmitter<()>>
        where F: FnOnce(MetaEvents) -> EventEmitter<()>,
    {
        self.shared.hub().meta().map(pick)
    }

    /// Fires after each persistent subscription.
    pub fn on_subscribe(&self) -> Option<EventEmitter<()>> {
        self.meta_event(|meta| meta.subscribe)
    }

    /// Fires after each one-shot subscription.
    pub fn on_subscribe_once(&self) -> Option<EventEmitter<()>> {
        self.meta_event(|meta| meta.subscribe_once)
    }

    /// Fires on each `cancel_all`.
    pub fn on_cancel_all(&self) -> Option<EventEmitter<()>> {
        self.meta_event(|meta| meta.cancel_all)
    }

    /// Fires whenever a single subscription is canceled.
    pub fn on_cancel(&self) -> Option<EventEmitter<()>> {
        self.meta_event(|meta| meta.cancel)
    }

    /// Forward every future fire of this emitter to `other`.
    ///
    /// Linked emitters fire after this emitter's own subscribers, in the order
    /// they were linked, each running its complete fire (including its own
    /// throttle and links). Links are not checked for cycles: linking an
    /// emitter back to itself, directly or indirectly, makes the next fire
    /// recurse without end.
    pub fn link(&self, other: &EventEmitter<A>) {
        commit(|| self.shared.lock().links.push(other.clone()));
        debug!("emitter linked");
    }

    /// Stop forwarding to `other`.
    ///
    /// Removes one link to `other`. Fails with [`Error::NotLinked`] if there
    /// is none, leaving the links untouched.
    pub fn unlink(&self, other: &EventEmitter<A>) -> Result<()> {
        commit(|| {
            let mut state = self.shared.lock();
            match state.links.iter().position(|link| link == other) {
                Some(index) => {
                    state.links.remove(index);
                    debug!("emitter unlinked");
                    Ok(())
                }
                None => {
                    warn!("cannot unlink event that is not linked");
                    Err(Error::NotLinked)
                }
            }
        })
    }

    /// Number of emitters this one forwards to.
    pub fn links(&self) -> usize {
        self.shared.lock().links.len()
    }

    /// Exchange all persistent and one-shot subscriptions with `other`.
    ///
    /// Subscription handles and tokens keep working and now refer to the
    /// other emitter. Meta events, links and throttling stay where they are.
    pub fn swap_subscriptions(&self, other: &EventEmitter<A>) {
        if self == other {
            return;
        }
        commit(|| {
            let (mine, theirs) = {
                let mut mine = self.shared.lock();
                let mut theirs = other.shared.lock();
                mem::swap(&mut mine.hub, &mut theirs.hub);
                (mine.hub.clone(), theirs.hub.clone())
            };
            // The hubs carry the meta events, which belong to the emitter
            mine.swap_meta(&theirs);
        });
    }
}
