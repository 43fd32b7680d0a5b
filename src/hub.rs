//! The channel pair behind an emitter and its firing state machine.
//!
//! A hub owns the persistent and the once channel of an emitter. While the
//! hub is firing, removals are not applied to the channels but queued, and
//! flushed when the outermost fire returns to idle. Subscription handles
//! point at the hub, not at the emitter, so they stay valid when two emitters
//! swap their hubs.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::observable::MetaEvents;
use crate::once::OnceSlot;
use crate::source::{Callback, Channel, ChannelKind};
use crate::subscription::{Detach, SubscriptionId};
use crate::token::Registration;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum Phase {
    Idle,
    Firing { depth: usize },
}

struct HubState<A> {
    phase: Phase,
    subscribers: Channel<Callback<A>>,
    once: Channel<Arc<OnceSlot<A>>>,
    pending: Vec<(ChannelKind, SubscriptionId)>,
    /// Token registrations of scoped subscriptions, released on removal.
    scopes: HashMap<SubscriptionId, Registration>,
    meta: Option<MetaEvents>,
}

impl<A> HubState<A> {
    fn is_pending(&self, channel: ChannelKind, id: SubscriptionId) -> bool {
        self.pending.contains(&(channel, id))
    }

    fn contains(&self, channel: ChannelKind, id: SubscriptionId) -> bool {
        match channel {
            ChannelKind::Persistent => self.subscribers.contains(id),
            ChannelKind::Once => self.once.contains(id),
        }
    }

    /// Physically remove a subscription, handing back a once slot to cancel.
    fn remove(&mut self, channel: ChannelKind, id: SubscriptionId) -> Option<Option<Arc<OnceSlot<A>>>> {
        self.scopes.remove(&id);
        match channel {
            ChannelKind::Persistent => self.subscribers.remove(id).map(|_| None),
            ChannelKind::Once => self.once.remove(id).map(Some),
        }
    }
}

/// Subscriptions captured at the start of a fire.
pub struct Batch<A> {
    pub subscribers: Vec<(SubscriptionId, Callback<A>)>,
    pub once: Vec<(SubscriptionId, Arc<OnceSlot<A>>)>,
}

/// An emitter's channels.
pub struct Hub<A> {
    state: Mutex<HubState<A>>,
}

impl<A> Hub<A> {
    pub fn new() -> Hub<A> {
        Hub {
            state: Mutex::new(HubState {
                phase: Phase::Idle,
                subscribers: Channel::default(),
                once: Channel::default(),
                pending: vec![],
                scopes: HashMap::new(),
                meta: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn once_subscriptions(&self) -> usize {
        self.lock().once.len()
    }

    pub fn is_firing(&self) -> bool {
        self.lock().phase != Phase::Idle
    }

    pub fn meta(&self) -> Option<MetaEvents> {
        self.lock().meta.clone()
    }

    /// Allocate the meta events unless they exist. Returns whether this call
    /// allocated them.
    pub fn make_observable(&self) -> bool {
        let mut state = self.lock();
        if state.meta.is_some() {
            return false;
        }
        state.meta = Some(MetaEvents::new());
        true
    }

    /// Exchange the meta events of two distinct hubs.
    pub fn swap_meta(&self, other: &Hub<A>) {
        let mut mine = self.lock();
        let mut theirs = other.lock();
        mem::swap(&mut mine.meta, &mut theirs.meta);
    }

    pub fn push(&self, id: SubscriptionId, callback: Callback<A>) {
        self.lock().subscribers.push(id, callback);
        if let Some(meta) = self.meta() {
            meta.subscribe.fire(());
        }
    }

    pub fn push_once(&self, id: SubscriptionId, slot: Arc<OnceSlot<A>>) {
        self.lock().once.push(id, slot);
        if let Some(meta) = self.meta() {
            meta.subscribe_once.fire(());
        }
    }

    /// Enter the firing phase and capture the current subscriptions.
    ///
    /// Persistent subscriptions queued for removal are left out. The once
    /// channel is drained as a whole, its members only ever see one fire.
    pub fn begin(&self) -> Batch<A> {
        let mut state = self.lock();
        state.phase = match state.phase {
            Phase::Idle => Phase::Firing { depth: 1 },
            Phase::Firing { depth } => Phase::Firing { depth: depth + 1 },
        };
        let subscribers = state
            .subscribers
            .snapshot()
            .into_iter()
            .filter(|&(id, _)| !state.is_pending(ChannelKind::Persistent, id))
            .collect();
        let mut once = vec![];
        for (id, slot) in state.once.drain() {
            if state.is_pending(ChannelKind::Once, id) {
                state.once.push(id, slot);
            } else {
                state.scopes.remove(&id);
                once.push((id, slot));
            }
        }
        Batch { subscribers, once }
    }

    /// Leave the firing phase, flushing queued removals once idle.
    pub fn finish(&self) {
        let canceled = {
            let mut state = self.lock();
            state.phase = match state.phase {
                Phase::Firing { depth } if depth > 1 => Phase::Firing { depth: depth - 1 },
                _ => Phase::Idle,
            };
            if state.phase != Phase::Idle || state.pending.is_empty() {
                return;
            }
            let pending = mem::take(&mut state.pending);
            debug!(removals = pending.len(), "flushing deferred removals");
            pending
                .into_iter()
                .filter_map(|(channel, id)| state.remove(channel, id).flatten())
                .collect::<Vec<_>>()
        };
        for slot in canceled {
            slot.cancel();
        }
    }

    /// Remove a subscription without notifying observers. Returns whether
    /// anything was (or will be) removed.
    pub fn sever(&self, channel: ChannelKind, id: SubscriptionId) -> bool {
        let slot = {
            let mut state = self.lock();
            if state.phase != Phase::Idle {
                if !state.contains(channel, id) || state.is_pending(channel, id) {
                    return false;
                }
                debug!(?channel, ?id, "deferring removal until fire completes");
                state.pending.push((channel, id));
                return true;
            }
            match state.remove(channel, id) {
                Some(slot) => slot,
                None => return false,
            }
        };
        if let Some(slot) = slot {
            slot.cancel();
        }
        true
    }

    /// Remove every subscription present right now.
    pub fn cancel_all(&self) {
        let (canceled, meta) = {
            let mut state = self.lock();
            let meta = state.meta.clone();
            if state.phase != Phase::Idle {
                let ids: Vec<_> = state
                    .subscribers
                    .snapshot()
                    .into_iter()
                    .map(|(id, _)| (ChannelKind::Persistent, id))
                    .chain(state.once.snapshot().into_iter().map(|(id, _)| (ChannelKind::Once, id)))
                    .filter(|&(channel, id)| !state.is_pending(channel, id))
                    .collect();
                debug!(removals = ids.len(), "deferring cancel_all until fire completes");
                state.pending.extend(ids);
                (vec![], meta)
            } else {
                state.subscribers.drain();
                state.scopes.clear();
                let slots: Vec<_> = state.once.drain().into_iter().map(|(_, slot)| slot).collect();
                (slots, meta)
            }
        };
        for slot in canceled {
            slot.cancel();
        }
        if let Some(meta) = meta {
            meta.cancel_all.fire(());
        }
    }
}

impl<A: Send + 'static> Detach for Hub<A> {
    fn detach(&self, channel: ChannelKind, id: SubscriptionId) {
        if self.sever(channel, id) {
            if let Some(meta) = self.meta() {
                meta.cancel.fire(());
            }
        }
    }

    fn is_attached(&self, channel: ChannelKind, id: SubscriptionId) -> bool {
        let state = self.lock();
        state.contains(channel, id) && !state.is_pending(channel, id)
    }

    fn scope(&self, channel: ChannelKind, id: SubscriptionId, registration: Registration) {
        let mut state = self.lock();
        if state.contains(channel, id) && !state.is_pending(channel, id) {
            state.scopes.insert(id, registration);
        } else {
            drop(state);
            drop(registration);
        }
    }
}

impl<A> Drop for Hub<A> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, slot) in state.once.drain() {
            slot.cancel();
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use super::*;
    use crate::source::CallbackResult;

    fn noop() -> Callback<i32> {
        Arc::new(|_: &i32| -> CallbackResult { Ok(()) })
    }

    #[test]
    fn removal_deferred_while_firing() {
        let hub = Hub::new();
        let id = SubscriptionId::next();
        hub.push(id, noop());
        let batch = hub.begin();
        assert_eq!(batch.subscribers.len(), 1);
        assert!(hub.is_firing());
        assert!(hub.sever(ChannelKind::Persistent, id));
        assert!(!hub.sever(ChannelKind::Persistent, id));
        assert!(!hub.is_attached(ChannelKind::Persistent, id));
        assert_eq!(hub.subscriptions(), 1);
        hub.finish();
        assert!(!hub.is_firing());
        assert_eq!(hub.subscriptions(), 0);
    }

    #[test]
    fn nested_fires_flush_at_outermost() {
        let hub = Hub::new();
        let id = SubscriptionId::next();
        hub.push(id, noop());
        hub.begin();
        let inner = hub.begin();
        assert_eq!(inner.subscribers.len(), 1);
        hub.sever(ChannelKind::Persistent, id);
        assert!(hub.begin().subscribers.is_empty());
        hub.finish();
        hub.finish();
        assert_eq!(hub.subscriptions(), 1);
        hub.finish();
        assert_eq!(hub.subscriptions(), 0);
    }

    #[test]
    fn cancel_all_spares_later_subscriptions() {
        let hub = Hub::new();
        hub.push(SubscriptionId::next(), noop());
        hub.begin();
        hub.cancel_all();
        let late = SubscriptionId::next();
        hub.push(late, noop());
        assert_eq!(hub.subscriptions(), 2);
        hub.finish();
        assert_eq!(hub.subscriptions(), 1);
        assert!(hub.is_attached(ChannelKind::Persistent, late));
    }

    #[test]
    fn once_channel_drained_by_begin() {
        let hub: Hub<i32> = Hub::new();
        hub.push_once(SubscriptionId::next(), Arc::new(OnceSlot::new()));
        hub.push_once(SubscriptionId::next(), Arc::new(OnceSlot::new()));
        assert_eq!(hub.begin().once.len(), 2);
        assert_eq!(hub.once_subscriptions(), 0);
        hub.finish();
    }

    #[test]
    fn make_observable_once() {
        let hub: Hub<i32> = Hub::new();
        assert!(hub.meta().is_none());
        assert!(hub.make_observable());
        assert!(!hub.make_observable());
        assert!(hub.meta().is_some());
    }
}
