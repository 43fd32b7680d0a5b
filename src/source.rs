//! Channels and callbacks.
//!
//! This is a light-weight implementation of the observer pattern. A channel
//! is an ordered list of subscriptions, observers are shared closures.

use std::sync::{Arc, Weak};

use crate::subscription::SubscriptionId;

/// An error that can occur with a weakly referenced callback.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum CallbackError {
    /// The downstream end of the callback is gone; drop the callback.
    Disappeared,
}

/// Shorthand for common callback results.
pub type CallbackResult<T = ()> = Result<T, CallbackError>;

/// A stored callback. Returning an error detaches it after the current fire.
pub type Callback<A> = Arc<dyn Fn(&A) -> CallbackResult + Send + Sync + 'static>;

/// Perform some action on a weak reference and report a vanished target as an
/// error.
pub fn with_weak<T, U, F: FnOnce(&T) -> U>(weak: &Weak<T>, f: F) -> CallbackResult<U> {
    weak.upgrade()
        .map(|strong| f(&strong))
        .ok_or(CallbackError::Disappeared)
}

/// Which of an emitter's two channels a subscription lives in.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ChannelKind {
    /// Invoked on every fire until canceled.
    Persistent,
    /// Invoked on the next fire only.
    Once,
}

/// An ordered sequence of subscriptions.
pub struct Channel<T> {
    entries: Vec<(SubscriptionId, T)>,
}

impl<T> Default for Channel<T> {
    fn default() -> Channel<T> {
        Channel { entries: vec![] }
    }
}

impl<T> Channel<T> {
    /// Append a subscription.
    pub fn push(&mut self, id: SubscriptionId, item: T) {
        self.entries.push((id, item));
    }

    /// Remove a subscription by identity. Removing twice is a no-op.
    pub fn remove(&mut self, id: SubscriptionId) -> Option<T> {
        self.entries
            .iter()
            .position(|&(entry, _)| entry == id)
            .map(|index| self.entries.remove(index).1)
    }

    /// Whether the subscription is still in this channel.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|&(entry, _)| entry == id)
    }

    /// Drop every subscription, handing them back in order.
    pub fn drain(&mut self) -> Vec<(SubscriptionId, T)> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Clone> Channel<T> {
    /// Copy the current subscriptions, so they can be invoked without holding
    /// on to the channel.
    pub fn snapshot(&self) -> Vec<(SubscriptionId, T)> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, RwLock};
    use super::*;

    #[test]
    fn with_weak_no_error() {
        let a = Arc::new(RwLock::new(3));
        let weak = Arc::downgrade(&a);
        assert_eq!(with_weak(&weak, |a| { *a.write().unwrap() = 4; }), Ok(()));
        assert_eq!(*a.read().unwrap(), 4);
    }

    #[test]
    fn with_weak_disappeared() {
        let weak = Arc::downgrade(&Arc::new(3));
        assert_eq!(with_weak(&weak, |_| ()), Err(CallbackError::Disappeared));
    }

    #[test]
    fn channel_keeps_insertion_order() {
        let mut channel = Channel::default();
        let ids: Vec<_> = (0..4).map(|_| SubscriptionId::next()).collect();
        for (n, &id) in ids.iter().enumerate() {
            channel.push(id, n);
        }
        assert_eq!(channel.remove(ids[1]), Some(1));
        let order: Vec<_> = channel.snapshot().into_iter().map(|(_, n)| n).collect();
        assert_eq!(order, vec![0, 2, 3]);
    }

    #[test]
    fn channel_double_remove() {
        let mut channel = Channel::default();
        let id = SubscriptionId::next();
        channel.push(id, ());
        assert!(channel.contains(id));
        assert_eq!(channel.remove(id), Some(()));
        assert_eq!(channel.remove(id), None);
        assert_eq!(channel.len(), 0);
    }

    #[test]
    fn channel_drain() {
        let mut channel = Channel::default();
        channel.push(SubscriptionId::next(), 'a');
        channel.push(SubscriptionId::next(), 'b');
        assert_eq!(channel.drain().len(), 2);
        assert_eq!(channel.len(), 0);
    }
}
