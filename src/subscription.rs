//! Subscription handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use crate::source::ChannelKind;
use crate::token::Registration;
use crate::transaction::commit;

/// Opaque identity of a single subscription.
///
/// Two subscriptions of the same callback are still distinct subscriptions.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> SubscriptionId {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        SubscriptionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Something a subscription can be severed from.
pub(crate) trait Detach: Send + Sync {
    /// Remove the subscription, or queue its removal while the owner fires.
    fn detach(&self, channel: ChannelKind, id: SubscriptionId);

    /// Whether the subscription is still registered and not queued for
    /// removal.
    fn is_attached(&self, channel: ChannelKind, id: SubscriptionId) -> bool;

    /// Hold on to a token registration until the subscription is removed.
    fn scope(&self, channel: ChannelKind, id: SubscriptionId, registration: Registration);
}

/// A handle to a subscription.
///
/// The handle only knows how to sever the subscription. Dropping it leaves
/// the subscription in place; call [`cancel`](Subscription::cancel) or use a
/// cancellation token to end it.
#[derive(Clone)]
pub struct Subscription {
    owner: Weak<dyn Detach>,
    channel: ChannelKind,
    id: SubscriptionId,
}

impl Subscription {
    pub(crate) fn new(owner: Weak<dyn Detach>, channel: ChannelKind, id: SubscriptionId) -> Subscription {
        Subscription { owner, channel, id }
    }

    /// The identity of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the subscription will receive the next fire.
    pub fn is_active(&self) -> bool {
        self.owner
            .upgrade()
            .map_or(false, |owner| owner.is_attached(self.channel, self.id))
    }

    /// Remove this subscription from its emitter.
    ///
    /// Canceling twice, or after the emitter is gone, does nothing. Canceling
    /// during a fire of the owning emitter takes effect once that fire
    /// completes.
    pub fn cancel(&self) {
        if let Some(owner) = self.owner.upgrade() {
            commit(|| owner.detach(self.channel, self.id));
        }
    }

    /// Tie a token registration to the lifetime of this subscription.
    pub(crate) fn bind(&self, registration: Registration) {
        if let Some(owner) = self.owner.upgrade() {
            owner.scope(self.channel, self.id, registration);
        }
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Subscription) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}
