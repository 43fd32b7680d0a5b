//! Event emitters.

use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace};

use crate::config::EmitterOptions;
use crate::hub::Hub;
use crate::once::{OnceEvent, OnceSlot};
use crate::source::{Callback, ChannelKind};
use crate::subscription::{Detach, Subscription, SubscriptionId};
use crate::token::CancellationToken;
use crate::transaction::commit;

/// Something an emitter holds on to for as long as it lives.
pub(crate) type KeepAlive = Box<dyn Any + Send + Sync>;

pub(crate) struct EmitterState<A> {
    pub hub: Arc<Hub<A>>,
    pub links: Vec<EventEmitter<A>>,
    throttle: Option<NonZeroUsize>,
    fired: u64,
    /// Upstream emitters feeding a derived emitter.
    keep_alive: Vec<KeepAlive>,
}

impl<A> EmitterState<A> {
    /// Count a fire and decide whether it passes the throttle.
    fn admit(&mut self) -> bool {
        let count = self.fired;
        self.fired = self.fired.wrapping_add(1);
        self.throttle.map_or(true, |period| count % period.get() as u64 == 0)
    }
}

pub(crate) struct Shared<A> {
    state: Mutex<EmitterState<A>>,
}

impl<A> Shared<A> {
    pub fn lock(&self) -> MutexGuard<'_, EmitterState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn hub(&self) -> Arc<Hub<A>> {
        self.lock().hub.clone()
    }
}

/// Leaves the firing phase when a fire ends, even by unwinding.
struct Firing<'a, A>(&'a Hub<A>);

impl<A> Drop for Firing<'_, A> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl<A: Clone + Send + Sync + 'static> Shared<A> {
    pub fn fire(&self, a: A) {
        commit(|| self.dispatch(a))
    }

    /// Notify subscribers, then once subscribers, then linked emitters.
    pub fn dispatch(&self, a: A) {
        let (hub, links) = {
            let mut state = self.lock();
            if !state.admit() {
                debug!(fired = state.fired, "throttled fire dropped");
                return;
            }
            (state.hub.clone(), state.links.clone())
        };
        let batch = hub.begin();
        let _firing = Firing(&hub);
        trace!(
            subscribers = batch.subscribers.len(),
            once = batch.once.len(),
            links = links.len(),
            "firing"
        );
        for (id, callback) in batch.subscribers {
            if callback(&a).is_err() {
                hub.sever(ChannelKind::Persistent, id);
            }
        }
        for (_, slot) in batch.once {
            slot.resolve(a.clone());
        }
        // forward the last link without cloning
        if let Some((last, rest)) = links.split_last() {
            for link in rest {
                link.shared.dispatch(a.clone());
            }
            last.shared.dispatch(a);
        }
    }
}


/// A publish/subscribe channel for events of type `A`.
///
/// Subscribers are invoked synchronously, in subscription order, every time
/// the emitter fires. Subscribers may subscribe, cancel or fire from inside
/// their callback: removals requested while the emitter fires are deferred
/// until that fire completes, and subscriptions added while it fires first
/// see the next fire.
///
/// On top of the basic channel an emitter supports one-shot subscriptions,
/// forwarding to linked emitters, throttling and meta events about its own
/// subscriptions (see [`make_observable`](EventEmitter::make_observable)).
///
/// Cloning an emitter yields another handle to the same channel.
///
/// ```
/// # use tether::EventEmitter;
/// # use std::sync::{ Arc, Mutex };
/// let emitter = EventEmitter::new();
/// let seen = Arc::new(Mutex::new(vec![]));
/// let subscription = {
///     let seen = seen.clone();
///     emitter.subscribe(move |x: &i32| seen.lock().unwrap().push(*x))
/// };
/// emitter.fire(1);
/// subscription.cancel();
/// emitter.fire(2);
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
/// ```
///
/// Multiple payload values travel as a tuple:
///
/// ```
/// # use tether::EventEmitter;
/// let moves: EventEmitter<(u32, i64, i64)> = EventEmitter::new();
/// moves.subscribe(|&(entity, dx, dy)| println!("{} moved by {},{}", entity, dx, dy));
/// moves.fire((7, 1, -1));
/// ```
pub struct EventEmitter<A> {
    pub(crate) shared: Arc<Shared<A>>,
}

impl<A> Clone for EventEmitter<A> {
    fn clone(&self) -> EventEmitter<A> {
        EventEmitter { shared: self.shared.clone() }
    }
}

/// Emitters compare by identity.
impl<A> PartialEq for EventEmitter<A> {
    fn eq(&self, other: &EventEmitter<A>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<A> Eq for EventEmitter<A> {}

impl<A> fmt::Debug for EventEmitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("EventEmitter")
            .field("subscriptions", &state.hub.subscriptions())
            .field("once_subscriptions", &state.hub.once_subscriptions())
            .field("links", &state.links.len())
            .field("throttle", &state.throttle)
            .field("observable", &state.hub.meta().is_some())
            .finish()
    }
}

impl<A: Clone + Send + Sync + 'static> Default for EventEmitter<A> {
    fn default() -> EventEmitter<A> {
        EventEmitter::new()
    }
}

fn handle<A: Send + 'static>(hub: &Arc<Hub<A>>, channel: ChannelKind, id: SubscriptionId) -> Subscription {
    let weak: Weak<Hub<A>> = Arc::downgrade(hub);
    let owner: Weak<dyn Detach> = weak;
    Subscription::new(owner, channel, id)
}

impl<A: Clone + Send + Sync + 'static> EventEmitter<A> {
    /// Create a plain emitter.
    pub fn new() -> EventEmitter<A> {
        EventEmitter::with_options(EmitterOptions::default())
    }

    /// Create an emitter with its meta events already allocated.
    pub fn observable() -> EventEmitter<A> {
        EventEmitter::with_options(EmitterOptions::new().observable())
    }

    /// Create an emitter that lets only every `period`th fire through.
    pub fn throttled(period: usize) -> EventEmitter<A> {
        EventEmitter::with_options(EmitterOptions::new().throttle(period))
    }

    /// Create an emitter from options.
    ///
    /// If a cancellation token is given, canceling it removes all
    /// subscriptions of the emitter and of its meta events.
    pub fn with_options(options: EmitterOptions) -> EventEmitter<A> {
        let emitter = EventEmitter {
            shared: Arc::new(Shared {
                state: Mutex::new(EmitterState {
                    hub: Arc::new(Hub::new()),
                    links: vec![],
                    throttle: options.throttle,
                    fired: 0,
                    keep_alive: vec![],
                }),
            }),
        };
        if options.observable {
            emitter.make_observable();
        }
        if let Some(token) = options.cancellation_token {
            let weak = emitter.downgrade();
            token.add_cancelable(move || {
                if let Some(shared) = weak.upgrade() {
                    EventEmitter { shared }.teardown();
                }
            });
        }
        emitter
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<A>> {
        Arc::downgrade(&self.shared)
    }

    /// Keep `upstream` alive for as long as this emitter lives.
    pub(crate) fn keep_alive(&self, upstream: KeepAlive) {
        self.shared.lock().keep_alive.push(upstream);
    }

    pub(crate) fn register(&self, callback: Callback<A>) -> Subscription {
        commit(|| {
            let hub = self.shared.hub();
            let id = SubscriptionId::next();
            hub.push(id, callback);
            handle(&hub, ChannelKind::Persistent, id)
        })
    }

    /// Subscribe to all future fires.
    ///
    /// Subscribing the same closure twice creates two independent
    /// subscriptions.
    pub fn subscribe<F>(&self, f: F) -> Subscription
        where F: Fn(&A) + Send + Sync + 'static,
    {
        self.register(Arc::new(move |a: &A| { f(a); Ok(()) }))
    }

    /// Subscribe until `token` is canceled.
    pub fn subscribe_scoped<F>(&self, token: &CancellationToken, f: F) -> Subscription
        where F: Fn(&A) + Send + Sync + 'static,
    {
        let subscription = self.subscribe(f);
        let scoped = subscription.clone();
        subscription.bind(token.register(move || scoped.cancel()));
        subscription
    }

    /// Wait for the next fire.
    ///
    /// All pending one-shot subscriptions resolve together on the next fire,
    /// after the persistent subscribers have been notified.
    pub fn subscribe_once(&self) -> OnceEvent<A> {
        commit(|| {
            let hub = self.shared.hub();
            let id = SubscriptionId::next();
            let slot = Arc::new(OnceSlot::new());
            hub.push_once(id, slot.clone());
            OnceEvent::new(slot, handle(&hub, ChannelKind::Once, id))
        })
    }

    /// Wait for the next fire, unless `token` is canceled first.
    pub fn subscribe_once_scoped(&self, token: &CancellationToken) -> OnceEvent<A> {
        let once = self.subscribe_once();
        let scoped = once.subscription().clone();
        once.subscription().bind(token.register(move || scoped.cancel()));
        once
    }

    /// Fire an event.
    ///
    /// Unless the fire is throttled, this synchronously notifies all
    /// persistent subscribers in subscription order, then resolves all
    /// pending one-shot subscriptions, then fires every linked emitter with
    /// the same payload.
    pub fn fire(&self, a: A) {
        self.shared.fire(a)
    }

    /// Remove every subscription, persistent and one-shot.
    ///
    /// During a fire of this emitter the removal takes effect once the fire
    /// completes. It covers the subscriptions present at the time of the
    /// call: a subscription made later in the same fire is kept.
    pub fn cancel_all(&self) {
        commit(|| self.shared.hub().cancel_all())
    }

    /// Cancel everything, including the subscriptions to the meta events.
    pub(crate) fn teardown(&self) {
        debug!("emitter token canceled");
        commit(|| {
            let hub = self.shared.hub();
            hub.cancel_all();
            if let Some(meta) = hub.meta() {
                meta.teardown();
            }
        })
    }

    /// Whether anyone is subscribed persistently.
    pub fn has_subscriptions(&self) -> bool {
        self.subscriptions() > 0
    }

    /// Number of persistent subscriptions.
    ///
    /// Subscriptions canceled during a fire are counted until the fire
    /// completes.
    pub fn subscriptions(&self) -> usize {
        self.shared.hub().subscriptions()
    }

    /// Number of pending one-shot subscriptions.
    pub fn once_subscriptions(&self) -> usize {
        self.shared.hub().once_subscriptions()
    }

    /// Whether a fire of this emitter is in progress.
    pub fn is_firing(&self) -> bool {
        self.shared.hub().is_firing()
    }

    /// Change the throttle period. A period of zero turns throttling off.
    ///
    /// The fire counter is kept.
    pub fn set_throttle(&self, period: usize) {
        commit(|| self.shared.lock().throttle = NonZeroUsize::new(period))
    }
}
