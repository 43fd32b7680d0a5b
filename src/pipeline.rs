//! Derived emitters.
//!
//! Derived emitters are fed by a callback on their parent that only holds a
//! weak reference to them, while the derived emitter keeps its parents alive.
//! Once every handle to a derived emitter is dropped, the callback detaches
//! itself on the next fire of the parent.

use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};

use crate::emitter::EventEmitter;
use crate::source::{with_weak, CallbackError};
use crate::subscription::Subscription;

impl<A: Clone + Send + Sync + 'static> EventEmitter<A> {
    /// Map every fired payload to another emitter using a function.
    ///
    /// ```
    /// # use tether::EventEmitter;
    /// let emitter: EventEmitter<i32> = EventEmitter::new();
    /// let mut events = emitter.map(|x| x + 4).events();
    /// emitter.fire(3);
    /// assert_eq!(events.try_next(), Some(7));
    /// ```
    pub fn map<B, F>(&self, f: F) -> EventEmitter<B>
        where B: Clone + Send + Sync + 'static,
              F: Fn(&A) -> B + Send + Sync + 'static,
    {
        self.filter_map(move |a| Some(f(a)))
    }

    /// Forward only the payloads that satisfy a predicate.
    ///
    /// ```
    /// # use tether::EventEmitter;
    /// let emitter: EventEmitter<i32> = EventEmitter::new();
    /// let mut events = emitter
    ///     .filter(|&x| (x >= 4) && (x <= 10))
    ///     .events();
    /// emitter.fire(2); // won't arrive
    /// emitter.fire(5); // will arrive
    /// assert_eq!(events.try_next(), Some(5));
    /// ```
    pub fn filter<F>(&self, f: F) -> EventEmitter<A>
        where F: Fn(&A) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |a| if f(a) { Some(a.clone()) } else { None })
    }

    /// Both filter and map.
    ///
    /// ```
    /// # use tether::EventEmitter;
    /// let emitter: EventEmitter<i32> = EventEmitter::new();
    /// let mut events = emitter
    ///     .filter_map(|&i| if i > 3 { Some(i + 2) } else { None })
    ///     .events();
    /// emitter.fire(2);
    /// emitter.fire(4);
    /// assert_eq!(events.try_next(), Some(6));
    /// ```
    pub fn filter_map<B, F>(&self, f: F) -> EventEmitter<B>
        where B: Clone + Send + Sync + 'static,
              F: Fn(&A) -> Option<B> + Send + Sync + 'static,
    {
        let derived = EventEmitter::new();
        let weak = derived.downgrade();
        self.register(Arc::new(move |a: &A| match f(a) {
            Some(b) => with_weak(&weak, |shared| shared.fire(b)),
            None if weak.strong_count() == 0 => Err(CallbackError::Disappeared),
            None => Ok(()),
        }));
        derived.keep_alive(Box::new(self.clone()));
        derived
    }

    /// Merge with another emitter.
    ///
    /// The result fires whenever either of the two fires.
    ///
    /// ```
    /// # use tether::EventEmitter;
    /// let first = EventEmitter::<i32>::new();
    /// let second = EventEmitter::<i32>::new();
    /// let mut events = first.merge(&second).events();
    /// first.fire(2);
    /// second.fire(4);
    /// assert_eq!(events.try_next(), Some(2));
    /// assert_eq!(events.try_next(), Some(4));
    /// ```
    pub fn merge(&self, other: &EventEmitter<A>) -> EventEmitter<A> {
        let merged = EventEmitter::new();
        for parent in [self, other].iter() {
            let weak = merged.downgrade();
            parent.register(Arc::new(move |a: &A| with_weak(&weak, |shared| shared.fire(a.clone()))));
        }
        merged.keep_alive(Box::new((self.clone(), other.clone())));
        merged
    }

    /// A blocking iterator over future fires.
    ///
    /// The iterator keeps this emitter alive.
    pub fn events(&self) -> Events<A> {
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let subscription = self.register(Arc::new(move |a: &A| {
            match tx.lock() {
                Ok(tx) => tx.send(a.clone()).map_err(|_| CallbackError::Disappeared),
                Err(_) => Err(CallbackError::Disappeared),
            }
        }));
        Events { receiver: rx, subscription, _emitter: self.clone() }
    }
}

/// A blocking iterator over the payloads fired by an emitter.
///
/// Payloads are buffered from the moment the iterator is created. The
/// iterator ends once its subscription is canceled, for instance by
/// `cancel_all`. Dropping the iterator cancels the subscription.
pub struct Events<A> {
    receiver: Receiver<A>,
    subscription: Subscription,
    _emitter: EventEmitter<A>,
}

impl<A> Events<A> {
    /// The next buffered payload, without blocking.
    pub fn try_next(&mut self) -> Option<A> {
        match self.receiver.try_recv() {
            Ok(a) => Some(a),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// The subscription feeding this iterator.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<A> Iterator for Events<A> {
    type Item = A;
    fn next(&mut self) -> Option<A> { self.receiver.recv().ok() }
}

impl<A> Drop for Events<A> {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}

#[cfg(test)]
mod test {
    use quickcheck::quickcheck;

    use crate::testing::{id, Spy};
    use super::*;

    #[test]
    fn map() {
        let emitter: EventEmitter<i32> = EventEmitter::new();
        let triple = emitter.map(|x| 3 * x);
        let mut events = triple.events();
        emitter.fire(1);
        assert_eq!(events.try_next(), Some(3));
    }

    #[test]
    fn chain_1() {
        let emitter: EventEmitter<i32> = EventEmitter::new();
        let chain = emitter
            .map(|x| x / 2)
            .filter(|&x| x < 3);
        let mut events = chain.events();
        emitter.fire(7);
        emitter.fire(4);
        assert_eq!(events.try_next(), Some(2));
        assert_eq!(events.try_next(), None);
    }

    #[test]
    fn chain_2() {
        let first: EventEmitter<i32> = EventEmitter::new();
        let second: EventEmitter<i32> = EventEmitter::new();
        let mut events = first.map(|x| x + 4)
            .merge(
                &second
                .filter_map(|&x| if x < 4 { Some(x) } else { None })
                .map(|x| x * 5))
            .events();
        first.fire(12);
        second.fire(3);
        assert_eq!(events.try_next(), Some(16));
        assert_eq!(events.try_next(), Some(15));
    }

    #[test]
    fn temporary_stages_stay_connected() {
        let emitter: EventEmitter<i32> = EventEmitter::new();
        let tail = emitter.map(|x| x * 2).filter(|&x| x > 2).map(|x| x + 1);
        let spy = Spy::new();
        tail.subscribe(spy.callback());
        emitter.fire(1);
        emitter.fire(3);
        assert_eq!(spy.calls(), vec![7]);
        assert_eq!(emitter.subscriptions(), 1);
    }

    #[test]
    fn events_keep_their_emitter() {
        let emitter: EventEmitter<i32> = EventEmitter::new();
        let mut events = emitter.map(|x| x + 4).events();
        emitter.fire(3);
        assert_eq!(events.try_next(), Some(7));
        drop(events);
        emitter.fire(3);
        assert_eq!(emitter.subscriptions(), 0);
    }

    #[test]
    fn dropping_tail_releases_chain() {
        let emitter: EventEmitter<i32> = EventEmitter::new();
        let tail = emitter.map(|x| x + 1).map(|x| x * 2);
        emitter.fire(0);
        assert_eq!(emitter.subscriptions(), 1);
        drop(tail);
        emitter.fire(0);
        assert_eq!(emitter.subscriptions(), 0);
    }

    #[test]
    fn dropped_derived_detaches() {
        let emitter: EventEmitter<i32> = EventEmitter::new();
        let mapped = emitter.map(|x| x + 1);
        let filtered = emitter.filter(|_| false);
        assert_eq!(emitter.subscriptions(), 2);
        drop(mapped);
        drop(filtered);
        emitter.fire(1);
        assert_eq!(emitter.subscriptions(), 0);
    }

    #[test]
    fn events_end_on_cancel_all() {
        let emitter = EventEmitter::new();
        let mut events = emitter.events();
        emitter.fire(1);
        assert_eq!(events.try_next(), Some(1));
        assert_eq!(events.try_next(), None);
        emitter.fire(2);
        emitter.cancel_all();
        assert!(!events.subscription().is_active());
        assert_eq!(events.next(), Some(2));
        assert_eq!(events.next(), None);
    }

    #[test]
    fn dropping_events_cancels() {
        let emitter = EventEmitter::<u8>::new();
        let events = emitter.events();
        assert!(events.subscription().is_active());
        drop(events);
        assert!(!emitter.has_subscriptions());
    }

    #[test]
    fn events_across_threads() {
        let emitter = EventEmitter::<i32>::new();
        let events = emitter.events();
        let feeder = emitter.clone();
        let handle = std::thread::spawn(move || for n in 0..10 { feeder.fire(n) });
        for (n, m) in events.take(10).enumerate() {
            assert_eq!(n as i32, m);
        }
        handle.join().unwrap();
    }

    #[test]
    fn merge_preserves_order() {
        let a = EventEmitter::new();
        let b = EventEmitter::new();
        let spy = Spy::new();
        a.merge(&b).subscribe(spy.callback());
        a.fire('x');
        b.fire('y');
        a.fire('z');
        assert_eq!(spy.calls(), vec!['x', 'y', 'z']);
    }

    #[test]
    fn functor_identity() {
        fn check(input: Vec<i32>) -> bool {
            let emitter: EventEmitter<i32> = EventEmitter::new();
            let direct = Spy::new();
            let mapped = Spy::new();
            emitter.subscribe(direct.callback());
            let derived = emitter.map(|&x| id(x));
            derived.subscribe(mapped.callback());
            for x in input { emitter.fire(x); }
            direct.calls() == mapped.calls()
        }
        quickcheck(check as fn(Vec<i32>) -> bool);
    }

    #[test]
    fn functor_composition() {
        fn check(input: Vec<i32>) -> bool {
            fn f(n: &i32) -> i64 { i64::from(*n) + 3 }
            fn g(n: &i64) -> f64 { *n as f64 / 2.5 }

            let emitter = EventEmitter::new();
            let chained = Spy::new();
            let composed = Spy::new();
            let first = emitter.map(f).map(g);
            first.subscribe(chained.callback());
            let second = emitter.map(|n| g(&f(n)));
            second.subscribe(composed.callback());
            for x in input { emitter.fire(x); }
            chained.calls() == composed.calls()
        }
        quickcheck(check as fn(Vec<i32>) -> bool);
    }
}
