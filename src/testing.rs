//! Utilities for the test suite.

use std::sync::{Arc, Mutex};

/// The identity function.
pub fn id<T>(t: T) -> T { t }

/// Records every payload it is called with.
pub struct Spy<A> {
    calls: Arc<Mutex<Vec<A>>>,
}

impl<A> Clone for Spy<A> {
    fn clone(&self) -> Spy<A> {
        Spy { calls: self.calls.clone() }
    }
}

impl<A: Clone + Send + 'static> Spy<A> {
    pub fn new() -> Spy<A> {
        Spy { calls: Arc::new(Mutex::new(vec![])) }
    }

    /// A callback that records into this spy.
    pub fn callback(&self) -> impl Fn(&A) + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |a: &A| calls.lock().unwrap().push(a.clone())
    }

    pub fn calls(&self) -> Vec<A> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// A callback that records into `spy` together with a tag.
pub fn tagged<T, A>(spy: &Spy<(T, A)>, tag: T) -> impl Fn(&A) + Send + Sync + 'static
    where T: Clone + Send + Sync + 'static,
          A: Clone + Send + 'static,
{
    let calls = spy.calls.clone();
    move |a: &A| calls.lock().unwrap().push((tag.clone(), a.clone()))
}


/// Self-tests.
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spy_records_in_order() {
        let spy = Spy::new();
        let callback = spy.callback();
        callback(&1);
        callback(&2);
        assert_eq!(spy.calls(), vec![1, 2]);
        assert_eq!(spy.count(), 2);
    }

    #[test]
    fn spy_tagged() {
        let spy = Spy::new();
        tagged(&spy, "a")(&3);
        assert_eq!(spy.calls(), vec![("a", 3)]);
    }
}
