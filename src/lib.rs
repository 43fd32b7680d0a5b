//! Re-entrancy safe event emitters with cancellation tokens
//!
//! *Tether* provides the push-based observer primitive that a reactive UI,
//! game or session layer is built on: an [`EventEmitter`] broadcasts payloads
//! synchronously to an ordered list of subscribers, and a
//! [`CancellationToken`] scopes the lifetime of subscriptions.
//!
//!
//! # Firing semantics
//!
//! A call to `fire` runs to completion before it returns. For a single fire
//! the order of notification is:
//!
//! 1. persistent subscribers, in subscription order,
//! 2. pending one-shot subscriptions (see `subscribe_once`), as one batch,
//! 3. linked emitters, in link order, each running this same sequence.
//!
//! Subscribers may act on the emitter that is currently calling them. All
//! subscribers present when a fire starts are called exactly once for it:
//! canceling a subscription (or calling `cancel_all`) from inside a callback
//! is deferred until the fire completes, and subscriptions made from inside a
//! callback are first called on the next fire.
//!
//!
//! # Example
//!
//! ```
//! use tether::{ CancellationToken, EventEmitter };
//! use std::sync::{ Arc, Mutex };
//!
//! let clicks: EventEmitter<(i32, i32)> = EventEmitter::new();
//! let log = Arc::new(Mutex::new(vec![]));
//!
//! // A subscription that lives as long as a token
//! let token = CancellationToken::new();
//! {
//!     let log = log.clone();
//!     clicks.subscribe_scoped(&token, move |&(x, y)| log.lock().unwrap().push(x + y));
//! }
//!
//! // Wait for the next click only
//! let mut next = clicks.subscribe_once();
//!
//! clicks.fire((1, 2));
//! assert_eq!(next.try_take(), Some(Ok((1, 2))));
//!
//! // Canceling the token ends the subscription
//! token.cancel();
//! clicks.fire((3, 4));
//! assert_eq!(*log.lock().unwrap(), vec![3]);
//! ```
//!
//! Emitters, tokens and subscription handles are `Send + Sync + Clone`. Fires
//! from different threads are serialized, so that every fire (and everything
//! it cascades into) is atomic with respect to all other emitter operations.
//!
//! Callbacks are shared closures (`Fn(&A)`). State they update should live
//! behind an `Arc` with interior mutability, like the `Mutex` above.

#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;

pub use crate::config::EmitterOptions;
pub use crate::emitter::EventEmitter;
pub use crate::error::{Error, Result};
pub use crate::once::OnceEvent;
pub use crate::pipeline::Events;
pub use crate::subscription::{Subscription, SubscriptionId};
pub use crate::token::CancellationToken;

mod config;
mod emitter;
mod error;
mod hub;
mod observable;
mod once;
mod pipeline;
mod source;
mod subscription;
#[cfg(test)]
mod testing;
mod token;
mod transaction;
