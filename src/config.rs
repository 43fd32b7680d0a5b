//! Emitter construction options.

use std::num::NonZeroUsize;

use crate::token::CancellationToken;

/// How to set up a new [`EventEmitter`](crate::EventEmitter).
///
/// The default is a plain emitter: no meta events, no token, no throttle.
///
/// ```
/// # use tether::{ CancellationToken, EmitterOptions, EventEmitter };
/// let token = CancellationToken::new();
/// let emitter: EventEmitter<u8> = EventEmitter::with_options(
///     EmitterOptions::new()
///         .observable()
///         .cancellation_token(&token)
///         .throttle(2)
/// );
/// assert!(emitter.is_observable());
/// ```
#[derive(Clone, Debug, Default)]
pub struct EmitterOptions {
    /// Allocate the meta events right away.
    pub observable: bool,
    /// Cancel all subscriptions when this token is canceled.
    pub cancellation_token: Option<CancellationToken>,
    /// Let only every n-th fire through, starting with the first.
    pub throttle: Option<NonZeroUsize>,
}

impl EmitterOptions {
    /// Options for a plain emitter.
    pub fn new() -> EmitterOptions {
        EmitterOptions::default()
    }

    /// Allocate the meta events on construction.
    pub fn observable(mut self) -> EmitterOptions {
        self.observable = true;
        self
    }

    /// Tie the emitter's subscriptions to `token`.
    pub fn cancellation_token(mut self, token: &CancellationToken) -> EmitterOptions {
        self.cancellation_token = Some(token.clone());
        self
    }

    /// Set the throttle period. Zero disables throttling.
    pub fn throttle(mut self, period: usize) -> EmitterOptions {
        self.throttle = NonZeroUsize::new(period);
        self
    }
}
