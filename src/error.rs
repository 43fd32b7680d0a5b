//! Errors surfaced to callers of the emitter API.

use thiserror::Error;

/// Shorthand for results carrying this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Usage errors of the emitter API.
///
/// Normal operation (subscribing, firing, canceling) is total and never
/// produces an error.
#[non_exhaustive]
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// `unlink` was called with an emitter that is not a forwarding target.
    #[error("cannot unlink event that is not linked")]
    NotLinked,
    /// A one-shot subscription went away before the event fired.
    #[error("one-shot subscription was canceled before the event fired")]
    Canceled,
}
