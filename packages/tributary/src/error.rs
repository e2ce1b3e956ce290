//! Error types.
//!
//! Errors emitted by upstream sources are never represented here: they travel through the adapter
//! as the source's own error type, unwrapped.

use thiserror::Error;


/// Error for constructing a [`Prefetch`](crate::config::Prefetch) of zero
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("prefetch must be at least 1")]
pub struct InvalidPrefetchError;

/// Error for subscribing to a source which refuses the subscriber
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SubscribeError {
    /// The source can only be consumed once and already has been
    #[error("source only supports a single subscriber")]
    AlreadySubscribed,
}

/// Error for reading configuration from the environment
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    /// The variable is set but does not hold a positive integer
    #[error("{var} is not a positive integer: {value:?}")]
    NotPositiveInteger {
        /// Name of the environment variable
        var: &'static str,
        /// The offending value
        value: String,
    },
}
