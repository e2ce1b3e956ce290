//! Producer/consumer protocol traits.
//!
//! The protocol is push-based with counted demand: a [`Subscriber`] receives an [`Upstream`]
//! handle in `on_subscribe`, grants permission to emit `n` more items with `request(n)`, and
//! then receives at most that many `on_item` calls followed by at most one terminal signal.
//! Signals to one subscriber never overlap in time.

use crate::{
    error::SubscribeError,
    fusion::{FusionGrant, FusionRequest},
};
use std::sync::Arc;


/// Handle a subscriber holds to control its upstream
pub trait Upstream<T, E>: Send + Sync {
    /// Permit the upstream to emit `n` more items.
    ///
    /// Demand accumulates, saturating at `u64::MAX`, which means unbounded.
    fn request(&self, n: u64);

    /// Ask the upstream to stop emitting and release its resources. Idempotent.
    fn cancel(&self);

    /// Ask the upstream to expose its internal queue.
    ///
    /// Called at most once, from within `on_subscribe`, before any `request`. Defaults to
    /// refusing.
    fn negotiate_fusion(&self, requested: FusionRequest) -> FusionGrant<T, E> {
        let _ = requested;
        FusionGrant::None
    }
}

/// Receiver of upstream signals
pub trait Subscriber<T, E>: Send + Sync {
    /// The upstream accepted the subscription.
    fn on_subscribe(&self, upstream: Arc<dyn Upstream<T, E>>);

    /// An item, delivered by value.
    fn on_item(&self, item: T);

    /// An item became available in the fused queue. Used by asynchronously fused upstreams
    /// instead of `on_item`.
    fn on_available(&self);

    /// Terminal failure.
    fn on_error(&self, error: E);

    /// Terminal success.
    fn on_complete(&self);
}

/// Something which can be subscribed to
pub trait Source<T, E> {
    /// Subscribe, calling `on_subscribe` on the subscriber before returning.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) -> Result<(), SubscribeError>;
}
