//! Queue fusion negotiation types.
//!
//! An upstream which already holds its items in a pollable queue can hand that queue to the
//! subscriber during subscription, so the subscriber reads straight out of it instead of receiving
//! every item by value and buffering it a second time.

use std::{
    fmt::{self, Formatter, Debug},
    ops::BitOr,
    sync::Arc,
};


/// Set of fusion modes a subscriber is willing to accept
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct FusionRequest(u8);

impl FusionRequest {
    /// No fusion
    pub const NONE: Self = FusionRequest(0);
    /// Synchronous fusion: the upstream is fully materialized
    pub const SYNC: Self = FusionRequest(1);
    /// Asynchronous fusion: the upstream signals availability, the subscriber polls
    pub const ASYNC: Self = FusionRequest(2);
    /// Either synchronous or asynchronous fusion
    pub const ANY: Self = FusionRequest(1 | 2);
    /// The subscriber polls the fused queue from a different thread than the one the upstream
    /// emits on
    ///
    /// Upstreams whose `poll` would run caller-supplied code may refuse fusion when this is set.
    pub const BOUNDARY: Self = FusionRequest(4);

    /// Whether every flag in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether this request permits the upstream to grant `mode`.
    pub const fn allows(self, mode: FusionMode) -> bool {
        match mode {
            FusionMode::None => true,
            FusionMode::Sync => self.contains(Self::SYNC),
            FusionMode::Async => self.contains(Self::ASYNC),
        }
    }
}

impl BitOr for FusionRequest {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        FusionRequest(self.0 | rhs.0)
    }
}

/// Outcome of fusion negotiation for one adapter
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FusionMode {
    /// Items are delivered by value and buffered by the subscriber
    None,
    /// The upstream is fully materialized and is drained by polling alone
    Sync,
    /// The upstream buffers internally and signals each available item without a payload
    Async,
}

/// Pollable storage exposed by a fused upstream
///
/// Only one consumer polls at a time. `poll` may fail if producing the next element runs code
/// which fails, in which case the error is the upstream's own error.
pub trait FusedQueue<T, E>: Send + Sync {
    /// Remove the next element, or return `None` if none is currently available.
    fn poll(&self) -> Result<Option<T>, E>;

    /// Whether no element is currently available.
    fn is_empty(&self) -> bool;

    /// Drop every buffered element.
    fn clear(&self);
}

/// Answer of an upstream to a [`FusionRequest`]
///
/// The granted mode and the exposed queue travel together.
pub enum FusionGrant<T, E> {
    /// Fusion refused
    None,
    /// Synchronous fusion granted over the given queue
    Sync(Arc<dyn FusedQueue<T, E>>),
    /// Asynchronous fusion granted over the given queue
    Async(Arc<dyn FusedQueue<T, E>>),
}

impl<T, E> FusionGrant<T, E> {
    /// The mode this grant represents.
    pub fn mode(&self) -> FusionMode {
        match self {
            FusionGrant::None => FusionMode::None,
            FusionGrant::Sync(_) => FusionMode::Sync,
            FusionGrant::Async(_) => FusionMode::Async,
        }
    }
}

impl<T, E> Debug for FusionGrant<T, E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("FusionGrant").field(&self.mode()).finish()
    }
}
