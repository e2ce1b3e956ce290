//! The parent side of an adapter.

use crate::adapter::InnerAdapter;


/// What an adapter reports when its upstream emits an item
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Arrival<T> {
    /// The item was pushed into the adapter's own queue
    Queued,
    /// The fused upstream queue has another item to poll
    Available,
    /// The adapter's own queue was full, meaning the upstream emitted beyond the demand it was
    /// granted. The item is handed over as-is.
    Overflow(T),
}

/// Owner of a set of adapters, responsible for draining them
///
/// Every callback is given the adapter the signal originated from. Callbacks may be invoked from
/// any upstream's thread, concurrently for different adapters, and must not block.
pub trait Coordinator<T, E>: Send + Sync {
    /// An item arrived.
    fn item_ready(&self, adapter: &InnerAdapter<T, E>, arrival: Arrival<T>);

    /// The upstream failed. Items already buffered may still be drained.
    fn error_ready(&self, adapter: &InnerAdapter<T, E>, error: E);

    /// The upstream completed. Items already buffered may still be drained.
    fn complete_ready(&self, adapter: &InnerAdapter<T, E>);

    /// A synchronously fused adapter is ready to be drained in full.
    fn drain_requested(&self, adapter: &InnerAdapter<T, E>);
}
