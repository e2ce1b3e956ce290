
use crate::{
    fusion::FusedQueue,
    queue::OwnedQueue,
};
use std::{
    fmt::{self, Formatter, Debug},
    sync::Arc,
};


/// Where a coordinator polls an adapter's items from
pub enum Buffer<T, E> {
    /// The adapter's own queue, filled as unfused items arrive
    Owned(Arc<OwnedQueue<T>>),
    /// The queue a fused upstream exposed
    Fused(Arc<dyn FusedQueue<T, E>>),
}

impl<T, E> Buffer<T, E> {
    /// Remove the next item, if one is available.
    ///
    /// Fails only for fused upstreams whose queue fails to produce the next item.
    pub fn poll(&self) -> Result<Option<T>, E> {
        match self {
            Buffer::Owned(queue) => Ok(queue.poll()),
            Buffer::Fused(queue) => queue.poll(),
        }
    }

    /// Whether no item is currently available.
    pub fn is_empty(&self) -> bool {
        match self {
            Buffer::Owned(queue) => queue.is_empty(),
            Buffer::Fused(queue) => queue.is_empty(),
        }
    }

    /// Drop every buffered item.
    pub fn clear(&self) {
        match self {
            Buffer::Owned(queue) => queue.clear(),
            Buffer::Fused(queue) => queue.clear(),
        }
    }

    /// Whether this is the adapter's own queue.
    pub fn is_owned(&self) -> bool {
        matches!(self, Buffer::Owned(_))
    }
}

impl<T, E> Debug for Buffer<T, E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Buffer::Owned(queue) => f.debug_struct("Owned")
                .field("len", &queue.len())
                .field("bound", &queue.bound())
                .finish(),
            Buffer::Fused(queue) => f.debug_struct("Fused")
                .field("is_empty", &queue.is_empty())
                .finish(),
        }
    }
}
