//! Registry of a coordinator's live adapters.

use crate::adapter::{AdapterId, InnerAdapter};
use dashmap::DashMap;
use smallvec::SmallVec;
use std::sync::Arc;


/// Adapters collected without holding any registry lock
pub type Snapshot<T, E> = SmallVec<[Arc<InnerAdapter<T, E>>; 8]>;

/// Concurrent set of adapters keyed by [`AdapterId`]
///
/// Adapters are inserted when the coordinator discovers an inner source and removed once drained.
/// Operations which call into adapters first collect them into a [`Snapshot`], so an upstream
/// reacting synchronously (say, by completing upon cancellation) can re-enter the set.
pub struct ActiveSet<T, E> {
    adapters: DashMap<AdapterId, Arc<InnerAdapter<T, E>>>,
}

impl<T, E> ActiveSet<T, E> {
    /// Construct empty.
    pub fn new() -> Self {
        ActiveSet { adapters: DashMap::new() }
    }

    /// Insert an adapter, returning the one previously under its id, if any.
    pub fn insert(&self, adapter: Arc<InnerAdapter<T, E>>) -> Option<Arc<InnerAdapter<T, E>>> {
        self.adapters.insert(adapter.id(), adapter)
    }

    /// Remove an adapter by id.
    pub fn remove(&self, id: AdapterId) -> Option<Arc<InnerAdapter<T, E>>> {
        self.adapters.remove(&id).map(|(_, adapter)| adapter)
    }

    /// Look up an adapter by id.
    pub fn get(&self, id: AdapterId) -> Option<Arc<InnerAdapter<T, E>>> {
        self.adapters.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether there are no adapters.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Every adapter currently in the set, in ascending id order.
    pub fn snapshot(&self) -> Snapshot<T, E> {
        let mut snapshot = self.adapters.iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect::<Snapshot<T, E>>();
        snapshot.sort_unstable_by_key(|adapter| adapter.id());
        snapshot
    }

    /// Remove and cancel every adapter. Returns how many were removed.
    pub fn cancel_all(&self) -> usize {
        let snapshot = self.snapshot();
        let mut removed = 0;
        for adapter in snapshot {
            if self.adapters.remove(&adapter.id()).is_some() {
                removed += 1;
            }
            adapter.cancel();
        }
        trace!(removed, "cancelled all adapters");
        removed
    }

    /// Remove adapters which are cancelled, or done with nothing left to poll. Returns how many
    /// were removed.
    pub fn retain_live(&self) -> usize {
        let before = self.adapters.len();
        self.adapters.retain(|_, adapter| {
            let drained = adapter.is_done()
                && adapter.buffer().is_none_or(|buffer| buffer.is_empty());
            !(drained || adapter.is_cancelled())
        });
        before.saturating_sub(self.adapters.len())
    }
}

impl<T, E> Default for ActiveSet<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
