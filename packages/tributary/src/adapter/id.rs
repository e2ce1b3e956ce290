
use std::{
    fmt::{self, Display, Formatter},
    sync::atomic::{
        AtomicU64,
        Ordering::Relaxed,
    },
};


static NEXT_ADAPTER_ID: AtomicU64 = AtomicU64::new(0);


/// Process-unique identity of an adapter
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AdapterId(u64);

impl AdapterId {
    // mint a never-before-seen id.
    pub(crate) fn mint() -> Self {
        AdapterId(NEXT_ADAPTER_ID.fetch_add(1, Relaxed))
    }

    /// The numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for AdapterId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "adapter#{}", self.0)
    }
}
