//! Take-once cell for single-use sources.

use std::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{
        AtomicBool,
        Ordering::{AcqRel, Acquire},
    },
};


/// Cell holding a value which exactly one caller, on any thread, may take out.
pub(crate) struct AtomicTake<T> {
    // val is initialized while is_some is true. the caller which swaps it to false owns the value
    // from then on, and nobody touches val again.
    is_some: AtomicBool,
    val: UnsafeCell<MaybeUninit<T>>,
}

// taking moves the T to whichever thread wins the swap, and nothing else ever reads it, so T need
// only be Send.
unsafe impl<T: Send> Send for AtomicTake<T> {}
unsafe impl<T: Send> Sync for AtomicTake<T> {}

impl<T> AtomicTake<T> {
    pub(crate) fn new(val: T) -> Self {
        AtomicTake {
            is_some: AtomicBool::new(true),
            val: UnsafeCell::new(MaybeUninit::new(val)),
        }
    }

    // take the value if no one has yet.
    pub(crate) fn take(&self) -> Option<T> {
        if self.is_some.swap(false, AcqRel) {
            // safety: we won the swap, so val is initialized and no one else will read it.
            Some(unsafe { (*self.val.get()).assume_init_read() })
        } else {
            None
        }
    }

    pub(crate) fn is_taken(&self) -> bool {
        !self.is_some.load(Acquire)
    }
}

impl<T> Drop for AtomicTake<T> {
    fn drop(&mut self) {
        // make sure the value gets dropped if not yet taken
        drop(self.take());
    }
}
