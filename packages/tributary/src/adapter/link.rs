// set-once, cancel-able slot for an adapter's upstream handle.

use crate::protocol::Upstream;
use std::sync::{
    atomic::{
        AtomicU8,
        Ordering::{AcqRel, Acquire},
    },
    Arc,
    OnceLock,
};


// possible values for UpstreamLink.state
//
// transitions are Unset -> Attaching -> Attached, and any state -> Cancelled. nothing leaves
// Cancelled.
#[repr(u8)]
enum LinkState {
    // no handle yet.
    Unset,
    // an attach call won the slot and is storing its handle.
    Attaching,
    // handle is stored and readable.
    Attached,
    // cancelled. a stored handle, if any, has been or is being cancelled exactly once.
    Cancelled,
}

// outcome of UpstreamLink::attach.
pub(crate) enum Attach<'a, T, E> {
    // the handle was stored.
    Attached(&'a Arc<dyn Upstream<T, E>>),
    // a handle was already stored or being stored. the new one was ignored.
    Duplicate,
    // the link was cancelled before or during the attach. the new handle was cancelled.
    Cancelled,
}

pub(crate) struct UpstreamLink<T, E> {
    // begins as LinkState::Unset.
    //
    // - the thread which moves it Unset -> Attaching is the only writer of handle.
    // - handle is initialized if the value is Attached, or if it went through Attached before
    //   becoming Cancelled.
    // - the thread which moves it Attached -> Cancelled issues the one cancellation. if it moves
    //   Attaching -> Cancelled instead, the attaching thread observes that and cancels.
    state: AtomicU8,
    handle: OnceLock<Arc<dyn Upstream<T, E>>>,
}

impl<T, E> UpstreamLink<T, E> {
    pub(crate) fn new() -> Self {
        UpstreamLink {
            state: AtomicU8::new(LinkState::Unset as u8),
            handle: OnceLock::new(),
        }
    }

    // store the handle if the slot is unset.
    pub(crate) fn attach(&self, handle: Arc<dyn Upstream<T, E>>) -> Attach<'_, T, E> {
        if let Err(state) = self.state.compare_exchange(
            LinkState::Unset as u8,
            LinkState::Attaching as u8,
            AcqRel,
            Acquire,
        ) {
            if state == LinkState::Cancelled as u8 {
                handle.cancel();
                return Attach::Cancelled;
            }
            return Attach::Duplicate;
        }

        // we are the single writer, so the cell is empty
        let _ = self.handle.set(handle);
        let handle = match self.handle.get() {
            Some(handle) => handle,
            None => unreachable!("upstream link handle missing after set"),
        };

        match self.state.compare_exchange(
            LinkState::Attaching as u8,
            LinkState::Attached as u8,
            AcqRel,
            Acquire,
        ) {
            Ok(_) => Attach::Attached(handle),
            Err(_) => {
                // a cancel swapped in while we were storing. it saw Attaching, so it left the
                // cancellation to us.
                handle.cancel();
                Attach::Cancelled
            }
        }
    }

    // move to cancelled, cancelling the stored handle if there is one. returns whether this call
    // did the transition.
    pub(crate) fn cancel(&self) -> bool {
        let prev = self.state.swap(LinkState::Cancelled as u8, AcqRel);
        if prev == LinkState::Attached as u8 {
            if let Some(handle) = self.handle.get() {
                handle.cancel();
            }
        }
        prev != LinkState::Cancelled as u8
    }

    // the handle, if attached and not cancelled.
    pub(crate) fn get(&self) -> Option<&Arc<dyn Upstream<T, E>>> {
        if self.state.load(Acquire) == LinkState::Attached as u8 {
            self.handle.get()
        } else {
            None
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Acquire) == LinkState::Cancelled as u8
    }
}
