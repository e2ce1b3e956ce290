//! Adapter-owned element storage.

use crate::{
    config::Prefetch,
    fusion::FusedQueue,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering::{Acquire, Release},
        },
        Mutex,
        MutexGuard,
        PoisonError,
    },
};


// most elements to allocate space for up front, however large the bound.
const MAX_INITIAL_ALLOC: usize = 1024;


/// FIFO queue with an optional bound
///
/// Intended for one producer (the upstream's emitting thread) and one consumer (the coordinator's
/// drain loop) at a time, but sound under any use. The length is mirrored in an atomic so that
/// `len` and `is_empty` never lock.
pub struct OwnedQueue<T> {
    // elements, front is oldest.
    elems: Mutex<VecDeque<T>>,
    // maximum number of elements, if bounded.
    bound: Option<usize>,
    // mirror of elems.len(), written only while elems is locked.
    len: AtomicUsize,
}

impl<T> OwnedQueue<T> {
    /// Construct empty with a maximum length.
    pub fn bounded(bound: usize) -> Self {
        OwnedQueue {
            elems: Mutex::new(VecDeque::with_capacity(bound.min(MAX_INITIAL_ALLOC))),
            bound: Some(bound),
            len: AtomicUsize::new(0),
        }
    }

    /// Construct empty with no maximum length.
    pub fn unbounded() -> Self {
        OwnedQueue {
            elems: Mutex::new(VecDeque::new()),
            bound: None,
            len: AtomicUsize::new(0),
        }
    }

    /// Construct empty, sized for an adapter with the given prefetch.
    pub fn for_prefetch(prefetch: Prefetch) -> Self {
        match prefetch.capacity() {
            Some(bound) => Self::bounded(bound),
            None => Self::unbounded(),
        }
    }

    // lock the elements. a panic while locked cannot leave the deque half-modified, so poisoning
    // is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.elems.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push to the back, or hand the element back if the queue is full.
    pub fn offer(&self, elem: T) -> Result<(), T> {
        let mut elems = self.lock();
        if self.bound.is_some_and(|n| elems.len() >= n) {
            return Err(elem);
        }
        elems.push_back(elem);
        self.len.store(elems.len(), Release);
        Ok(())
    }

    /// Pop from the front.
    pub fn poll(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let mut elems = self.lock();
        let elem = elems.pop_front();
        self.len.store(elems.len(), Release);
        elem
    }

    /// Drop every element.
    pub fn clear(&self) {
        let drained = {
            let mut elems = self.lock();
            self.len.store(0, Release);
            std::mem::take(&mut *elems)
        };
        // run element destructors outside the lock
        drop(drained);
    }

    /// Current number of elements.
    pub fn len(&self) -> usize {
        self.len.load(Acquire)
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of elements, if bounded.
    pub fn bound(&self) -> Option<usize> {
        self.bound
    }
}

impl<T: Send, E> FusedQueue<T, E> for OwnedQueue<T> {
    fn poll(&self) -> Result<Option<T>, E> {
        Ok(OwnedQueue::poll(self))
    }

    fn is_empty(&self) -> bool {
        OwnedQueue::is_empty(self)
    }

    fn clear(&self) {
        OwnedQueue::clear(self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_pcg::Pcg32;
    use std::{
        sync::Arc,
        thread,
    };

    #[test]
    fn bounded_rejects_when_full() {
        let queue = OwnedQueue::bounded(2);
        assert_eq!(queue.offer(1), Ok(()));
        assert_eq!(queue.offer(2), Ok(()));
        assert_eq!(queue.offer(3), Err(3));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(queue.offer(3), Ok(()));
        assert_eq!(queue.poll(), Some(2));
        assert_eq!(queue.poll(), Some(3));
        assert_eq!(queue.poll(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn unbounded_never_rejects() {
        let queue = OwnedQueue::for_prefetch(Prefetch::Unbounded);
        for i in 0..10_000 {
            assert_eq!(queue.offer(i), Ok(()));
        }
        assert_eq!(queue.bound(), None);
        assert_eq!(queue.len(), 10_000);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn matches_vec_deque() {
        let mut rng = Pcg32::from_seed(0xdeadbeefdeadbeefdeadbeefdeadbeefu128.to_le_bytes());
        let mut model = VecDeque::new();
        let queue = OwnedQueue::bounded(16);
        for i in 0u32..10_000 {
            if rng.gen_ratio(55, 100) {
                let accepted = queue.offer(i).is_ok();
                assert_eq!(accepted, model.len() < 16);
                if accepted {
                    model.push_back(i);
                }
            } else {
                assert_eq!(queue.poll(), model.pop_front());
            }
            assert_eq!(queue.len(), model.len());
        }
    }

    #[test]
    fn spsc_preserves_order() {
        let queue = Arc::new(OwnedQueue::bounded(8));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..5_000u32 {
                    let mut elem = i;
                    while let Err(back) = queue.offer(elem) {
                        elem = back;
                        thread::yield_now();
                    }
                }
            })
        };
        let mut next = 0u32;
        while next < 5_000 {
            match queue.poll() {
                Some(elem) => {
                    assert_eq!(elem, next);
                    next += 1;
                }
                None => thread::yield_now(),
            }
        }
        producer.join().unwrap();
        assert!(queue.is_empty());
    }
}
