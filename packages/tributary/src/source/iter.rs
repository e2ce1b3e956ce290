// fully materialized source over an iterator.

use crate::{
    error::SubscribeError,
    fusion::{FusedQueue, FusionGrant, FusionRequest},
    protocol::{Source, Subscriber, Upstream},
    util::{atomic_take::AtomicTake, demand},
};
use std::{
    iter::Peekable,
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering::{AcqRel, Acquire, Release},
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};


/// Single-use source emitting the items of an iterator
///
/// Grants synchronous fusion when asked, in which case the subscriber polls the iterator
/// directly. Otherwise items are emitted within requested demand, and completion follows the last
/// item without waiting for further demand.
pub struct IterSource<I> {
    iter: AtomicTake<I>,
}

impl<I: Iterator> IterSource<I> {
    /// Construct over anything iterable.
    pub fn new<C>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        IterSource { iter: AtomicTake::new(items.into_iter()) }
    }

    /// Whether the source has been subscribed to.
    pub fn is_consumed(&self) -> bool {
        self.iter.is_taken()
    }
}

impl<I, E> Source<I::Item, E> for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
    E: 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<I::Item, E>>) -> Result<(), SubscribeError> {
        let iter = self.iter.take().ok_or(SubscribeError::AlreadySubscribed)?;
        let shared = Arc::new(IterShared {
            iter: Mutex::new(Some(iter.peekable())),
            subscriber: Mutex::new(Some(Arc::clone(&subscriber))),
            requested: AtomicU64::new(0),
            fused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });
        subscriber.on_subscribe(Arc::new(IterUpstream(Arc::clone(&shared))));

        // an empty iterator completes without waiting for demand
        if !shared.fused.load(Acquire) && shared.is_exhausted() && shared.stop() {
            subscriber.on_complete();
        }
        Ok(())
    }
}

struct IterShared<I: Iterator, E> {
    // None once cleared.
    iter: Mutex<Option<Peekable<I>>>,
    // released upon fusion, completion, or cancellation.
    subscriber: Mutex<Option<Arc<dyn Subscriber<I::Item, E>>>>,
    requested: AtomicU64,
    // set by negotiation. when fused, requests are ignored and the subscriber polls.
    fused: AtomicBool,
    // completed or cancelled.
    stopped: AtomicBool,
}

impl<I: Iterator, E> IterShared<I, E> {
    fn lock_iter(&self) -> MutexGuard<'_, Option<Peekable<I>>> {
        self.iter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self) -> Option<I::Item> {
        self.lock_iter().as_mut().and_then(Iterator::next)
    }

    fn is_exhausted(&self) -> bool {
        self.lock_iter().as_mut().is_none_or(|iter| iter.peek().is_none())
    }

    fn subscriber(&self) -> Option<Arc<dyn Subscriber<I::Item, E>>> {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    // mark stopped and release the subscriber. returns whether this call stopped it.
    fn stop(&self) -> bool {
        if self.stopped.swap(true, AcqRel) {
            return false;
        }
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner).take();
        true
    }

    // emit within demand. only the caller that raised demand from zero runs this, so it never
    // runs concurrently with itself.
    fn emit(&self) {
        let Some(subscriber) = self.subscriber() else { return };
        let mut emitted = 0;
        loop {
            let requested = self.requested.load(Acquire);
            while emitted != requested {
                if self.stopped.load(Acquire) {
                    return;
                }
                if let Some(item) = self.next() {
                    subscriber.on_item(item);
                    emitted += 1;
                }
                if self.is_exhausted() {
                    if self.stop() {
                        subscriber.on_complete();
                    }
                    return;
                }
            }
            if demand::produced(&self.requested, emitted) == 0 {
                return;
            }
            emitted = 0;
        }
    }
}

impl<I, E> FusedQueue<I::Item, E> for IterShared<I, E>
where
    I: Iterator + Send,
    I::Item: Send,
{
    fn poll(&self) -> Result<Option<I::Item>, E> {
        if self.stopped.load(Acquire) {
            return Ok(None);
        }
        Ok(self.next())
    }

    fn is_empty(&self) -> bool {
        self.stopped.load(Acquire) || self.is_exhausted()
    }

    fn clear(&self) {
        self.lock_iter().take();
    }
}

// handle given to the subscriber.
struct IterUpstream<I: Iterator, E>(Arc<IterShared<I, E>>);

impl<I, E> Upstream<I::Item, E> for IterUpstream<I, E>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
    E: 'static,
{
    fn request(&self, n: u64) {
        if n == 0 || self.0.fused.load(Acquire) {
            return;
        }
        if demand::add(&self.0.requested, n) == 0 {
            self.0.emit();
        }
    }

    fn cancel(&self) {
        if self.0.stop() {
            trace!("iterator source cancelled");
        }
    }

    fn negotiate_fusion(&self, requested: FusionRequest) -> FusionGrant<I::Item, E> {
        if !requested.contains(FusionRequest::SYNC) {
            return FusionGrant::None;
        }
        self.0.fused.store(true, Release);
        // the subscriber polls from now on, and is never signalled
        self.0.subscriber.lock().unwrap_or_else(PoisonError::into_inner).take();
        FusionGrant::Sync(Arc::clone(&self.0) as Arc<dyn FusedQueue<I::Item, E>>)
    }
}
