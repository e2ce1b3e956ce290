// push-driven source backed by an unbounded queue.

use crate::{
    error::SubscribeError,
    fusion::{FusedQueue, FusionGrant, FusionRequest},
    protocol::{Source, Subscriber, Upstream},
    queue::OwnedQueue,
    util::demand,
};
use std::{
    fmt::{self, Formatter, Debug},
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            AtomicUsize,
            Ordering::{AcqRel, Acquire, Release},
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};


/// Single-subscriber source fed by pushing items from any thread
///
/// Cloning produces another handle to the same source. Items pushed before subscription are
/// buffered. Grants asynchronous fusion when asked, in which case the subscriber is signalled once
/// per pushed item and polls the buffer itself. Otherwise buffered items are emitted within
/// requested demand.
///
/// A terminal signal, from [`complete`](Self::complete) or [`fail`](Self::fail), is delivered only
/// after every item pushed before it.
pub struct QueueSource<T, E> {
    shared: Arc<QueueShared<T, E>>,
}

impl<T, E> Clone for QueueSource<T, E> {
    fn clone(&self) -> Self {
        QueueSource { shared: Arc::clone(&self.shared) }
    }
}

impl<T, E> Debug for QueueSource<T, E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("QueueSource")
            .field("buffered", &self.shared.queue.len())
            .field("terminated", &self.shared.terminated.load(Acquire))
            .field("cancelled", &self.shared.cancelled.load(Acquire))
            .finish()
    }
}

impl<T: Send + 'static, E: Send + 'static> QueueSource<T, E> {
    /// Construct with no items.
    pub fn new() -> Self {
        QueueSource {
            shared: Arc::new(QueueShared {
                queue: OwnedQueue::unbounded(),
                error: Mutex::new(None),
                subscriber: Mutex::new(None),
                subscribed: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                fused: AtomicBool::new(false),
                requested: AtomicU64::new(0),
                pushed: AtomicU64::new(0),
                signalled: AtomicU64::new(0),
                terminated: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                wip: AtomicUsize::new(0),
            }),
        }
    }

    /// Push an item, or hand it back if the source has terminated or been cancelled.
    pub fn push(&self, item: T) -> Result<(), T> {
        let shared = &self.shared;
        {
            let _terminal = shared.lock_error();
            if shared.terminated.load(Acquire) || shared.cancelled.load(Acquire) {
                return Err(item);
            }
            shared.queue.offer(item)?;
            shared.pushed.fetch_add(1, AcqRel);
        }
        shared.drain();
        Ok(())
    }

    /// Complete once every item pushed so far has been delivered. Returns false if already
    /// terminated.
    pub fn complete(&self) -> bool {
        {
            let _terminal = self.shared.lock_error();
            if self.shared.terminated.swap(true, AcqRel) {
                return false;
            }
        }
        self.shared.drain();
        true
    }

    /// Fail once every item pushed so far has been delivered. Returns false, dropping the error,
    /// if already terminated.
    pub fn fail(&self, error: E) -> bool {
        {
            let mut slot = self.shared.lock_error();
            if self.shared.terminated.load(Acquire) {
                return false;
            }
            *slot = Some(error);
            self.shared.terminated.store(true, Release);
        }
        self.shared.drain();
        true
    }

    /// Whether the subscriber has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Acquire)
    }

    /// Number of items pushed but not yet delivered or polled.
    pub fn buffered(&self) -> usize {
        self.shared.queue.len()
    }
}

impl<T: Send + 'static, E: Send + 'static> Default for QueueSource<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static, E: Send + 'static> Source<T, E> for QueueSource<T, E> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) -> Result<(), SubscribeError> {
        let shared = &self.shared;
        if shared.subscribed.swap(true, AcqRel) {
            return Err(SubscribeError::AlreadySubscribed);
        }
        *shared.lock_subscriber() = Some(Arc::clone(&subscriber));
        subscriber.on_subscribe(Arc::new(QueueUpstream(Arc::clone(shared))));

        // nothing is delivered until the subscriber is done setting up
        shared.ready.store(true, Release);
        shared.drain();
        Ok(())
    }
}


struct QueueShared<T, E> {
    queue: OwnedQueue<T>,
    // set at most once, before terminated, by fail. held while pushing, so that no push lands
    // after termination.
    error: Mutex<Option<E>>,
    // released once stopped.
    subscriber: Mutex<Option<Arc<dyn Subscriber<T, E>>>>,
    subscribed: AtomicBool,
    // on_subscribe has returned.
    ready: AtomicBool,
    // asynchronous fusion was granted.
    fused: AtomicBool,
    // outstanding demand, unused once fused.
    requested: AtomicU64,
    // items pushed, and availability signals sent, used once fused.
    pushed: AtomicU64,
    signalled: AtomicU64,
    // complete or fail was called.
    terminated: AtomicBool,
    cancelled: AtomicBool,
    // a terminal signal was delivered, or the subscriber cancelled.
    stopped: AtomicBool,
    // drain loop serialization. only the caller which raises it from 0 drains.
    wip: AtomicUsize,
}

impl<T, E> QueueShared<T, E> {
    fn lock_error(&self) -> MutexGuard<'_, Option<E>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriber(&self) -> MutexGuard<'_, Option<Arc<dyn Subscriber<T, E>>>> {
        self.subscriber.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            self.drain_once();
            missed = self.wip.fetch_sub(missed, AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn drain_once(&self) {
        if self.cancelled.load(Acquire) {
            self.queue.clear();
            self.lock_subscriber().take();
            return;
        }
        if !self.ready.load(Acquire) || self.stopped.load(Acquire) {
            return;
        }
        let Some(subscriber) = self.lock_subscriber().clone() else { return };

        // read before looking at the queue, so no item pushed before termination is missed
        let terminated = self.terminated.load(Acquire);
        if self.fused.load(Acquire) {
            let pushed = self.pushed.load(Acquire);
            let mut signalled = self.signalled.load(Acquire);
            while signalled < pushed && !self.cancelled.load(Acquire) {
                subscriber.on_available();
                signalled += 1;
                self.signalled.store(signalled, Release);
            }
            if terminated && signalled == pushed {
                self.terminate(&*subscriber);
            }
        } else {
            let requested = self.requested.load(Acquire);
            let mut emitted = 0;
            while emitted != requested && !self.cancelled.load(Acquire) {
                let Some(item) = self.queue.poll() else { break };
                subscriber.on_item(item);
                emitted += 1;
            }
            if emitted > 0 {
                demand::produced(&self.requested, emitted);
            }
            if terminated && self.queue.is_empty() {
                self.terminate(&*subscriber);
            }
        }
    }

    fn terminate(&self, subscriber: &dyn Subscriber<T, E>) {
        if self.cancelled.load(Acquire) || self.stopped.swap(true, AcqRel) {
            return;
        }
        self.lock_subscriber().take();
        let error = self.lock_error().take();
        match error {
            Some(error) => subscriber.on_error(error),
            None => subscriber.on_complete(),
        }
    }
}

impl<T: Send, E: Send> FusedQueue<T, E> for QueueShared<T, E> {
    fn poll(&self) -> Result<Option<T>, E> {
        if self.cancelled.load(Acquire) {
            return Ok(None);
        }
        Ok(self.queue.poll())
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn clear(&self) {
        self.queue.clear();
    }
}

// handle given to the subscriber.
struct QueueUpstream<T, E>(Arc<QueueShared<T, E>>);

impl<T: Send + 'static, E: Send + 'static> Upstream<T, E> for QueueUpstream<T, E> {
    fn request(&self, n: u64) {
        if n == 0 || self.0.fused.load(Acquire) {
            return;
        }
        demand::add(&self.0.requested, n);
        self.0.drain();
    }

    fn cancel(&self) {
        if !self.0.cancelled.swap(true, AcqRel) {
            trace!("queue source cancelled");
            self.0.drain();
        }
    }

    fn negotiate_fusion(&self, requested: FusionRequest) -> FusionGrant<T, E> {
        if !requested.contains(FusionRequest::ASYNC) {
            return FusionGrant::None;
        }
        self.0.fused.store(true, Release);
        FusionGrant::Async(Arc::clone(&self.0) as Arc<dyn FusedQueue<T, E>>)
    }
}
