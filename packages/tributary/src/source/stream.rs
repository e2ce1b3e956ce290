// source driving an asynchronous stream on a tokio runtime.

use crate::{
    error::SubscribeError,
    protocol::{Source, Subscriber, Upstream},
    util::{atomic_take::AtomicTake, demand},
};
use futures::stream::{Stream, StreamExt};
use std::{
    pin::pin,
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering::{AcqRel, Acquire},
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use tokio::{
    runtime::Handle,
    sync::Notify,
    task::AbortHandle,
};


/// Single-use source forwarding the items of a stream of results
///
/// Upon subscription, a task is spawned on the given runtime which pulls from the stream only
/// while there is outstanding demand. An `Err` item is delivered as the terminal error. Never
/// grants fusion. Cancelling aborts the task, dropping the stream.
pub struct StreamSource<S> {
    stream: AtomicTake<S>,
    runtime: Handle,
}

impl<S> StreamSource<S> {
    /// Construct, to drive the stream on the given runtime once subscribed.
    pub fn new(stream: S, runtime: Handle) -> Self {
        StreamSource { stream: AtomicTake::new(stream), runtime }
    }

    /// Whether the source has been subscribed to.
    pub fn is_consumed(&self) -> bool {
        self.stream.is_taken()
    }
}

impl<S, T, E> Source<T, E> for StreamSource<S>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T, E>>) -> Result<(), SubscribeError> {
        let stream = self.stream.take().ok_or(SubscribeError::AlreadySubscribed)?;
        let shared = Arc::new(StreamShared {
            requested: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            task: Mutex::new(None),
        });
        subscriber.on_subscribe(Arc::new(StreamUpstream(Arc::clone(&shared))));
        if shared.cancelled.load(Acquire) {
            return Ok(());
        }

        let task = self.runtime.spawn(drive(stream, subscriber, Arc::clone(&shared)));
        *shared.lock_task() = Some(task.abort_handle());
        // a cancel which raced with spawning may have found no task to abort
        if shared.cancelled.load(Acquire) {
            shared.abort();
        }
        Ok(())
    }
}

struct StreamShared {
    requested: AtomicU64,
    cancelled: AtomicBool,
    // woken upon request or cancel.
    notify: Notify,
    // set once spawned.
    task: Mutex<Option<AbortHandle>>,
}

impl StreamShared {
    fn lock_task(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // abort the task, dropping the stream wherever it is suspended.
    fn abort(&self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}

// pull from the stream within demand until it ends, fails, or the subscriber cancels.
async fn drive<S, T, E>(stream: S, subscriber: Arc<dyn Subscriber<T, E>>, shared: Arc<StreamShared>)
where
    S: Stream<Item = Result<T, E>>,
{
    let mut stream = pin!(stream);
    loop {
        while shared.requested.load(Acquire) == 0 {
            if shared.cancelled.load(Acquire) {
                return;
            }
            // a notification sent since the check is kept as a permit
            shared.notify.notified().await;
        }
        if shared.cancelled.load(Acquire) {
            return;
        }

        let next = stream.next().await;
        if shared.cancelled.load(Acquire) {
            return;
        }
        match next {
            Some(Ok(item)) => {
                // consume demand first, so requests made from within on_item count
                demand::produced(&shared.requested, 1);
                subscriber.on_item(item);
            }
            Some(Err(error)) => {
                trace!("stream source failed");
                subscriber.on_error(error);
                return;
            }
            None => {
                trace!("stream source ended");
                subscriber.on_complete();
                return;
            }
        }
    }
}

// handle given to the subscriber.
struct StreamUpstream(Arc<StreamShared>);

impl<T, E> Upstream<T, E> for StreamUpstream {
    fn request(&self, n: u64) {
        if n == 0 {
            return;
        }
        demand::add(&self.0.requested, n);
        self.0.notify.notify_one();
    }

    fn cancel(&self) {
        if self.0.cancelled.swap(true, AcqRel) {
            return;
        }
        trace!("stream source cancelled");
        self.0.notify.notify_one();
        self.0.abort();
    }
}
