// test doubles for both sides of an adapter.

use crate::{
    active_set::ActiveSet,
    adapter::{AdapterId, InnerAdapter},
    config::Prefetch,
    coordinator::{Arrival, Coordinator},
    fusion::{FusionGrant, FusionMode, FusionRequest},
    error::SubscribeError,
    protocol::{Source, Subscriber, Upstream},
};
use std::{
    collections::HashSet,
    fmt::Display,
    mem,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering::{AcqRel, SeqCst},
        },
        Arc,
        Mutex,
    },
};


// ==== recording upstream ====


// upstream which records what it is asked and grants a preset fusion mode.
pub(crate) struct RecordingUpstream<T, E> {
    requests: Mutex<Vec<u64>>,
    cancels: AtomicUsize,
    negotiations: Mutex<Vec<FusionRequest>>,
    grant: Mutex<Option<FusionGrant<T, E>>>,
}

impl<T, E> RecordingUpstream<T, E> {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_grant(FusionGrant::None)
    }

    pub(crate) fn with_grant(grant: FusionGrant<T, E>) -> Arc<Self> {
        Arc::new(RecordingUpstream {
            requests: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
            negotiations: Mutex::new(Vec::new()),
            grant: Mutex::new(Some(grant)),
        })
    }

    pub(crate) fn requests(&self) -> Vec<u64> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn cancel_count(&self) -> usize {
        self.cancels.load(SeqCst)
    }

    pub(crate) fn negotiations(&self) -> Vec<FusionRequest> {
        self.negotiations.lock().unwrap().clone()
    }
}

impl<T, E> Upstream<T, E> for RecordingUpstream<T, E> {
    fn request(&self, n: u64) {
        self.requests.lock().unwrap().push(n);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, SeqCst);
    }

    fn negotiate_fusion(&self, requested: FusionRequest) -> FusionGrant<T, E> {
        self.negotiations.lock().unwrap().push(requested);
        let grant = self.grant.lock().unwrap().take().unwrap_or(FusionGrant::None);
        assert!(requested.allows(grant.mode()), "test granted a mode that was not requested");
        grant
    }
}


// ==== recording subscriber ====


// subscriber which never negotiates fusion and records every signal.
pub(crate) struct RecordingSubscriber<T, E> {
    upstream: Mutex<Option<Arc<dyn Upstream<T, E>>>>,
    items: Mutex<Vec<T>>,
    available: AtomicUsize,
    errors: Mutex<Vec<String>>,
    completions: AtomicUsize,
}

impl<T: Clone + Send + 'static, E: Display + 'static> RecordingSubscriber<T, E> {
    pub(crate) fn subscribe(source: &dyn Source<T, E>) -> Result<Arc<Self>, SubscribeError> {
        let subscriber = Arc::new(RecordingSubscriber {
            upstream: Mutex::new(None),
            items: Mutex::new(Vec::new()),
            available: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
        });
        source.subscribe(subscriber.clone())?;
        Ok(subscriber)
    }

    fn upstream(&self) -> Arc<dyn Upstream<T, E>> {
        self.upstream.lock().unwrap().clone().expect("not subscribed")
    }

    pub(crate) fn request(&self, n: u64) {
        self.upstream().request(n);
    }

    pub(crate) fn cancel(&self) {
        self.upstream().cancel();
    }

    pub(crate) fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    pub(crate) fn available(&self) -> usize {
        self.available.load(SeqCst)
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub(crate) fn completions(&self) -> usize {
        self.completions.load(SeqCst)
    }
}

impl<T: Send, E: Display> Subscriber<T, E> for RecordingSubscriber<T, E> {
    fn on_subscribe(&self, upstream: Arc<dyn Upstream<T, E>>) {
        *self.upstream.lock().unwrap() = Some(upstream);
    }

    fn on_item(&self, item: T) {
        self.items.lock().unwrap().push(item);
    }

    fn on_available(&self) {
        self.available.fetch_add(1, SeqCst);
    }

    fn on_error(&self, error: E) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_complete(&self) {
        self.completions.fetch_add(1, SeqCst);
    }
}


// ==== recording coordinator ====


// signal received by a RecordingCoordinator.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event<T> {
    Item(AdapterId, Arrival<T>),
    Error(AdapterId, String),
    Complete(AdapterId),
    // done is the adapter's is_done() at the time of the signal.
    Drain { id: AdapterId, done: bool },
}

// coordinator which only records signals.
pub(crate) struct RecordingCoordinator<T> {
    events: Mutex<Vec<Event<T>>>,
}

impl<T: Clone> RecordingCoordinator<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(RecordingCoordinator { events: Mutex::new(Vec::new()) })
    }

    pub(crate) fn events(&self) -> Vec<Event<T>> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event<T>) {
        self.events.lock().unwrap().push(event);
    }
}

impl<T: Clone + Send, E: Display> Coordinator<T, E> for RecordingCoordinator<T> {
    fn item_ready(&self, adapter: &InnerAdapter<T, E>, arrival: Arrival<T>) {
        self.push(Event::Item(adapter.id(), arrival));
    }

    fn error_ready(&self, adapter: &InnerAdapter<T, E>, error: E) {
        self.push(Event::Error(adapter.id(), error.to_string()));
    }

    fn complete_ready(&self, adapter: &InnerAdapter<T, E>) {
        self.push(Event::Complete(adapter.id()));
    }

    fn drain_requested(&self, adapter: &InnerAdapter<T, E>) {
        self.push(Event::Drain { id: adapter.id(), done: adapter.is_done() });
    }
}


// ==== collecting coordinator ====


// minimal merging coordinator: drains every adapter into one output vec, collecting errors
// rather than failing fast.
pub(crate) struct CollectingCoordinator<T, E> {
    active: ActiveSet<T, E>,
    // drain loop serialization. only the caller which raises it from 0 drains.
    wip: AtomicUsize,
    output: Mutex<Vec<T>>,
    errors: Mutex<Vec<String>>,
    // adapters whose upstream has sent a terminal signal.
    terminated: Mutex<HashSet<AdapterId>>,
}

impl<T: Send + 'static, E: Display + Send + 'static> CollectingCoordinator<T, E> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(CollectingCoordinator {
            active: ActiveSet::new(),
            wip: AtomicUsize::new(0),
            output: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            terminated: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        source: &dyn Source<T, E>,
        prefetch: Prefetch,
    ) -> Arc<InnerAdapter<T, E>> {
        let adapter = InnerAdapter::new(self, prefetch);
        self.active.insert(Arc::clone(&adapter));
        source.subscribe(adapter.clone()).unwrap();
        self.drain();
        adapter
    }

    pub(crate) fn take_output(&self) -> Vec<T> {
        mem::take(&mut *self.output.lock().unwrap())
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.active.is_empty()
    }

    pub(crate) fn cancel(&self) {
        self.active.cancel_all();
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            for adapter in self.active.snapshot() {
                self.drain_one(&adapter);
            }
            missed = self.wip.fetch_sub(missed, AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn drain_one(&self, adapter: &InnerAdapter<T, E>) {
        let Some(buffer) = adapter.buffer() else { return };
        let sync = adapter.fusion_mode() == Some(FusionMode::Sync);
        loop {
            let terminated = sync || self.terminated.lock().unwrap().contains(&adapter.id());
            match buffer.poll() {
                Ok(Some(item)) => {
                    self.output.lock().unwrap().push(item);
                    if !sync {
                        adapter.request_one();
                    }
                }
                Ok(None) => {
                    if terminated {
                        adapter.mark_done();
                        self.active.remove(adapter.id());
                    }
                    return;
                }
                Err(e) => {
                    self.errors.lock().unwrap().push(e.to_string());
                    adapter.cancel();
                    self.active.remove(adapter.id());
                    return;
                }
            }
        }
    }
}

impl<T, E> Coordinator<T, E> for CollectingCoordinator<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    fn item_ready(&self, _: &InnerAdapter<T, E>, arrival: Arrival<T>) {
        if let Arrival::Overflow(_) = arrival {
            self.errors.lock().unwrap().push("overflow".to_owned());
        }
        self.drain();
    }

    fn error_ready(&self, adapter: &InnerAdapter<T, E>, error: E) {
        self.errors.lock().unwrap().push(error.to_string());
        self.terminated.lock().unwrap().insert(adapter.id());
        self.drain();
    }

    fn complete_ready(&self, adapter: &InnerAdapter<T, E>) {
        self.terminated.lock().unwrap().insert(adapter.id());
        self.drain();
    }

    fn drain_requested(&self, _: &InnerAdapter<T, E>) {
        self.drain();
    }
}
