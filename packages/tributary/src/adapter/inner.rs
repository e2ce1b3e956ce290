// the adapter proper.

use super::{
    accountant::RequestAccountant,
    buffer::Buffer,
    id::AdapterId,
    link::{Attach, UpstreamLink},
    state::{AdapterState, AtomicAdapterState},
};
use crate::{
    config::Prefetch,
    coordinator::{Arrival, Coordinator},
    fusion::{FusionGrant, FusionMode, FusionRequest},
    protocol::{Subscriber, Upstream},
    queue::OwnedQueue,
};
use std::{
    fmt::{self, Formatter, Debug},
    sync::{Arc, OnceLock, Weak},
};


/// Bridge from one upstream source into a coordinator's drain loop
///
/// Created by the coordinator and handed to the source as its [`Subscriber`]. The upstream's
/// signals are forwarded to the coordinator, tagged with this adapter. The coordinator polls the
/// adapter's [`Buffer`] and reports consumption back through [`request_one`](Self::request_one) or
/// [`request_bulk`](Self::request_bulk), which replenish upstream demand in batches.
///
/// The coordinator is held weakly. Signals arriving after it is dropped are discarded.
pub struct InnerAdapter<T, E> {
    id: AdapterId,
    prefetch: Prefetch,
    coordinator: Weak<dyn Coordinator<T, E>>,
    link: UpstreamLink<T, E>,
    state: AtomicAdapterState,
    accountant: RequestAccountant,
    // set exactly once, by the attaching call, before the state leaves Fresh.
    negotiated: OnceLock<Negotiated<T, E>>,
}

// result of fusion negotiation.
struct Negotiated<T, E> {
    mode: FusionMode,
    buffer: Buffer<T, E>,
}

impl<T, E> InnerAdapter<T, E> {
    /// Construct an adapter reporting to `coordinator`.
    pub fn new<C>(coordinator: &Arc<C>, prefetch: Prefetch) -> Arc<Self>
    where
        C: Coordinator<T, E> + 'static,
    {
        let coordinator: Weak<C> = Arc::downgrade(coordinator);
        let coordinator: Weak<dyn Coordinator<T, E>> = coordinator;
        Arc::new(InnerAdapter {
            id: AdapterId::mint(),
            prefetch,
            coordinator,
            link: UpstreamLink::new(),
            state: AtomicAdapterState::new(),
            accountant: RequestAccountant::new(prefetch.limit()),
            negotiated: OnceLock::new(),
        })
    }

    /// This adapter's identity.
    pub fn id(&self) -> AdapterId {
        self.id
    }

    /// The prefetch this adapter was constructed with.
    pub fn prefetch(&self) -> Prefetch {
        self.prefetch
    }

    /// The replenishment threshold, or `None` if unbounded.
    pub fn limit(&self) -> Option<u64> {
        self.accountant.limit()
    }

    /// Items consumed since the last replenishment.
    pub fn produced(&self) -> u64 {
        self.accountant.produced()
    }

    /// The negotiated fusion mode, once attached.
    pub fn fusion_mode(&self) -> Option<FusionMode> {
        self.negotiated.get().map(|negotiated| negotiated.mode)
    }

    /// The buffer to poll items from, once attached.
    pub fn buffer(&self) -> Option<&Buffer<T, E>> {
        self.negotiated.get().map(|negotiated| &negotiated.buffer)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AdapterState {
        self.state.load()
    }

    /// Whether the source is fully materialized or has been marked fully drained.
    pub fn is_done(&self) -> bool {
        self.state() == AdapterState::Done
    }

    /// Whether the adapter was cancelled.
    ///
    /// A synchronously fused adapter is already done when cancelled, so its state stays `Done`,
    /// but it still counts as cancelled here.
    pub fn is_cancelled(&self) -> bool {
        self.state() == AdapterState::Cancelled || self.link.is_cancelled()
    }

    /// Record that the coordinator has fully drained this adapter after its terminal signal.
    ///
    /// Has no effect if the adapter is already done or cancelled.
    pub fn mark_done(&self) {
        if !self.state.finish() {
            trace!(adapter = %self.id, state = ?self.state(), "mark_done on terminal adapter");
        }
    }

    /// Report one item consumed from the buffer.
    ///
    /// Every `limit` calls replenish `limit` items upstream.
    pub fn request_one(&self) {
        if let Some(n) = self.accountant.request_one() {
            self.request_upstream(n);
        }
    }

    /// Report `n` items consumed from the buffer.
    ///
    /// Once the running total reaches `limit`, the whole total is requested upstream.
    pub fn request_bulk(&self, n: u64) {
        if let Some(n) = self.accountant.request_bulk(n) {
            self.request_upstream(n);
        }
    }

    /// Cancel the upstream, now or as soon as it attaches. Idempotent.
    ///
    /// Items the upstream still delivers afterwards are discarded. Items already buffered are
    /// left for the coordinator to clear.
    pub fn cancel(&self) {
        self.state.cancel();
        if self.link.cancel() {
            trace!(adapter = %self.id, "cancelled");
        }
    }

    fn request_upstream(&self, n: u64) {
        match self.link.get() {
            Some(upstream) => upstream.request(n),
            None => trace!(adapter = %self.id, n, "no attached upstream, dropping request"),
        }
    }

    fn with_coordinator<F>(&self, f: F)
    where
        F: FnOnce(&dyn Coordinator<T, E>),
    {
        match self.coordinator.upgrade() {
            Some(coordinator) => f(&*coordinator),
            None => trace!(adapter = %self.id, "coordinator dropped, discarding signal"),
        }
    }

    // forward an item arrival, or discard it if this adapter no longer accepts items.
    fn arrive(&self, item: Option<T>) {
        let Some(negotiated) = self.negotiated.get() else {
            trace!(adapter = %self.id, "item before subscription, discarding");
            return;
        };

        if negotiated.mode == FusionMode::Sync {
            if self.is_cancelled() {
                trace!(adapter = %self.id, "item after cancel, discarding");
            } else {
                self.with_coordinator(|coordinator| coordinator.drain_requested(self));
            }
            return;
        }

        match self.state() {
            AdapterState::Active => (),
            state => {
                trace!(adapter = %self.id, ?state, "item on inactive adapter, discarding");
                return;
            }
        }

        let arrival = match (&negotiated.buffer, item) {
            (Buffer::Owned(queue), Some(item)) => match queue.offer(item) {
                Ok(()) => Arrival::Queued,
                Err(item) => {
                    warn!(adapter = %self.id, "upstream emitted beyond requested demand");
                    Arrival::Overflow(item)
                }
            },
            (Buffer::Owned(_), None) => {
                trace!(adapter = %self.id, "availability signal on unfused adapter, ignoring");
                return;
            }
            (Buffer::Fused(_), _) => Arrival::Available,
        };
        self.with_coordinator(|coordinator| coordinator.item_ready(self, arrival));
    }
}

impl<T: Send, E> Subscriber<T, E> for InnerAdapter<T, E> {
    fn on_subscribe(&self, upstream: Arc<dyn Upstream<T, E>>) {
        let upstream = match self.link.attach(upstream) {
            Attach::Attached(upstream) => upstream,
            Attach::Duplicate => {
                trace!(adapter = %self.id, "upstream already attached, ignoring another");
                return;
            }
            Attach::Cancelled => {
                trace!(adapter = %self.id, "upstream attached after cancel, cancelled it");
                return;
            }
        };

        let grant = upstream.negotiate_fusion(FusionRequest::ANY);
        let mode = grant.mode();
        let buffer = match grant {
            FusionGrant::Sync(queue) | FusionGrant::Async(queue) => Buffer::Fused(queue),
            FusionGrant::None => Buffer::Owned(Arc::new(OwnedQueue::for_prefetch(self.prefetch))),
        };
        if self.negotiated.set(Negotiated { mode, buffer }).is_err() {
            // only the winning attach reaches here
            unreachable!("fusion negotiated twice for {}", self.id);
        }
        debug!(adapter = %self.id, ?mode, "negotiated fusion");

        if !self.state.activate() {
            trace!(adapter = %self.id, "cancelled during negotiation");
            return;
        }
        match mode {
            FusionMode::Sync => {
                // everything is already in the queue, so there is nothing to request
                if self.state.finish() {
                    self.with_coordinator(|coordinator| coordinator.drain_requested(self));
                }
            }
            FusionMode::Async | FusionMode::None => {
                upstream.request(self.prefetch.initial_request());
            }
        }
    }

    fn on_item(&self, item: T) {
        self.arrive(Some(item));
    }

    fn on_available(&self) {
        self.arrive(None);
    }

    fn on_error(&self, error: E) {
        self.with_coordinator(|coordinator| coordinator.error_ready(self, error));
    }

    fn on_complete(&self) {
        self.with_coordinator(|coordinator| coordinator.complete_ready(self));
    }
}

impl<T, E> Debug for InnerAdapter<T, E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("InnerAdapter")
            .field("id", &self.id)
            .field("prefetch", &self.prefetch)
            .field("state", &self.state())
            .field("fusion_mode", &self.fusion_mode())
            .field("produced", &self.produced())
            .finish()
    }
}
