// implementation of the per-source adapter.
//
// an adapter is created by a coordinator for each inner source it discovers, and subscribed to
// that source. the pieces are organized as such:
//
//      link: set-once, cancel-able slot for the upstream handle. the attach/cancel race is
//      |     resolved entirely here, with a state byte and compare-and-swap.
//      |
//      |       state: Fresh/Active/Done/Cancelled tag of the adapter as a whole. terminal states
//      |       |      never revert.
//      |       |
//      |       |       accountant: counts consumed items and decides when to replenish. touched
//      |       |       |           only by the coordinator's drain loop.
//      |       |       |
//      v       v       v
//      inner: the adapter proper. implements Subscriber toward the upstream, negotiates fusion
//             once upon attach, picks the buffer, and forwards signals to the coordinator.
//
// buffer is the type the coordinator polls from: either the adapter's own queue or the queue
// exposed by a fused upstream. id mints process-unique adapter ids.

mod accountant;
mod buffer;
mod id;
mod inner;
mod link;
mod state;

pub use self::{
    buffer::Buffer,
    id::AdapterId,
    inner::InnerAdapter,
    state::AdapterState,
};
