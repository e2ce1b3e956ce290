//! Per-source backpressure adapter for fan-in operators.
//!
//! A fan-in operator (merge, eager concat, and friends) subscribes to many upstream sources at
//! once and drains them from a single loop. [`InnerAdapter`] sits between one such upstream and
//! the operator's [`Coordinator`](coordinator::Coordinator): it buffers what the upstream emits,
//! amortizes replenishment requests, negotiates queue fusion with upstreams that can expose their
//! internal buffer, and resolves the race between attaching an upstream and cancelling it.

#[macro_use]
extern crate tracing;

mod adapter;
mod util;
#[cfg(test)]
mod testing;

pub mod active_set;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fusion;
pub mod protocol;
pub mod queue;
pub mod source;

pub use crate::adapter::{
    AdapterId,
    AdapterState,
    Buffer,
    InnerAdapter,
};
