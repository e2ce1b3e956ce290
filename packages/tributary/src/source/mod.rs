//! Reference upstream sources.
//!
//! These cover the three ways an upstream can feed an adapter: a fully materialized sequence
//! that grants synchronous fusion, a push-driven queue that grants asynchronous fusion, and an
//! asynchronous stream that only ever delivers items by value.

mod iter;
mod queue;
#[cfg(feature = "futures")]
mod stream;

pub use self::{
    iter::IterSource,
    queue::QueueSource,
};
#[cfg(feature = "futures")]
pub use self::stream::StreamSource;
