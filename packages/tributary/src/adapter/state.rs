
use std::sync::atomic::{
    AtomicU8,
    Ordering::{AcqRel, Acquire},
};


/// Lifecycle state of an adapter
///
/// `Fresh -> Active -> Done | Cancelled`, with `Fresh -> Cancelled` and `Fresh -> Done` also
/// possible. `Done` and `Cancelled` never change again.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AdapterState {
    /// Not yet attached to an upstream
    Fresh,
    /// Attached and streaming
    Active,
    /// The source is fully materialized, or the coordinator marked it fully drained
    Done,
    /// Cancelled by the coordinator
    Cancelled,
}

impl AdapterState {
    fn from_u8(byte: u8) -> Self {
        if byte == AdapterState::Fresh as u8 {
            AdapterState::Fresh
        } else if byte == AdapterState::Active as u8 {
            AdapterState::Active
        } else if byte == AdapterState::Done as u8 {
            AdapterState::Done
        } else if byte == AdapterState::Cancelled as u8 {
            AdapterState::Cancelled
        } else {
            unreachable!("invalid adapter state byte: {}", byte)
        }
    }

    /// Whether the state can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, AdapterState::Done | AdapterState::Cancelled)
    }
}

// AdapterState in an atomic byte. every transition is a compare-and-swap from a non-terminal state.
pub(crate) struct AtomicAdapterState(AtomicU8);

impl AtomicAdapterState {
    pub(crate) fn new() -> Self {
        AtomicAdapterState(AtomicU8::new(AdapterState::Fresh as u8))
    }

    pub(crate) fn load(&self) -> AdapterState {
        AdapterState::from_u8(self.0.load(Acquire))
    }

    // Fresh -> Active.
    pub(crate) fn activate(&self) -> bool {
        self.transition(AdapterState::Fresh, AdapterState::Active)
    }

    // Fresh | Active -> Done.
    pub(crate) fn finish(&self) -> bool {
        self.to_terminal(AdapterState::Done)
    }

    // Fresh | Active -> Cancelled.
    pub(crate) fn cancel(&self) -> bool {
        self.to_terminal(AdapterState::Cancelled)
    }

    fn transition(&self, from: AdapterState, to: AdapterState) -> bool {
        self.0.compare_exchange(from as u8, to as u8, AcqRel, Acquire).is_ok()
    }

    fn to_terminal(&self, to: AdapterState) -> bool {
        let mut current = self.load();
        while !current.is_terminal() {
            match self.0.compare_exchange(current as u8, to as u8, AcqRel, Acquire) {
                Ok(_) => return true,
                Err(byte) => current = AdapterState::from_u8(byte),
            }
        }
        false
    }
}
