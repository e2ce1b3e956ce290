//! Outstanding-demand arithmetic shared by the sources.
//!
//! `u64::MAX` outstanding means unbounded: adding to it or emitting against it leaves it as is.

use std::sync::atomic::{
    AtomicU64,
    Ordering::{AcqRel, Acquire},
};


/// Add `n` to the outstanding demand, saturating. Returns the previous demand.
pub(crate) fn add(requested: &AtomicU64, n: u64) -> u64 {
    match requested.fetch_update(AcqRel, Acquire, |r| Some(r.saturating_add(n))) {
        Ok(prev) | Err(prev) => prev,
    }
}

/// Subtract `emitted` from the outstanding demand unless it is unbounded. Returns the new demand.
pub(crate) fn produced(requested: &AtomicU64, emitted: u64) -> u64 {
    let update = |r: u64| if r == u64::MAX { r } else { r - emitted };
    match requested.fetch_update(AcqRel, Acquire, |r| Some(update(r))) {
        Ok(prev) | Err(prev) => update(prev),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_demand_adds_and_subtracts() {
        let requested = AtomicU64::new(0);
        assert_eq!(add(&requested, 5), 0);
        assert_eq!(add(&requested, 3), 5);
        assert_eq!(produced(&requested, 6), 2);
        assert_eq!(produced(&requested, 2), 0);
    }

    #[test]
    fn unbounded_demand_sticks() {
        let requested = AtomicU64::new(10);
        assert_eq!(add(&requested, u64::MAX - 5), 10);
        assert_eq!(requested.load(Acquire), u64::MAX);
        assert_eq!(produced(&requested, 1_000), u64::MAX);
        assert_eq!(add(&requested, 1), u64::MAX);
        assert_eq!(requested.load(Acquire), u64::MAX);
    }
}
