// amortized replenishment of upstream demand.
//
// the coordinator reports consumption here, and gets back the amount to request upstream, if any.
// nothing is requested until `limit` items have been consumed since the last replenishment, so a
// prefetch of p costs one request per p - p/4 items rather than one per item.

use std::sync::atomic::{
    AtomicU64,
    Ordering::Relaxed,
};


pub(crate) struct RequestAccountant {
    // replenishment threshold. None means unbounded demand was requested and nothing is tracked.
    limit: Option<u64>,
    // consumed since the last replenishment. invariant: produced < limit.
    //
    // only the coordinator's drain loop touches this, one call at a time, so plain loads and stores
    // suffice. the atomic is for Sync, not for contention.
    produced: AtomicU64,
}

impl RequestAccountant {
    pub(crate) fn new(limit: Option<u64>) -> Self {
        debug_assert!(limit.is_none_or(|limit| limit >= 1), "zero replenishment limit");
        RequestAccountant {
            limit,
            produced: AtomicU64::new(0),
        }
    }

    pub(crate) fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub(crate) fn produced(&self) -> u64 {
        self.produced.load(Relaxed)
    }

    // account for one consumed item.
    pub(crate) fn request_one(&self) -> Option<u64> {
        let limit = self.limit?;
        let p = self.produced.load(Relaxed) + 1;
        if p == limit {
            self.produced.store(0, Relaxed);
            Some(p)
        } else {
            self.produced.store(p, Relaxed);
            None
        }
    }

    // account for n consumed items at once.
    pub(crate) fn request_bulk(&self, n: u64) -> Option<u64> {
        let limit = self.limit?;
        let p = self.produced.load(Relaxed).saturating_add(n);
        if p >= limit {
            self.produced.store(0, Relaxed);
            Some(p)
        } else {
            self.produced.store(p, Relaxed);
            None
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prefetch;

    fn accountant(prefetch: usize) -> RequestAccountant {
        RequestAccountant::new(Prefetch::new(prefetch).unwrap().limit())
    }

    #[test]
    fn twelve_of_sixteen_replenishes_twelve() {
        let acc = accountant(16);
        assert_eq!(acc.limit(), Some(12));
        for cycle in 0..5 {
            for i in 1..12 {
                assert_eq!(acc.request_one(), None, "cycle {} item {}", cycle, i);
                assert_eq!(acc.produced(), i);
            }
            assert_eq!(acc.request_one(), Some(12));
            assert_eq!(acc.produced(), 0);
        }
    }

    #[test]
    fn prefetch_two_replenishes_every_pair() {
        let acc = accountant(2);
        assert_eq!(acc.limit(), Some(2));
        for _ in 0..10 {
            assert_eq!(acc.request_one(), None);
            assert_eq!(acc.request_one(), Some(2));
        }
    }

    #[test]
    fn prefetch_one_replenishes_every_item() {
        let acc = accountant(1);
        for _ in 0..10 {
            assert_eq!(acc.request_one(), Some(1));
            assert_eq!(acc.produced(), 0);
        }
    }

    #[test]
    fn bulk_accumulates_until_crossing() {
        let acc = accountant(16);
        assert_eq!(acc.request_bulk(5), None);
        assert_eq!(acc.request_bulk(5), None);
        assert_eq!(acc.produced(), 10);
        assert_eq!(acc.request_bulk(5), Some(15));
        assert_eq!(acc.produced(), 0);

        // exactly reaching the limit also replenishes
        assert_eq!(acc.request_bulk(12), Some(12));
        assert_eq!(acc.produced(), 0);
    }

    #[test]
    fn one_and_bulk_share_the_counter() {
        let acc = accountant(16);
        for _ in 0..7 {
            assert_eq!(acc.request_one(), None);
        }
        assert_eq!(acc.request_bulk(4), None);
        assert_eq!(acc.request_one(), Some(12));
    }

    #[test]
    fn unbounded_never_replenishes() {
        let acc = RequestAccountant::new(Prefetch::Unbounded.limit());
        for _ in 0..1000 {
            assert_eq!(acc.request_one(), None);
        }
        assert_eq!(acc.request_bulk(u64::MAX), None);
        assert_eq!(acc.produced(), 0);
    }

    #[test]
    fn bulk_saturates() {
        let acc = accountant(16);
        assert_eq!(acc.request_bulk(3), None);
        assert_eq!(acc.request_bulk(u64::MAX), Some(u64::MAX));
    }
}
