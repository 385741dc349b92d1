use crate::transport::{TransportField, TransportSample};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-field totals of the transport counters of closed connections.
///
/// The totals start at `0` and only ever grow: there is no reset. They are
/// [`Sync`] and [`Send`] so the close path and a scrape running on another
/// thread can share them without a lock.
///
/// # Thread Safety
///
/// Every counter is an [`AtomicU64`]. Additions go through
/// [`AtomicU64::compare_exchange_weak`] so that they can saturate at
/// `u64::MAX` instead of wrapping around to a smaller value.
#[derive(Debug)]
pub struct RunningTotals {
    totals: [AtomicU64; TransportField::COUNT],
}

/// a scrape must not observe the totals of a close before the close itself
const ORDERING: Ordering = Ordering::SeqCst;

/// ordering of the loads
const FETCH_ORDERING: Ordering = ORDERING;

/// ordering of the successful exchanges
const STORE_ORDERING: Ordering = ORDERING;

impl RunningTotals {
    /// create new [`RunningTotals`] with every counter at `0`.
    ///
    /// ```
    /// # use swarm_stats_core::{RunningTotals, TransportField};
    /// let totals = RunningTotals::new();
    /// assert_eq!(totals.get(TransportField::BytesTransmitted), 0);
    /// ```
    pub fn new() -> Self {
        Self {
            totals: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn get(&self, field: TransportField) -> u64 {
        self.totals[field.index()].load(FETCH_ORDERING)
    }

    /// add `value` to the total of `field` and return the new total.
    ///
    /// ```
    /// # use swarm_stats_core::{RunningTotals, TransportField};
    /// let totals = RunningTotals::new();
    /// totals.add(TransportField::Retransmits, u64::MAX - 1);
    /// let total = totals.add(TransportField::Retransmits, 10);
    /// assert_eq!(total, u64::MAX);
    /// ```
    pub fn add(&self, field: TransportField, value: u64) -> u64 {
        let total = &self.totals[field.index()];
        let mut prev = total.load(FETCH_ORDERING);

        loop {
            let next = prev.saturating_add(value);

            match total.compare_exchange_weak(prev, next, STORE_ORDERING, FETCH_ORDERING) {
                Ok(_) => return next,
                Err(next_prev) => prev = next_prev,
            }
        }
    }

    /// add every field of the `sample` to the matching total.
    pub fn fold(&self, sample: &TransportSample) {
        for (field, value) in sample.iter() {
            if value > 0 {
                self.add(field, value);
            }
        }
    }

    /// current value of every total.
    ///
    /// Each total is read independently: a concurrent [`Self::fold`] may be
    /// visible on some fields and not yet on others.
    pub fn snapshot(&self) -> TransportSample {
        TransportSample::from_fn(|field| self.get(field))
    }
}

impl Default for RunningTotals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn starts_at_zero() {
        let totals = RunningTotals::default();
        assert_eq!(totals.snapshot(), TransportSample::ZERO);
    }

    #[test]
    fn fold_adds_each_field() {
        let totals = RunningTotals::new();
        let sample = TransportSample::from_fn(|field| field.index() as u64 + 1);

        totals.fold(&sample);
        totals.fold(&sample);

        for field in TransportField::ALL {
            assert_eq!(totals.get(field), 2 * (field.index() as u64 + 1));
        }
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        const THREADS: u64 = 8;
        const ADDS: u64 = 1_000;

        let totals = Arc::new(RunningTotals::new());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let totals = Arc::clone(&totals);
                thread::spawn(move || {
                    for _ in 0..ADDS {
                        totals.add(TransportField::BytesReceived, 3);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            totals.get(TransportField::BytesReceived),
            THREADS * ADDS * 3
        );
    }
}
