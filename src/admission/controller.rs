//! Per-key fixed-window QPS gate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::admission::clock::{Clock, SystemClock};
use crate::observability::metrics;

/// Build the admission key for an HTTP route: `<VERB>.<path>`.
pub fn admission_key(method: &str, path: &str) -> String {
    format!("{}.{}", method, path)
}

/// Request count for one key within one Unix second.
///
/// The second sits in the high 32 bits and the count in the low 32 bits of a
/// single word, so both fields change together in one compare-and-swap.
/// Seconds are stored modulo 2^32, which stays unambiguous until 2106.
#[derive(Debug, Default)]
pub struct AdmissionCounter {
    state: AtomicU64,
}

fn pack(second: u32, count: u32) -> u64 {
    (u64::from(second) << 32) | u64::from(count)
}

fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

impl AdmissionCounter {
    /// Counter with no calls recorded in `second`.
    pub fn starting_at(second: u32) -> Self {
        Self {
            state: AtomicU64::new(pack(second, 0)),
        }
    }

    /// Second the count applies to.
    pub fn second(&self) -> u32 {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    /// Calls admitted so far in [`AdmissionCounter::second`].
    pub fn count(&self) -> u32 {
        unpack(self.state.load(Ordering::Acquire)).1
    }

    /// Count this call against the window of `now`. Returns false if the
    /// window is already full; a full window is left unchanged.
    pub fn try_admit(&self, now: u32, limit: u32) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (second, count) = unpack(current);
            let next = if second != now {
                pack(now, 1)
            } else if count >= limit {
                return false;
            } else {
                pack(now, count + 1)
            };

            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Keyed admission gate shared by every handler of a process.
#[derive(Debug)]
pub struct AdmissionController {
    counters: DashMap<String, Arc<AdmissionCounter>>,
    clock: Arc<dyn Clock>,
}

impl AdmissionController {
    /// Controller driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    /// Returns true if a call on `key` would exceed `limit_per_second`.
    ///
    /// An admitted call is counted; a rejected one is not.
    pub fn is_overflow(&self, key: &str, limit_per_second: u32) -> bool {
        let now = self.clock.unix_seconds() as u32;
        let counter = self.counter(key, now);

        if counter.try_admit(now, limit_per_second) {
            return false;
        }

        tracing::debug!(key = %key, limit = limit_per_second, "Admission window full");
        metrics::record_admission_rejected(key);
        true
    }

    // Shard lock is held only for the lookup; the returned Arc outlives it.
    fn counter(&self, key: &str, now: u32) -> Arc<AdmissionCounter> {
        if let Some(existing) = self.counters.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(AdmissionCounter::starting_at(now)));
        Arc::clone(entry.value())
    }

    /// Current `(second, count)` of `key`, if it was ever observed.
    pub fn snapshot(&self, key: &str) -> Option<(u32, u32)> {
        self.counters
            .get(key)
            .map(|c| (c.second(), c.count()))
    }

    /// Number of keys observed so far.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::admission::clock::ManualClock;

    fn controller_at(second: u64) -> (AdmissionController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(second));
        (AdmissionController::with_clock(clock.clone()), clock)
    }

    #[test]
    fn limit_three_rejects_fourth_call() {
        let (controller, _clock) = controller_at(1_700_000_000);
        let results: Vec<bool> = (0..4)
            .map(|_| controller.is_overflow("POST./orders", 3))
            .collect();
        assert_eq!(results, [false, false, false, true]);
    }

    #[test]
    fn rejected_call_leaves_counter_unchanged() {
        let (controller, _clock) = controller_at(100);
        for _ in 0..5 {
            controller.is_overflow("GET./a", 2);
        }
        assert_eq!(controller.snapshot("GET./a"), Some((100, 2)));
    }

    #[test]
    fn new_second_resets_window() {
        let (controller, clock) = controller_at(100);
        assert!(!controller.is_overflow("GET./a", 1));
        assert!(controller.is_overflow("GET./a", 1));

        clock.advance(1);
        assert!(!controller.is_overflow("GET./a", 1));
        assert_eq!(controller.snapshot("GET./a"), Some((101, 1)));
    }

    #[test]
    fn window_boundary_admits_up_to_twice_the_limit() {
        let (controller, clock) = controller_at(200);
        let key = "GET./burst";

        // Tail of second N.
        for _ in 0..3 {
            assert!(!controller.is_overflow(key, 3));
        }
        // Head of second N+1: a full fresh window.
        clock.set(201);
        for _ in 0..3 {
            assert!(!controller.is_overflow(key, 3));
        }
        assert!(controller.is_overflow(key, 3));
    }

    #[test]
    fn keys_are_independent_and_exact() {
        let (controller, _clock) = controller_at(5);
        assert!(!controller.is_overflow("GET./a", 1));
        assert!(!controller.is_overflow("POST./a", 1));
        assert!(!controller.is_overflow("get./a", 1));
        assert!(controller.is_overflow("GET./a", 1));
        assert_eq!(controller.len(), 3);
    }

    #[test]
    fn admission_key_format() {
        assert_eq!(admission_key("POST", "/orders"), "POST./orders");
    }

    #[test]
    fn concurrent_callers_never_exceed_limit() {
        let (controller, _clock) = controller_at(42);
        let controller = Arc::new(controller);
        let admitted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = controller.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if !controller.is_overflow("GET./hot", 1000) {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 1000);
        assert_eq!(controller.snapshot("GET./hot"), Some((42, 1000)));
    }
}
