use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

use crate::Kind;
use crate::Reason;
use crate::Threshold;

const CYCLE: u32 = 100;

/// Per-key admission counters.
///
/// Each key gets its own atomic counter the first time it is evaluated against
/// a counting threshold. Every decision is a single compare-and-swap on that
/// counter, so concurrent callers on one key are linearizable and callers on
/// different keys only share a shard lookup.
///
/// Keys are never removed. A registry fed with unbounded key cardinality grows
/// without bound; evicting a key would reset its quota, which changes the
/// admission outcome, so that choice is left to the owner of the registry.
pub struct CounterRegistry<K> {
    counters: DashMap<K, AtomicU32>,
}

impl<K> Default for CounterRegistry<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for CounterRegistry<K>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterRegistry")
            .field("keys", &self.counters.len())
            .finish()
    }
}

impl<K> CounterRegistry<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Decide whether the next call for `key` is admitted under `threshold`.
    ///
    /// # Errors
    ///
    /// Returns the [`Reason`] for a refusal.
    pub fn decide<Q>(&self, threshold: Option<&Threshold>, key: &Q) -> ControlFlow<Reason>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let Some(threshold) = threshold else {
            return ControlFlow::Continue(());
        };
        if threshold.is_closed() {
            return ControlFlow::Break(Reason::Disabled);
        }
        if threshold.is_open() {
            return ControlFlow::Continue(());
        }

        let magnitude = threshold.magnitude();
        self.with_counter(key, |counter| match threshold.kind() {
            Kind::Count => by_count(counter, magnitude),
            Kind::Percentage => by_percentage(counter, magnitude),
        })
    }

    pub fn is_accepted<Q>(&self, threshold: Option<&Threshold>, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.decide(threshold, key).is_continue()
    }

    pub fn is_refused<Q>(&self, threshold: Option<&Threshold>, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        !self.is_accepted(threshold, key)
    }

    /// The current counter value for `key`, if it has one.
    pub fn current<Q>(&self, key: &Q) -> Option<u32>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.counters
            .get(key)
            .map(|counter| counter.load(Ordering::Acquire))
    }

    /// Number of keys holding a counter.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn with_counter<Q, T>(&self, key: &Q, f: impl FnOnce(&AtomicU32) -> T) -> T
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        // Read lock on the fast path; only the first call for a key takes the
        // shard write lock.
        if let Some(counter) = self.counters.get(key) {
            return f(counter.value());
        }
        let counter = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| AtomicU32::new(0))
            .downgrade();
        f(counter.value())
    }
}

/// Quota exhaustion: the first `limit` calls pass, every later call is
/// refused. The counter is pinned at `limit` once exhausted.
fn by_count(counter: &AtomicU32, limit: u32) -> ControlFlow<Reason> {
    let previous = counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            if current < limit {
                Some(current + 1)
            } else {
                Some(limit)
            }
        })
        .unwrap_or(limit);

    if previous < limit {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(Reason::Exhausted { limit })
    }
}

/// Deterministic sampling over a cycle of a hundred calls: every
/// `100 / percent`-th call passes.
fn by_percentage(counter: &AtomicU32, percent: u32) -> ControlFlow<Reason> {
    let step = CYCLE / percent;
    let previous = counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            let next = current.saturating_add(1);
            if next >= CYCLE {
                Some(next % CYCLE)
            } else {
                Some(next)
            }
        })
        .unwrap_or(0);

    let position = previous.saturating_add(1);
    if position % step == 0 {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(Reason::Skipped { percent })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::thread;

    use more_asserts::assert_le;

    use super::*;

    fn accepted_calls(
        registry: &CounterRegistry<String>,
        threshold: Option<&Threshold>,
        key: &str,
        calls: u32,
    ) -> Vec<u32> {
        (1..=calls)
            .filter(|_| registry.is_accepted(threshold, key))
            .collect()
    }

    #[test]
    fn absent_threshold_always_accepts() {
        let registry = CounterRegistry::<String>::new();
        assert_eq!(accepted_calls(&registry, None, "k", 500).len(), 500);
        // No counter is allocated when nothing is gated.
        assert!(registry.is_empty());
    }

    #[test]
    fn zero_always_refuses() {
        let registry = CounterRegistry::<String>::new();
        for threshold in [Threshold::count(0), Threshold::percentage(0)] {
            assert!(accepted_calls(&registry, Some(&threshold), "k", 50).is_empty());
            assert_eq!(
                registry.decide(Some(&threshold), "k"),
                ControlFlow::Break(Reason::Disabled)
            );
        }
    }

    #[test]
    fn count_accepts_the_first_n_calls_only() {
        let registry = CounterRegistry::<String>::new();
        let threshold = Threshold::count(3);

        for call in 1..=100 {
            let accepted = registry.is_accepted(Some(&threshold), "k");
            assert_eq!(accepted, call <= 3, "call {call}");
            assert_le!(registry.current("k").unwrap(), 3);
        }
        assert_eq!(
            registry.decide(Some(&threshold), "k"),
            ControlFlow::Break(Reason::Exhausted { limit: 3 })
        );
    }

    #[test]
    fn count_pins_a_counter_left_above_a_lowered_limit() {
        let registry = CounterRegistry::<String>::new();
        accepted_calls(&registry, Some(&Threshold::count(10)), "k", 10);

        assert!(registry.is_refused(Some(&Threshold::count(4)), "k"));
        assert_eq!(registry.current("k"), Some(4));
    }

    #[test]
    fn full_percentage_always_accepts() {
        let registry = CounterRegistry::<String>::new();
        let threshold = Threshold::percentage(100);
        assert_eq!(accepted_calls(&registry, Some(&threshold), "k", 1000).len(), 1000);
    }

    #[test]
    fn quarter_accepts_every_fourth_call() {
        let registry = CounterRegistry::<String>::new();
        let threshold = Threshold::percentage(25);

        let accepted = accepted_calls(&registry, Some(&threshold), "k", 100);
        assert_eq!(accepted, (1..=25).map(|n| n * 4).collect::<Vec<_>>());
        assert_eq!(registry.current("k"), Some(0));

        // The cycle restarts: call 101 behaves like call 1.
        assert!(registry.is_refused(Some(&threshold), "k"));
        assert_eq!(accepted_calls(&registry, Some(&threshold), "k", 99).len(), 25);
    }

    #[test]
    fn one_percent_accepts_the_hundredth_call() {
        let registry = CounterRegistry::<String>::new();
        let threshold = Threshold::percentage(1);

        let accepted = accepted_calls(&registry, Some(&threshold), "k", 300);
        assert_eq!(accepted, vec![100, 200, 300]);
    }

    #[test]
    fn uneven_percentages_round_the_step_down() {
        let registry = CounterRegistry::<String>::new();
        // step = 100 / 33 = 3
        let accepted = accepted_calls(&registry, Some(&Threshold::percentage(33)), "k", 100);
        assert_eq!(accepted.len(), 33);
        assert_eq!(accepted.first(), Some(&3));
        assert_eq!(accepted.last(), Some(&99));

        // step = 100 / 60 = 1, so every call passes.
        let accepted = accepted_calls(&registry, Some(&Threshold::percentage(60)), "other", 100);
        assert_eq!(accepted.len(), 100);
    }

    #[test]
    fn keys_are_independent() {
        let registry = CounterRegistry::<String>::new();
        let threshold = Threshold::count(2);

        assert!(registry.is_accepted(Some(&threshold), "a"));
        assert!(registry.is_accepted(Some(&threshold), "a"));
        assert!(registry.is_refused(Some(&threshold), "a"));

        assert!(registry.is_accepted(Some(&threshold), "b"));
        assert!(registry.is_accepted(Some(&threshold), "b"));
        assert!(registry.is_refused(Some(&threshold), "b"));

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn count_is_exact_under_thread_contention() {
        let limit = 64;
        let callers = 16;
        let calls_per_caller = 20;
        let registry = Arc::new(CounterRegistry::<String>::new());
        let threshold = Threshold::count(limit);
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..calls_per_caller)
                        .filter(|_| registry.is_accepted(Some(&threshold), "hot"))
                        .count()
                })
            })
            .collect();

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, limit as usize);
        assert_eq!(registry.current("hot"), Some(limit));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn count_accepts_min_of_limit_and_callers() {
        for (limit, callers) in [(10u32, 100usize), (100, 10)] {
            let registry = Arc::new(CounterRegistry::<String>::new());
            let threshold = Threshold::count(limit);

            let handles = (0..callers).map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.is_accepted(Some(&threshold), "site") })
            });

            let accepted = futures::future::join_all(handles)
                .await
                .into_iter()
                .filter(|r| matches!(r, Ok(true)))
                .count();

            assert_eq!(accepted, (limit as usize).min(callers));
        }
    }

    #[test]
    fn percentage_is_exact_under_thread_contention() {
        let callers = 8;
        let calls_per_caller = 250;
        let registry = Arc::new(CounterRegistry::<String>::new());
        let threshold = Threshold::percentage(10);
        let barrier = Arc::new(Barrier::new(callers));

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..calls_per_caller)
                        .filter(|_| registry.is_accepted(Some(&threshold), "sampled"))
                        .count()
                })
            })
            .collect();

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 2000 calls at one in ten.
        assert_eq!(accepted, 200);
    }
}
