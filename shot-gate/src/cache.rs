use std::fmt::Debug;

use dashmap::DashMap;

use crate::Threshold;

/// A store of previously resolved thresholds, keyed by configuration name.
///
/// A stored `None` records that the name resolved to "no threshold"; it is a
/// hit, not a miss. Caches are an optimization only: dropping an entry must
/// never change a decision, it only causes the next call to resolve again.
pub trait ThresholdCache: Debug + Send + Sync {
    /// Returns `None` on a miss, `Some(resolved)` on a hit.
    fn get(&self, name: &str) -> Option<Option<Threshold>>;

    fn put(&self, name: &str, resolved: Option<Threshold>);
}

/// An unbounded in-memory [`ThresholdCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Option<Threshold>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every resolved threshold, forcing the next lookups to resolve
    /// again.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl ThresholdCache for MemoryCache {
    fn get(&self, name: &str) -> Option<Option<Threshold>> {
        self.entries.get(name).map(|entry| *entry)
    }

    fn put(&self, name: &str, resolved: Option<Threshold>) {
        self.entries.insert(name.to_string(), resolved);
    }
}
