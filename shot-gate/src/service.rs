use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::Activation;
use crate::CounterRegistry;
use crate::PropertyResolver;
use crate::Reason;
use crate::Threshold;
use crate::ThresholdCache;
use crate::resolve_threshold;

/// Decides whether a gated call proceeds.
///
/// The service owns the counters for one family of gates and the resolver
/// used to read their thresholds. Share it through an `Arc` between every
/// call site that should count against the same counters.
#[derive(Debug)]
pub struct AdmissionService<K>
where
    K: Hash + Eq,
{
    resolver: Arc<dyn PropertyResolver>,
    counters: CounterRegistry<K>,
}

impl<K> AdmissionService<K>
where
    K: Hash + Eq,
{
    pub fn new(resolver: Arc<dyn PropertyResolver>) -> Self {
        Self {
            resolver,
            counters: CounterRegistry::new(),
        }
    }

    pub fn counters(&self) -> &CounterRegistry<K> {
        &self.counters
    }

    /// Resolve the threshold configured under `name` and admit or refuse the
    /// next call for `key` against it.
    pub fn is_allowed<Q>(
        &self,
        name: &str,
        key: &Q,
        cache: Option<&dyn ThresholdCache>,
        default: Option<&str>,
        sources: &[String],
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        self.evaluate(name, key, cache, default, sources).is_continue()
    }

    /// Like [`is_allowed`](Self::is_allowed), for a declared [`Activation`].
    ///
    /// # Errors
    ///
    /// Returns the [`Reason`] for a refusal.
    pub fn decide<Q>(
        &self,
        activation: &Activation,
        key: &Q,
        cache: Option<&dyn ThresholdCache>,
    ) -> ControlFlow<Reason>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        self.evaluate(
            &activation.name,
            key,
            cache,
            activation.default.as_deref(),
            &activation.sources,
        )
    }

    /// Produce `active()` if the call for `key` is admitted under the
    /// threshold configured at `name`, `inactive()` otherwise.
    ///
    /// Thresholds are read from configuration on every call.
    pub fn get<Q, T>(
        &self,
        name: &str,
        key: &Q,
        active: impl FnOnce() -> T,
        inactive: impl FnOnce() -> T,
    ) -> T
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        if self.is_allowed(name, key, None, None, &[]) {
            active()
        } else {
            inactive()
        }
    }

    /// Run `active` if the call for `key` is admitted, `inactive` otherwise.
    pub fn run<Q>(&self, name: &str, key: &Q, active: impl FnOnce(), inactive: impl FnOnce())
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        self.get(name, key, active, inactive)
    }

    /// Produce `Some(active())` if the call for `key` is admitted, `None`
    /// otherwise.
    pub fn get_if_allowed<Q, T>(
        &self,
        name: &str,
        key: &Q,
        active: impl FnOnce() -> T,
    ) -> Option<T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        self.get(name, key, || Some(active()), || None)
    }

    /// Run `active` only if the call for `key` is admitted. Returns whether it
    /// ran.
    pub fn run_if_allowed<Q>(&self, name: &str, key: &Q, active: impl FnOnce()) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        self.get(
            name,
            key,
            || {
                active();
                true
            },
            || false,
        )
    }

    fn evaluate<Q>(
        &self,
        name: &str,
        key: &Q,
        cache: Option<&dyn ThresholdCache>,
        default: Option<&str>,
        sources: &[String],
    ) -> ControlFlow<Reason>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + Debug + ?Sized,
    {
        let threshold = resolve_threshold(
            name,
            || Threshold::parse(default),
            cache,
            self.resolver.as_ref(),
            sources,
        );
        let decision = self.counters.decide(threshold.as_ref(), key);
        tracing::trace!(
            gate = name,
            key = ?key,
            threshold = ?threshold,
            admitted = decision.is_continue(),
            "admission decision"
        );
        decision
    }
}
