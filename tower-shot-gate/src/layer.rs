use std::hash::Hash;
use std::sync::Arc;

use shot_gate::Activation;
use shot_gate::AdmissionService;
use shot_gate::MemoryCache;
use shot_gate::ThresholdCache;
use tower::Layer;

use crate::refusal::Declared;
use crate::refusal::Fail;
use crate::refusal::Silent;
use crate::service::PartialActivationService;

/// Gates requests behind a partial activation threshold.
///
/// Every request is mapped to a key by `key`; the [`AdmissionService`] then
/// admits or refuses it against the threshold configured for the
/// [`Activation`]. Refused requests never reach the inner service; the
/// refusal policy `R` decides what is returned instead.
///
/// Each layer resolves thresholds through its own [`MemoryCache`] unless told
/// otherwise, so two call sites gated by the same property keep separate
/// cache entries. Services produced by one layer share its cache.
pub struct PartialActivationLayer<K, F, R = Fail>
where
    K: Hash + Eq,
{
    gate: Arc<AdmissionService<K>>,
    activation: Arc<Activation>,
    key: F,
    cache: Option<Arc<dyn ThresholdCache>>,
    refusal: R,
}

impl<K, F, R> Clone for PartialActivationLayer<K, F, R>
where
    K: Hash + Eq,
    F: Clone,
    R: Clone,
{
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            activation: Arc::clone(&self.activation),
            key: self.key.clone(),
            cache: self.cache.clone(),
            refusal: self.refusal.clone(),
        }
    }
}

impl<K, F> PartialActivationLayer<K, F, Fail>
where
    K: Hash + Eq,
{
    /// Create a layer that fails refused requests with
    /// [`GateError::Refused`](crate::GateError::Refused), carrying the
    /// activation's message.
    pub fn new(gate: Arc<AdmissionService<K>>, activation: Activation, key: F) -> Self {
        let refusal = Fail::new(activation.message.clone());
        Self {
            gate,
            activation: Arc::new(activation),
            key,
            cache: Some(Arc::new(MemoryCache::new())),
            refusal,
        }
    }
}

impl<K, F> PartialActivationLayer<K, F, Declared>
where
    K: Hash + Eq,
{
    /// Create a layer whose refusals follow the activation: silent call sites
    /// answer `Default::default()`, others fail.
    pub fn declared(gate: Arc<AdmissionService<K>>, activation: Activation, key: F) -> Self {
        let refusal = Declared::new(activation.silent, activation.message.clone());
        Self {
            gate,
            activation: Arc::new(activation),
            key,
            cache: Some(Arc::new(MemoryCache::new())),
            refusal,
        }
    }
}

impl<K, F, R> PartialActivationLayer<K, F, R>
where
    K: Hash + Eq,
{
    /// Answer refused requests with `fallback()` instead of an error.
    pub fn silent<G>(self, fallback: G) -> PartialActivationLayer<K, F, Silent<G>> {
        PartialActivationLayer {
            gate: self.gate,
            activation: self.activation,
            key: self.key,
            cache: self.cache,
            refusal: Silent::new(fallback),
        }
    }

    /// Resolve thresholds through `cache`, which may be shared with other
    /// layers.
    ///
    /// Entries are keyed by threshold name only. Layers sharing a cache should
    /// declare the same `default` and `sources` for a given name; otherwise the
    /// first resolution is the one every layer sees.
    pub fn with_cache(mut self, cache: Arc<dyn ThresholdCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve the threshold from configuration on every request.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn activation(&self) -> &Activation {
        &self.activation
    }
}

impl<S, K, F, R> Layer<S> for PartialActivationLayer<K, F, R>
where
    K: Hash + Eq,
    F: Clone,
    R: Clone,
{
    type Service = PartialActivationService<S, K, F, R>;

    fn layer(&self, inner: S) -> Self::Service {
        PartialActivationService::new(
            inner,
            Arc::clone(&self.gate),
            Arc::clone(&self.activation),
            self.key.clone(),
            self.cache.clone(),
            self.refusal.clone(),
        )
    }
}
