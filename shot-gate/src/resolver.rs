use crate::PropertyResolver;
use crate::Threshold;
use crate::ThresholdCache;

/// Resolve the threshold configured under `name`.
///
/// A cache hit, including a cached "no threshold", short-circuits the lookup.
/// Otherwise `name` is looked up through `resolver` (restricted to `sources`
/// when non-empty), falling back to `default` when it is not configured. The
/// outcome is written back to the cache either way.
///
/// Concurrent first-time resolutions of one name may both reach the resolver;
/// they compute the same value, so the duplicate write is harmless.
pub fn resolve_threshold(
    name: &str,
    default: impl FnOnce() -> Option<Threshold>,
    cache: Option<&dyn ThresholdCache>,
    resolver: &dyn PropertyResolver,
    sources: &[String],
) -> Option<Threshold> {
    if let Some(cached) = cache.and_then(|cache| cache.get(name)) {
        tracing::trace!(gate = name, threshold = ?cached, "threshold cache hit");
        return cached;
    }

    let resolved = match resolver.lookup(name, sources) {
        Some(raw) => {
            let threshold = Threshold::parse(Some(&raw));
            if threshold.is_none() && !raw.trim().is_empty() {
                tracing::warn!(gate = name, raw = %raw, "ignoring unparsable threshold; gate is open");
            }
            threshold
        }
        None => default(),
    };
    tracing::debug!(gate = name, threshold = ?resolved, "resolved threshold");

    if let Some(cache) = cache {
        cache.put(name, resolved);
    }
    resolved
}
