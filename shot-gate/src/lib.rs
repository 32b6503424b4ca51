//! # shot-gate
//!
//! `shot-gate` provides configuration driven partial activation: a call site
//! declares a threshold property, and every invocation is admitted or refused
//! against a per-key counter.
//!
//! ## Thresholds
//!
//! * **Count** (`"10"`): the first ten calls for a key are admitted, every
//!   later call is refused. The quota never refills.
//! * **Percentage** (`"25%"`): calls are sampled deterministically over a
//!   cycle of a hundred; at 25% every fourth call is admitted.
//!
//! An unset or malformed threshold admits everything, `0` refuses everything
//! and `100%` admits everything without touching a counter.
//!
//! ## Key Concepts
//!
//! * **Lock-Free**: each key's counter is a single atomic updated with one
//!   compare-and-swap per decision.
//! * **Cached Resolution**: thresholds are read through a [`PropertyResolver`]
//!   and may be memoized in a [`ThresholdCache`].
//! * **Explicit Ownership**: counters live in an [`AdmissionService`] that the
//!   caller constructs and shares; there is no global state.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use shot_gate::AdmissionService;
//! use shot_gate::MapSource;
//! use shot_gate::MemoryCache;
//! use shot_gate::PropertySources;
//!
//! let sources = PropertySources::new()
//!     .with_source(MapSource::new("application").with("features.export", "2"));
//! let gate: AdmissionService<String> = AdmissionService::new(Arc::new(sources));
//! let cache = MemoryCache::new();
//!
//! let admitted = (0..5)
//!     .filter(|_| gate.is_allowed("features.export", "export", Some(&cache), None, &[]))
//!     .count();
//! assert_eq!(admitted, 2);
//! ```

mod activation;
mod cache;
mod counter;
mod error;
mod resolver;
mod service;
mod source;
mod threshold;

pub use activation::Activation;
pub use cache::MemoryCache;
pub use cache::ThresholdCache;
pub use counter::CounterRegistry;
pub use error::SourceError;
pub use error::ThresholdError;
pub use resolver::resolve_threshold;
pub use service::AdmissionService;
pub use source::EnvSource;
pub use source::MapSource;
pub use source::PropertyResolver;
pub use source::PropertySource;
pub use source::PropertySources;
pub use source::YamlSource;
pub use threshold::Kind;
pub use threshold::Threshold;

/// Reasons why a call might be refused by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// The threshold is zero; every call is refused.
    Disabled,
    /// The count quota of `limit` calls has been used up.
    Exhausted { limit: u32 },
    /// The call fell outside the `percent` share being sampled.
    Skipped { percent: u32 },
}
