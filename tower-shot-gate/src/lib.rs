//! # Tower Shot Gate
//!
//! `tower-shot-gate` puts [`shot_gate`] partial activation thresholds in front
//! of any [Tower](https://github.com/tower-rs/tower) service.
//!
//! A [`PartialActivationLayer`] is configured with:
//!
//! 1. **An admission service**: the shared [`shot_gate::AdmissionService`]
//!    holding the per-key counters and the configuration resolver.
//! 2. **An activation**: the [`shot_gate::Activation`] naming the threshold
//!    property, its default and the sources to search.
//! 3. **A key extractor**: a function mapping each request to the key whose
//!    counter it draws from. Use a constant to gate the call site as a whole.
//!
//! Refused requests never reach the inner service. By default they fail with
//! [`GateError::Refused`]; [`PartialActivationLayer::silent`] answers with a
//! fallback response instead.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use shot_gate::Activation;
//! use shot_gate::AdmissionService;
//! use shot_gate::MapSource;
//! use shot_gate::PropertySources;
//! use tower::BoxError;
//! use tower::Layer;
//! use tower::ServiceExt;
//! use tower::service_fn;
//! use tower_shot_gate::PartialActivationLayer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sources = PropertySources::new()
//!     .with_source(MapSource::new("application").with("features.beta", "1"));
//! let gate: Arc<AdmissionService<&str>> = Arc::new(AdmissionService::new(Arc::new(sources)));
//!
//! let layer = PartialActivationLayer::new(gate, Activation::new("features.beta"), |_: &u32| "beta");
//! let svc = layer.layer(service_fn(|n: u32| async move { Ok::<_, BoxError>(n * 2) }));
//!
//! assert_eq!(svc.clone().oneshot(21).await.unwrap(), 42);
//! assert!(svc.oneshot(21).await.is_err());
//! # }
//! ```

mod error;
mod layer;
mod refusal;
mod service;


pub use error::GateError;
pub use layer::PartialActivationLayer;
pub use refusal::Declared;
pub use refusal::Fail;
pub use refusal::Refusal;
pub use refusal::Silent;
pub use service::PartialActivationService;
pub use service::ResponseFuture;
