use std::fmt::Debug;
use std::future::Future;
use std::future::Ready;
use std::future::ready;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;

use shot_gate::Activation;
use shot_gate::AdmissionService;
use shot_gate::ThresholdCache;

use crate::refusal::Refusal;

#[derive(Clone, Debug)]
struct PartialActivationMetrics {
    refused: Counter<u64>,
}

/// A service gated by a partial activation threshold.
///
/// Built by [`PartialActivationLayer`](crate::PartialActivationLayer).
pub struct PartialActivationService<S, K, F, R>
where
    K: Hash + Eq,
{
    inner: S,
    gate: Arc<AdmissionService<K>>,
    activation: Arc<Activation>,
    key: F,
    cache: Option<Arc<dyn ThresholdCache>>,
    refusal: R,
    instruments: PartialActivationMetrics,
}

pin_project! {
    /// Either the inner service's future, or the refusal answer.
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F, T> {
        Admitted {
            #[pin]
            inner: F,
        },
        Refused {
            answer: Ready<Result<T, BoxError>>,
        },
    }
}

impl<F, T> Future for ResponseFuture<F, T>
where
    F: Future<Output = Result<T, BoxError>>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Admitted { inner } => inner.poll(cx),
            ResponseFutureProj::Refused { answer } => Pin::new(answer).poll(cx),
        }
    }
}

impl<S, K, F, R> Clone for PartialActivationService<S, K, F, R>
where
    S: Clone,
    K: Hash + Eq,
    F: Clone,
    R: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: Arc::clone(&self.gate),
            activation: Arc::clone(&self.activation),
            key: self.key.clone(),
            cache: self.cache.clone(),
            refusal: self.refusal.clone(),
            instruments: self.instruments.clone(),
        }
    }
}

impl<S, K, F, R, Req> Service<Req> for PartialActivationService<S, K, F, R>
where
    S: Service<Req, Error = BoxError>,
    K: Hash + Eq + Clone + Debug,
    F: Fn(&Req) -> K,
    R: Refusal<S::Response>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future, S::Response>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Admission is decided per call and never waits, so readiness is the
        // inner service's.
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let key = (self.key)(&req);
        match self
            .gate
            .decide(&self.activation, &key, self.cache.as_deref())
        {
            ControlFlow::Continue(()) => ResponseFuture::Admitted {
                inner: self.inner.call(req),
            },
            ControlFlow::Break(reason) => {
                let name = &self.activation.name;
                self.instruments
                    .refused
                    .add(1, &[KeyValue::new("gate", name.clone())]);
                tracing::debug!(gate = %name, key = ?key, ?reason, "call refused");
                ResponseFuture::Refused {
                    answer: ready(self.refusal.refuse(name, reason)),
                }
            }
        }
    }
}

impl<S, K, F, R> PartialActivationService<S, K, F, R>
where
    K: Hash + Eq,
{
    pub fn new(
        inner: S,
        gate: Arc<AdmissionService<K>>,
        activation: Arc<Activation>,
        key: F,
        cache: Option<Arc<dyn ThresholdCache>>,
        refusal: R,
    ) -> Self {
        let meter = global::meter("partial_activation_service");
        let instruments = PartialActivationMetrics {
            refused: meter.u64_counter("refused").build(),
        };

        Self {
            inner,
            gate,
            activation,
            key,
            cache,
            refusal,
            instruments,
        }
    }

    /// The wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}
