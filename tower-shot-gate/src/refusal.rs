use tower::BoxError;

use shot_gate::Reason;

use crate::GateError;

/// What a gated service answers in place of a refused call.
pub trait Refusal<Resp> {
    fn refuse(&self, name: &str, reason: Reason) -> Result<Resp, BoxError>;
}

/// Fail refused calls with [`GateError::Refused`].
#[derive(Debug, Clone, Default)]
pub struct Fail {
    message: Option<String>,
}

impl Fail {
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }
}

impl<Resp> Refusal<Resp> for Fail {
    fn refuse(&self, name: &str, reason: Reason) -> Result<Resp, BoxError> {
        Err(Box::new(GateError::refused(
            name,
            self.message.as_deref(),
            reason,
        )))
    }
}

/// Skip refused calls, answering with a fallback response instead.
#[derive(Debug, Clone)]
pub struct Silent<F> {
    fallback: F,
}

impl<F> Silent<F> {
    pub fn new(fallback: F) -> Self {
        Self { fallback }
    }
}

impl<F, Resp> Refusal<Resp> for Silent<F>
where
    F: Fn() -> Resp,
{
    fn refuse(&self, name: &str, reason: Reason) -> Result<Resp, BoxError> {
        tracing::debug!(gate = name, ?reason, "refused call skipped silently");
        Ok((self.fallback)())
    }
}

/// Follow the call site's [`Activation`](shot_gate::Activation): answer
/// `Resp::default()` when it is silent, fail with [`GateError::Refused`]
/// otherwise.
#[derive(Debug, Clone, Default)]
pub struct Declared {
    silent: bool,
    fail: Fail,
}

impl Declared {
    pub fn new(silent: bool, message: Option<String>) -> Self {
        Self {
            silent,
            fail: Fail::new(message),
        }
    }
}

impl<Resp> Refusal<Resp> for Declared
where
    Resp: Default,
{
    fn refuse(&self, name: &str, reason: Reason) -> Result<Resp, BoxError> {
        if self.silent {
            Refusal::<Resp>::refuse(&Silent::new(Resp::default), name, reason)
        } else {
            Refusal::<Resp>::refuse(&self.fail, name, reason)
        }
    }
}
