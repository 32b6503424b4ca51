use shot_gate::Reason;

/// Errors produced by the partial activation middleware.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The gate refused the call and the call site is not silent.
    ///
    /// `message` is the call site's configured message, or a default naming
    /// the gate.
    #[error("{message}")]
    Refused {
        /// The configuration property gating the call.
        name: String,
        message: String,
        reason: Reason,
    },
}

impl GateError {
    pub(crate) fn refused(name: &str, message: Option<&str>, reason: Reason) -> Self {
        let message = match message {
            Some(message) => message.to_string(),
            None => format!("feature `{name}` is not active"),
        };
        Self::Refused {
            name: name.to_string(),
            message,
            reason,
        }
    }
}
