use serde::Deserialize;
use serde::Serialize;

/// Declares how a call site is gated.
///
/// `name` is the configuration property holding the threshold. When the
/// property is not configured, `default` is parsed instead. `sources`
/// restricts the property lookup to the named sources.
///
/// `silent` and `message` describe what the call site does when refused; the
/// admission decision itself ignores them.
///
/// Activations can be declared in YAML:
///
/// ```rust
/// use shot_gate::Activation;
///
/// let activation: Activation = serde_yaml::from_str(
///     r#"
/// name: features.search.rollout
/// default: 10%
/// sources: [overrides]
/// "#,
/// )
/// .unwrap();
/// assert_eq!(activation.default.as_deref(), Some("10%"));
/// assert!(!activation.silent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Activation {
    pub name: String,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl Activation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            sources: Vec::new(),
            silent: false,
            message: None,
        }
    }

    /// The raw threshold used when `name` is not configured.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
