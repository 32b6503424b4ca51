use std::num::ParseIntError;
use std::path::PathBuf;

/// Reasons a raw value could not be read as a [`Threshold`](crate::Threshold).
///
/// Gates never surface this error: a threshold that fails to parse is treated
/// as absent. It is exposed for callers that want to validate configuration
/// up front.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    /// The value was empty or only whitespace.
    #[error("threshold is empty")]
    Empty,

    /// The numeric part of the value was not a valid integer.
    #[error("invalid threshold {raw:?}: {source}")]
    Invalid {
        /// The value as it was configured.
        raw: String,
        source: ParseIntError,
    },
}

/// Errors raised while loading a property source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read property file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid yaml property source: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed, but its root is not a mapping.
    #[error("yaml property source root must be a mapping")]
    NotAMapping,
}
