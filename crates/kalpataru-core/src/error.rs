use thiserror::Error;

/// Top-level error type for the Kalpataru client.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for KalpataruError` so that `?` works across crate
/// boundaries in the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KalpataruError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for KalpataruError {
    fn from(err: toml::de::Error) -> Self {
        KalpataruError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for KalpataruError {
    fn from(err: toml::ser::Error) -> Self {
        KalpataruError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for KalpataruError {
    fn from(err: serde_json::Error) -> Self {
        KalpataruError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Kalpataru operations.
pub type Result<T> = std::result::Result<T, KalpataruError>;
