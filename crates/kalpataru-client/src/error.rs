//! Error types for outbound requests.

use std::time::Duration;

use kalpataru_core::error::KalpataruError;

/// Why a request did not produce a response body.
///
/// Everything except [`RequestError::Cancelled`] is a network failure from
/// the user's point of view and gets the same fallback message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RequestError::Cancelled)
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RequestError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RequestError::Status(status.as_u16())
        } else {
            RequestError::Transport(err.to_string())
        }
    }
}

impl From<RequestError> for KalpataruError {
    fn from(err: RequestError) -> Self {
        KalpataruError::Request(err.to_string())
    }
}
