//! Error types for the chat session.

use kalpataru_core::error::KalpataruError;
use kalpataru_core::types::HandleId;
use kalpataru_speech::SpeechError;

/// Errors surfaced by the session manager.
///
/// Request failures never appear here; they become fallback turns.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("no bot turn for listen handle {0}")]
    NoSuchTurn(HandleId),
    #[error("speech error: {0}")]
    SpeechError(#[from] SpeechError),
}

impl From<KalpataruError> for ChatError {
    fn from(err: KalpataruError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}
