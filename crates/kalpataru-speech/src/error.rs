use thiserror::Error;

use kalpataru_core::error::KalpataruError;
use kalpataru_core::types::Feature;

/// Failures of the speech seams and controllers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("{0} is not available")]
    CapabilityMissing(Feature),

    #[error("No speech was detected")]
    NoSpeech,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Speech session aborted")]
    Aborted,

    #[error("Speech backend error: {0}")]
    Backend(String),
}

impl From<SpeechError> for KalpataruError {
    fn from(err: SpeechError) -> Self {
        KalpataruError::Speech(err.to_string())
    }
}
