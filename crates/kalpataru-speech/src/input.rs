//! Speech input controller.
//!
//! Runs one single-shot recognition session at a time. The best non-empty
//! transcript of a finished session is sent over an unbounded channel to
//! whoever submits text on the user's behalf.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use kalpataru_core::events::{EventBus, SessionEvent};
use kalpataru_core::types::Feature;

use crate::error::SpeechError;
use crate::state::ListenState;

/// Settings handed to the recognizer for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    /// BCP 47 locale, e.g. `en-IN`.
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognitionOptions {
    /// One utterance, final results only.
    pub fn single_shot(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            continuous: false,
            interim_results: false,
        }
    }
}

/// One recognition alternative.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Recognizer confidence in `0.0..=1.0`.
    pub confidence: f32,
}

impl Transcript {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Platform speech-to-text seam.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether speech recognition exists on this platform.
    fn is_available(&self) -> bool;

    /// Listen for one utterance and return its alternatives.
    ///
    /// Resolves with [`SpeechError::Aborted`] once `cancel` fires.
    async fn recognize(
        &self,
        options: &RecognitionOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<Transcript>, SpeechError>;
}

/// Result of [`SpeechInputController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running; nothing changed.
    AlreadyListening,
}

/// Highest-confidence alternative with non-blank text, trimmed.
fn best_transcript(alternatives: &[Transcript]) -> Option<String> {
    alternatives
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map(|t| t.text.trim().to_string())
}

struct ListeningSession {
    id: Uuid,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

struct Inner {
    recognizer: Arc<dyn SpeechRecognizer>,
    events: EventBus,
    options: RecognitionOptions,
    transcripts: mpsc::UnboundedSender<String>,
    active: Mutex<Option<ListeningSession>>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<ListeningSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, id: Uuid, result: Result<Vec<Transcript>, SpeechError>) {
        let mut active = self.active();
        let session = match active.take() {
            Some(current) if current.id == id => current,
            other => {
                *active = other;
                return;
            }
        };
        let elapsed_ms = (Utc::now() - session.started_at).num_milliseconds();

        match result {
            Ok(alternatives) => match best_transcript(&alternatives) {
                Some(text) => {
                    tracing::info!(
                        session_id = %session.id,
                        elapsed_ms,
                        chars = text.chars().count(),
                        "Speech recognized"
                    );
                    if self.transcripts.send(text).is_err() {
                        tracing::warn!(session_id = %session.id, "Transcript receiver dropped");
                    }
                }
                None => tracing::info!(session_id = %session.id, elapsed_ms, "No usable transcript"),
            },
            Err(SpeechError::Aborted) => {
                tracing::debug!(session_id = %session.id, "Recognition aborted")
            }
            Err(SpeechError::NoSpeech) => {
                tracing::info!(session_id = %session.id, elapsed_ms, "No speech detected")
            }
            Err(e) => tracing::warn!(session_id = %session.id, error = %e, "Recognition failed"),
        }

        self.events
            .emit(SessionEvent::ListeningStateChanged { listening: false });
    }
}

/// Drives single-shot speech recognition sessions.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SpeechInputController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SpeechInputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechInputController")
            .field("state", &self.state())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl SpeechInputController {
    /// Create a controller recognizing in `locale`.
    ///
    /// The returned receiver yields one string per successful session.
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        events: EventBus,
        locale: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            inner: Arc::new(Inner {
                recognizer,
                events,
                options: RecognitionOptions::single_shot(locale),
                transcripts: tx,
                active: Mutex::new(None),
            }),
        };
        (controller, rx)
    }

    pub fn state(&self) -> ListenState {
        ListenState::from_active(self.inner.active().is_some())
    }

    pub fn options(&self) -> &RecognitionOptions {
        &self.inner.options
    }

    /// Begin listening.
    ///
    /// A missing recognizer is reported as a `CapabilityMissing` event and an
    /// error. Calling this while a session is running changes nothing.
    pub fn start(&self) -> Result<StartOutcome, SpeechError> {
        if !self.inner.recognizer.is_available() {
            tracing::warn!("Speech recognition is not available");
            self.inner.events.emit(SessionEvent::CapabilityMissing {
                feature: Feature::SpeechRecognition,
            });
            return Err(SpeechError::CapabilityMissing(Feature::SpeechRecognition));
        }

        let mut active = self.inner.active();
        if let Some(session) = active.as_ref() {
            tracing::debug!(session_id = %session.id, "Already listening");
            return Ok(StartOutcome::AlreadyListening);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpeechError::Backend(format!("no async runtime: {}", e)))?;

        let session = ListeningSession {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        };
        tracing::info!(
            session_id = %session.id,
            locale = %self.inner.options.locale,
            "Listening started"
        );

        let inner = Arc::clone(&self.inner);
        let id = session.id;
        let cancel = session.cancel.clone();
        runtime.spawn(async move {
            let result = inner.recognizer.recognize(&inner.options, cancel).await;
            inner.finish(id, result);
        });

        *active = Some(session);
        self.inner
            .events
            .emit(SessionEvent::ListeningStateChanged { listening: true });
        Ok(StartOutcome::Started)
    }

    /// Abort the running session without producing a transcript.
    ///
    /// Returns whether a session was running.
    pub fn cancel(&self) -> bool {
        let mut active = self.inner.active();
        let Some(session) = active.take() else {
            return false;
        };
        session.cancel.cancel();
        tracing::info!(session_id = %session.id, "Listening cancelled");
        self.inner
            .events
            .emit(SessionEvent::ListeningStateChanged { listening: false });
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
