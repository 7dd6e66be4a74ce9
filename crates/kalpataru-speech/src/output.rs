//! Speech output controller.
//!
//! At most one utterance is alive at any time. Toggling the handle that is
//! currently speaking stops it; toggling any other handle replaces the active
//! utterance. Playback runs on a spawned task that reports back through
//! [`Inner::finish`], which only clears the state if the finishing utterance
//! is still the active one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use kalpataru_core::events::{EventBus, SessionEvent};
use kalpataru_core::language::{speech_locale, strip_emoji};
use kalpataru_core::types::{Feature, HandleId, SpeechLocale};

use crate::error::SpeechError;
use crate::state::PlaybackState;

/// One synthesized playback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub locale: SpeechLocale,
}

/// Platform text-to-speech seam.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether speech synthesis exists on this platform.
    fn is_available(&self) -> bool;

    /// Speak `utterance`, resolving when playback ends or `cancel` fires.
    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError>;
}

/// What a call to [`SpeechOutputController::toggle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
    /// Nothing speakable was left after removing emoji.
    Ignored,
    /// No synthesizer on this platform.
    Unavailable,
}

struct ActiveUtterance {
    id: Uuid,
    handle: HandleId,
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
}

struct Inner {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    events: EventBus,
    active: Mutex<Option<ActiveUtterance>>,
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<ActiveUtterance>> {
        // The guarded value is a plain Option, valid even after a panic.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel `utterance` and announce that its handle stopped speaking.
    fn halt(&self, utterance: ActiveUtterance) {
        utterance.cancel.cancel();
        tracing::debug!(
            handle = %utterance.handle,
            elapsed_ms = (Utc::now() - utterance.started_at).num_milliseconds(),
            "Speech stopped"
        );
        self.events.emit(SessionEvent::SpeakingStateChanged {
            speaking: false,
            handle: utterance.handle,
        });
    }

    /// Called by the playback task when the synthesizer returns.
    fn finish(&self, id: Uuid, result: Result<(), SpeechError>) {
        let mut active = self.active();
        let finished = match active.take() {
            Some(current) if current.id == id => current,
            other => {
                // Replaced or stopped already; that path emitted the event.
                *active = other;
                return;
            }
        };

        let elapsed_ms = (Utc::now() - finished.started_at).num_milliseconds();
        match result {
            Ok(()) => tracing::debug!(handle = %finished.handle, elapsed_ms, "Speech finished"),
            Err(e) => tracing::warn!(handle = %finished.handle, error = %e, "Speech failed"),
        }
        self.events.emit(SessionEvent::SpeakingStateChanged {
            speaking: false,
            handle: finished.handle,
        });
    }
}

/// Reads bot turns aloud, one at a time.
///
/// Cheap to clone; clones share the same active utterance.
#[derive(Clone)]
pub struct SpeechOutputController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SpeechOutputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechOutputController")
            .field("state", &self.state())
            .field("active_handle", &self.active_handle())
            .finish()
    }
}

impl SpeechOutputController {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                synthesizer,
                events,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_active(self.inner.active().is_some())
    }

    /// Handle of the utterance currently speaking, if any.
    pub fn active_handle(&self) -> Option<HandleId> {
        self.inner.active().as_ref().map(|u| u.handle)
    }

    /// Start or stop reading `text` for the affordance `handle`.
    ///
    /// Must be called from within a Tokio runtime; playback runs on a
    /// spawned task.
    pub fn toggle(&self, text: &str, handle: HandleId) -> Result<ToggleOutcome, SpeechError> {
        let mut active = self.inner.active();

        if let Some(current) = active.take() {
            let same_handle = current.handle == handle;
            self.inner.halt(current);
            if same_handle {
                return Ok(ToggleOutcome::Stopped);
            }
        }

        if !self.inner.synthesizer.is_available() {
            tracing::warn!(%handle, "Speech synthesis is not available");
            self.inner.events.emit(SessionEvent::CapabilityMissing {
                feature: Feature::SpeechSynthesis,
            });
            return Ok(ToggleOutcome::Unavailable);
        }

        let spoken = strip_emoji(text);
        if spoken.trim().is_empty() {
            tracing::debug!(%handle, "Nothing to speak after removing emoji");
            return Ok(ToggleOutcome::Ignored);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpeechError::Backend(format!("no async runtime: {}", e)))?;

        let utterance = Utterance {
            locale: speech_locale(&spoken),
            text: spoken,
        };
        let current = ActiveUtterance {
            id: Uuid::new_v4(),
            handle,
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        };
        tracing::info!(
            %handle,
            utterance_id = %current.id,
            locale = %utterance.locale,
            chars = utterance.text.chars().count(),
            "Speech started"
        );

        let inner = Arc::clone(&self.inner);
        let id = current.id;
        let cancel = current.cancel.clone();
        // The task cannot observe `active` before this guard is released.
        runtime.spawn(async move {
            let result = inner.synthesizer.speak(&utterance, cancel).await;
            inner.finish(id, result);
        });

        *active = Some(current);
        self.inner.events.emit(SessionEvent::SpeakingStateChanged {
            speaking: true,
            handle,
        });
        Ok(ToggleOutcome::Started)
    }

    /// Force-cancel any active utterance. Returns whether one was speaking.
    pub fn stop_all(&self) -> bool {
        let mut active = self.inner.active();
        match active.take() {
            Some(current) => {
                self.inner.halt(current);
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
