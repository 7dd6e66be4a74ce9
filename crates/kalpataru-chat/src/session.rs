//! Session manager: turns user intents into ordered turns and requests.
//!
//! At most one cancelable request (chat or diagnose) is pending at a time,
//! tracked by a single [`RequestToken`]. What happens when a second one is
//! submitted is decided by the configured [`RequestPolicy`]. Uploads are not
//! cancelable and never take the token.
//!
//! Request failures become fixed fallback turns. A cancelled request appends
//! nothing; [`SessionManager::stop_all`] announces the stop itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kalpataru_client::{Attachment, ChatRequest, RequestChannel, RequestError, RequestToken};
use kalpataru_core::config::RequestPolicy;
use kalpataru_core::events::{EventBus, SessionEvent};
use kalpataru_core::language::{detect_script_language, strip_emoji};
use kalpataru_core::types::{HandleId, Turn};
use kalpataru_speech::{SpeechOutputController, ToggleOutcome};
use kalpataru_storage::HistoryStore;

use crate::error::ChatError;

/// Bot turn appended when a chat request fails.
pub const CHAT_FALLBACK: &str = "⚠️ Error: Cannot connect to server.";
/// Bot turn appended when a diagnosis request fails.
pub const DIAGNOSE_FALLBACK: &str = "⚠️ Error: Could not process the image.";
/// Bot turn appended when an upload fails.
pub const UPLOAD_FALLBACK: &str = "⚠️ Error: Could not upload the file.";
/// Bot turn appended by [`SessionManager::stop_all`].
pub const STOPPED_NOTICE: &str = "⏹ Generation stopped by user.";

/// How a submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to send; no turn, no request.
    Ignored,
    /// Another request is pending and the policy is `reject`.
    Busy,
    /// The backend answered; its text is the newest bot turn.
    Answered,
    /// The request failed; a fallback bot turn was appended.
    Failed,
    /// The request was cancelled; no turn was appended.
    Cancelled,
}

/// Coordinates history, requests and speech for one conversation.
///
/// Share it behind an `Arc`; every operation takes `&self`, so `stop_all`
/// can run while a submission is awaiting the backend.
pub struct SessionManager {
    history: HistoryStore,
    channel: RequestChannel,
    speech: SpeechOutputController,
    events: EventBus,
    policy: RequestPolicy,
    pending: Mutex<Option<RequestToken>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("history", &self.history)
            .field("channel", &self.channel)
            .field("speech", &self.speech)
            .field("policy", &self.policy)
            .field("request_pending", &self.is_request_pending())
            .finish()
    }
}

impl SessionManager {
    pub fn new(
        history: HistoryStore,
        channel: RequestChannel,
        speech: SpeechOutputController,
        events: EventBus,
        policy: RequestPolicy,
    ) -> Self {
        Self {
            history,
            channel,
            speech,
            events,
            policy,
            pending: Mutex::new(None),
        }
    }

    // -------------------------------------------------------------------------
    // Submissions
    // -------------------------------------------------------------------------

    /// Send a text message to the assistant.
    pub async fn submit_text(&self, message: &str) -> Result<SubmitOutcome, ChatError> {
        let cleaned = strip_emoji(message);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            debug!("Ignoring empty message");
            return Ok(SubmitOutcome::Ignored);
        }

        let Some(token) = self.acquire_token() else {
            return Ok(SubmitOutcome::Busy);
        };

        let request = ChatRequest {
            message: cleaned.to_string(),
            language: detect_script_language(cleaned),
        };
        info!(
            request_id = %token.id(),
            language = %request.language,
            chars = cleaned.chars().count(),
            "Submitting message"
        );

        if let Err(e) = self.history.append(Turn::user(cleaned)) {
            self.release_token(&token);
            return Err(e.into());
        }

        let result = self.channel.chat(&token, &request).await;
        self.release_token(&token);
        self.settle(Some(&token), result, CHAT_FALLBACK)
    }

    /// Send a crop image for disease diagnosis.
    ///
    /// `None` means the user confirmed the picker without choosing a file.
    pub async fn submit_image(&self, image: Option<Attachment>) -> Result<SubmitOutcome, ChatError> {
        let Some(image) = image else {
            debug!("No image selected");
            return Ok(SubmitOutcome::Ignored);
        };

        let Some(token) = self.acquire_token() else {
            return Ok(SubmitOutcome::Busy);
        };

        info!(request_id = %token.id(), file = %image.file_name, size = image.size(), "Submitting image");
        self.events.emit(SessionEvent::ImagePreview {
            file_name: image.file_name.clone(),
            mime_type: image.mime_type.clone(),
            size: image.size(),
        });

        let result = self.channel.diagnose(&token, &image).await;
        self.release_token(&token);
        self.settle(Some(&token), result, DIAGNOSE_FALLBACK)
    }

    /// Upload a document. Not cancelable and independent of the pending token.
    pub async fn submit_file(&self, file: Option<Attachment>) -> Result<SubmitOutcome, ChatError> {
        let Some(file) = file else {
            debug!("No file selected");
            return Ok(SubmitOutcome::Ignored);
        };

        info!(file = %file.file_name, size = file.size(), "Uploading file");
        self.history
            .append(Turn::user(format!("[📂 File uploaded: {}]", file.file_name)))?;

        let result = self.channel.upload(&file).await;
        self.settle(None, result, UPLOAD_FALLBACK)
    }

    /// Stop everything in flight and say so in the conversation.
    pub fn stop_all(&self) -> Result<(), ChatError> {
        if let Some(token) = self.pending().take() {
            token.cancel();
            info!(request_id = %token.id(), "Pending request cancelled by user");
        }
        if self.speech.stop_all() {
            debug!("Speech output stopped by user");
        }
        self.history.append(Turn::bot(STOPPED_NOTICE))?;
        Ok(())
    }

    /// Toggle reading aloud the bot turn at `handle`.
    pub fn listen(&self, handle: HandleId) -> Result<ToggleOutcome, ChatError> {
        let turn = self
            .history
            .get(handle.0)
            .filter(Turn::is_bot)
            .ok_or(ChatError::NoSuchTurn(handle))?;
        Ok(self.speech.toggle(&turn.text, handle)?)
    }

    /// Submit every transcript arriving on `transcripts` as a text message.
    ///
    /// The task ends when the sending side is dropped.
    pub fn spawn_transcript_pump(
        self: &Arc<Self>,
        mut transcripts: mpsc::UnboundedReceiver<String>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(text) = transcripts.recv().await {
                debug!(chars = text.chars().count(), "Transcript received");
                match session.submit_text(&text).await {
                    Ok(outcome) => debug!(?outcome, "Transcript submitted"),
                    Err(e) => warn!(error = %e, "Failed to submit transcript"),
                }
            }
            debug!("Transcript pump finished");
        })
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn history(&self) -> Vec<Turn> {
        self.history.turns()
    }

    pub fn clear_history(&self) -> Result<(), ChatError> {
        self.history.clear()?;
        Ok(())
    }

    pub fn is_request_pending(&self) -> bool {
        self.pending().is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn speech(&self) -> &SpeechOutputController {
        &self.speech
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn pending(&self) -> MutexGuard<'_, Option<RequestToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the single pending-request slot, honouring the policy.
    ///
    /// Returns `None` when the submission must be refused.
    fn acquire_token(&self) -> Option<RequestToken> {
        let mut pending = self.pending();
        if let Some(current) = pending.as_ref() {
            match self.policy {
                RequestPolicy::Reject => {
                    info!(pending_id = %current.id(), "Request already pending, submission refused");
                    self.events.emit(SessionEvent::RequestBusy);
                    return None;
                }
                RequestPolicy::Replace => {
                    info!(pending_id = %current.id(), "Replacing pending request");
                    current.cancel();
                }
            }
        }
        let token = RequestToken::new();
        *pending = Some(token.clone());
        Some(token)
    }

    /// Clear the slot, unless a newer request has taken it since.
    fn release_token(&self, token: &RequestToken) {
        let mut pending = self.pending();
        if pending.as_ref().is_some_and(|t| t.id() == token.id()) {
            *pending = None;
        }
    }

    fn settle(
        &self,
        token: Option<&RequestToken>,
        result: Result<String, RequestError>,
        fallback: &str,
    ) -> Result<SubmitOutcome, ChatError> {
        // A stop that lands after the response arrived still wins.
        let cancelled = token.is_some_and(RequestToken::is_cancelled);
        match result {
            Err(e) if e.is_cancelled() => Ok(SubmitOutcome::Cancelled),
            _ if cancelled => {
                debug!("Response discarded after cancellation");
                Ok(SubmitOutcome::Cancelled)
            }
            Ok(text) => {
                self.history.append(Turn::bot(text))?;
                Ok(SubmitOutcome::Answered)
            }
            Err(e) => {
                warn!(error = %e, "Request failed, appending fallback");
                self.history.append(Turn::bot(fallback))?;
                Ok(SubmitOutcome::Failed)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
