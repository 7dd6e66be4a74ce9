//! Kalpataru Chat crate - the session manager that ties the client together.
//!
//! `SessionManager` turns user intents (send text, send image, upload file,
//! stop, listen) into ordered turns in the `HistoryStore`, requests through
//! the `RequestChannel`, and speech through the `SpeechOutputController`.

pub mod error;
pub mod session;

pub use error::ChatError;
pub use session::{
    SessionManager, SubmitOutcome, CHAT_FALLBACK, DIAGNOSE_FALLBACK, STOPPED_NOTICE,
    UPLOAD_FALLBACK,
};
