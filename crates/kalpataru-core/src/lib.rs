pub mod config;
pub mod error;
pub mod events;
pub mod language;
pub mod types;

pub use config::KalpataruConfig;
pub use error::{KalpataruError, Result};
pub use events::{EventBus, SessionEvent};
pub use language::{detect_script_language, speech_locale, strip_emoji};
pub use types::*;
