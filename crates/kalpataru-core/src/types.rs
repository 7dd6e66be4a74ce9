//! Shared domain types used across all Kalpataru crates.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Conversation turns
// =============================================================================

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// One recorded message in the conversation.
///
/// Serialized as `{"sender": "user"|"bot", "text": "..."}`, which is also the
/// persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub sender: Sender,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }
}

// =============================================================================
// Language
// =============================================================================

/// Fine-grained language tag derived from the script of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageTag {
    #[serde(rename = "hi")]
    Hindi,
    #[serde(rename = "bn")]
    Bengali,
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "th")]
    Thai,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ru")]
    Russian,
    #[serde(rename = "ar")]
    Arabic,
    #[default]
    #[serde(rename = "en")]
    English,
}

impl LanguageTag {
    /// ISO 639-1 code sent to the backend.
    pub fn code(&self) -> &'static str {
        match self {
            LanguageTag::Hindi => "hi",
            LanguageTag::Bengali => "bn",
            LanguageTag::Tamil => "ta",
            LanguageTag::Thai => "th",
            LanguageTag::Chinese => "zh",
            LanguageTag::Russian => "ru",
            LanguageTag::Arabic => "ar",
            LanguageTag::English => "en",
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Coarse locale used to pick a speech-synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeechLocale {
    #[serde(rename = "en-IN")]
    EnglishIndia,
    #[serde(rename = "hi-IN")]
    HindiIndia,
}

impl SpeechLocale {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechLocale::EnglishIndia => "en-IN",
            SpeechLocale::HindiIndia => "hi-IN",
        }
    }
}

impl fmt::Display for SpeechLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Platform capabilities and presentation handles
// =============================================================================

/// Platform features the presentation layer may be told are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    SpeechRecognition,
    SpeechSynthesis,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::SpeechRecognition => write!(f, "speech recognition"),
            Feature::SpeechSynthesis => write!(f, "speech synthesis"),
        }
    }
}

/// Identifies one "listen" affordance in the presentation layer.
///
/// The value is the index of the bot turn the affordance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub usize);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
