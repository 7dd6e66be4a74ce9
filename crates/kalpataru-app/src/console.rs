//! Terminal presentation: speech seams, command parsing and event rendering.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use kalpataru_core::events::SessionEvent;
use kalpataru_core::types::{Feature, HandleId, Sender, Turn};
use kalpataru_speech::{
    RecognitionOptions, SpeechError, SpeechRecognizer, SpeechSynthesizer, Transcript, Utterance,
};

/// Reading pace used to simulate playback length.
const MILLIS_PER_WORD: u64 = 250;

/// "Speaks" by printing the utterance, then holds for its reading time.
#[derive(Debug, Default)]
pub struct ConsoleSynthesizer;

#[async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    fn is_available(&self) -> bool {
        true
    }

    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError> {
        println!("🔊 ({}) {}", utterance.locale, utterance.text);
        let words = utterance.text.split_whitespace().count() as u64;
        tokio::select! {
            _ = cancel.cancelled() => Err(SpeechError::Aborted),
            _ = tokio::time::sleep(Duration::from_millis(words * MILLIS_PER_WORD)) => Ok(()),
        }
    }
}

/// A terminal has no microphone access.
#[derive(Debug, Default)]
pub struct TerminalRecognizer;

#[async_trait]
impl SpeechRecognizer for TerminalRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    async fn recognize(
        &self,
        _options: &RecognitionOptions,
        _cancel: CancellationToken,
    ) -> Result<Vec<Transcript>, SpeechError> {
        Err(SpeechError::CapabilityMissing(Feature::SpeechRecognition))
    }
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    /// `/image [path]`; no path means nothing was picked.
    Image(Option<String>),
    /// `/file [path]`
    File(Option<String>),
    Stop,
    Hear(HandleId),
    Voice,
    History,
    Clear,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    match name {
        "image" | "img" => Command::Image(arg),
        "file" | "upload" => Command::File(arg),
        "stop" => Command::Stop,
        "hear" | "listen" => match arg.as_deref().map(str::parse::<usize>) {
            Some(Ok(n)) => Command::Hear(HandleId(n)),
            _ => Command::Unknown(line.to_string()),
        },
        "voice" | "mic" => Command::Voice,
        "history" => Command::History,
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

pub const HELP: &str = "\
Type a question and press Enter. Commands:
  /image <path>   diagnose a crop image
  /file <path>    upload a document
  /hear <n>       read answer n aloud (again to stop)
  /voice          ask by voice
  /stop           stop the pending answer and any speech
  /history        show the conversation
  /clear          forget the conversation
  /quit           leave";

pub fn format_turn(index: usize, turn: &Turn) -> String {
    match turn.sender {
        Sender::User => format!("[{}] 👨‍🌾 You: {}", index, turn.text),
        Sender::Bot => format!("[{}] 🤖 Kalpataru: {}  (/hear {})", index, turn.text, index),
    }
}

/// Text to print for an event, if any.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::TurnAppended { index, turn } => format_turn(*index, turn),
        SessionEvent::HistoryCleared => "History cleared.".to_string(),
        SessionEvent::ImagePreview {
            file_name,
            mime_type,
            size,
        } => format!("👨‍🌾 You: 🖼 {} ({}, {} bytes) Image uploaded ✅", file_name, mime_type, size),
        SessionEvent::RequestBusy => {
            "⏳ Still waiting for the previous answer. Use /stop to cancel it.".to_string()
        }
        SessionEvent::ListeningStateChanged { listening: true } => "🎙️ Listening...".to_string(),
        SessionEvent::ListeningStateChanged { listening: false } => "🎤".to_string(),
        SessionEvent::SpeakingStateChanged {
            speaking: true,
            handle,
        } => format!("⏹ Stop ({})", handle),
        SessionEvent::SpeakingStateChanged {
            speaking: false, ..
        } => return None,
        SessionEvent::CapabilityMissing { feature } => {
            format!("Your system does not support {}.", feature)
        }
        _ => return None,
    };
    Some(line)
}
