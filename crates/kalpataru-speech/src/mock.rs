//! In-process speech seams for tests and headless runs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SpeechError;
use crate::input::{RecognitionOptions, SpeechRecognizer, Transcript};
use crate::output::{SpeechSynthesizer, Utterance};

/// Synthesizer that "plays" each utterance for a fixed duration.
#[derive(Debug)]
pub struct MockSynthesizer {
    available: bool,
    fail: bool,
    duration: Duration,
    spoken: Mutex<Vec<Utterance>>,
}

impl MockSynthesizer {
    pub fn new(duration: Duration) -> Self {
        Self {
            available: true,
            fail: false,
            duration,
            spoken: Mutex::new(Vec::new()),
        }
    }

    /// A platform without speech synthesis.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Every utterance fails immediately.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Utterances handed to the synthesizer so far.
    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(
        &self,
        utterance: &Utterance,
        cancel: CancellationToken,
    ) -> Result<(), SpeechError> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(utterance.clone());
        if self.fail {
            return Err(SpeechError::Backend("audio device unavailable".into()));
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(SpeechError::Aborted),
            _ = tokio::time::sleep(self.duration) => Ok(()),
        }
    }
}

/// Recognizer that replays scripted results after a fixed delay.
///
/// Sessions beyond the script end with [`SpeechError::NoSpeech`].
#[derive(Debug)]
pub struct MockRecognizer {
    available: bool,
    delay: Duration,
    script: Mutex<VecDeque<Result<Vec<Transcript>, SpeechError>>>,
    sessions: Mutex<Vec<RecognitionOptions>>,
}

impl MockRecognizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            available: true,
            delay,
            script: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// A platform without speech recognition.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Queue the outcome of the next session.
    pub fn push_result(&self, result: Result<Vec<Transcript>, SpeechError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Options of every session started so far.
    pub fn sessions(&self) -> Vec<RecognitionOptions> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SpeechRecognizer for MockRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(
        &self,
        options: &RecognitionOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<Transcript>, SpeechError> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options.clone());
        tokio::select! {
            _ = cancel.cancelled() => return Err(SpeechError::Aborted),
            _ = tokio::time::sleep(self.delay) => {}
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Err(SpeechError::NoSpeech))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kalpataru_core::types::SpeechLocale;

    #[tokio::test]
    async fn test_mock_synthesizer_records_and_cancels() {
        let synth = MockSynthesizer::new(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let utterance = Utterance {
            text: "hello".into(),
            locale: SpeechLocale::EnglishIndia,
        };
        assert_eq!(synth.speak(&utterance, cancel).await, Err(SpeechError::Aborted));
        assert_eq!(synth.spoken(), vec![utterance]);
    }

    #[tokio::test]
    async fn test_mock_recognizer_replays_script_then_no_speech() {
        let recognizer = MockRecognizer::new(Duration::ZERO);
        recognizer.push_result(Ok(vec![Transcript::new("rain tomorrow?", 0.7)]));
        let opts = RecognitionOptions::single_shot("en-IN");

        let first = recognizer.recognize(&opts, CancellationToken::new()).await;
        assert_eq!(first.unwrap()[0].text, "rain tomorrow?");
        let second = recognizer.recognize(&opts, CancellationToken::new()).await;
        assert_eq!(second, Err(SpeechError::NoSpeech));
        assert_eq!(recognizer.sessions().len(), 2);
    }
}
