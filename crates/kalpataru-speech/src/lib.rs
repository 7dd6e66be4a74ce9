//! Kalpataru Speech crate - spoken output and spoken input for the chat session.
//!
//! Two independent controllers sit on top of platform seams:
//! - `SpeechOutputController` reads bot turns aloud through a `SpeechSynthesizer`,
//!   keeping at most one utterance alive at a time.
//! - `SpeechInputController` runs single-shot recognition sessions through a
//!   `SpeechRecognizer` and forwards the best transcript over a channel.
//!
//! Both publish their state changes on the shared `EventBus`.

pub mod error;
pub mod input;
pub mod mock;
pub mod output;
pub mod state;

pub use error::SpeechError;
pub use input::{RecognitionOptions, SpeechInputController, SpeechRecognizer, StartOutcome, Transcript};
pub use mock::{MockRecognizer, MockSynthesizer};
pub use output::{SpeechOutputController, SpeechSynthesizer, ToggleOutcome, Utterance};
pub use state::{ListenState, PlaybackState};
