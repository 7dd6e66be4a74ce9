//! One step of the chat loop: act on a parsed command.
//!
//! Submissions run on their own tasks so `/stop` is read while they wait.
//! No command ends the loop except `/quit`; failures are logged or printed.

use std::ops::ControlFlow;
use std::sync::Arc;

use kalpataru_chat::SessionManager;
use kalpataru_client::Attachment;
use kalpataru_speech::SpeechInputController;

use crate::cli::expand_home;
use crate::console::{format_turn, Command, HELP};

/// Read an attachment named on the command line.
///
/// A missing path is passed through as "nothing picked".
pub async fn pick(path: Option<String>) -> Option<Attachment> {
    let path = path?;
    match Attachment::from_path(&expand_home(&path)).await {
        Ok(file) => Some(file),
        Err(e) => {
            println!("Could not read {}: {}", path, e);
            None
        }
    }
}

/// Like [`pick`], but only images count as picked.
pub async fn pick_image(path: Option<String>) -> Option<Attachment> {
    let file = pick(path).await?;
    if !file.is_image() {
        println!("{} is not an image ({})", file.file_name, file.mime_type);
        return None;
    }
    Some(file)
}

pub fn print_history(session: &SessionManager) {
    let turns = session.history();
    if turns.is_empty() {
        println!("No conversation yet.");
    }
    for (index, turn) in turns.iter().enumerate() {
        println!("{}", format_turn(index, turn));
    }
}

pub fn dispatch(
    session: &Arc<SessionManager>,
    speech_in: &SpeechInputController,
    command: Command,
) -> ControlFlow<()> {
    match command {
        Command::Say(text) => {
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Err(e) = session.submit_text(&text).await {
                    tracing::error!(error = %e, "Message could not be recorded");
                }
            });
        }
        Command::Image(path) => {
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Err(e) = session.submit_image(pick_image(path).await).await {
                    tracing::error!(error = %e, "Image could not be recorded");
                }
            });
        }
        Command::File(path) => {
            let session = Arc::clone(session);
            tokio::spawn(async move {
                if let Err(e) = session.submit_file(pick(path).await).await {
                    tracing::error!(error = %e, "Upload could not be recorded");
                }
            });
        }
        Command::Stop => {
            speech_in.cancel();
            if let Err(e) = session.stop_all() {
                tracing::error!(error = %e, "Stop could not be recorded");
            }
        }
        Command::Hear(handle) => {
            if let Err(e) = session.listen(handle) {
                println!("{}", e);
            }
        }
        Command::Voice => {
            if !speech_in.cancel() {
                if let Err(e) = speech_in.start() {
                    tracing::debug!(error = %e, "Listening not started");
                }
            }
        }
        Command::History => print_history(session),
        Command::Clear => {
            if let Err(e) = session.clear_history() {
                tracing::error!(error = %e, "History could not be cleared");
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return ControlFlow::Break(()),
        Command::Unknown(input) => println!("Unknown command: {} (try /help)", input),
    }
    ControlFlow::Continue(())
}
