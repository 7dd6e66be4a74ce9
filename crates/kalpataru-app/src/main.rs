//! Kalpataru terminal client.
//!
//! Wires configuration, storage, the HTTP backend and the speech seams into a
//! `SessionManager`, then runs a line-oriented chat on stdin/stdout.

mod cli;
mod console;
mod repl;

use std::ops::ControlFlow;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use kalpataru_chat::SessionManager;
use kalpataru_client::{HttpBackend, RequestChannel};
use kalpataru_core::config::KalpataruConfig;
use kalpataru_core::events::{EventBus, SessionEvent};
use kalpataru_speech::{SpeechInputController, SpeechOutputController};
use kalpataru_storage::{Database, HistoryStore};

use cli::{expand_home, CliArgs};
use console::{parse_command, render_event, ConsoleSynthesizer, TerminalRecognizer};
use repl::{dispatch, print_history};

/// Print every session event as it arrives.
async fn render_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(line) = render_event(&event) {
                    println!("{}", line);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let mut config = KalpataruConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing goes to stderr so it never interleaves with the chat.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Kalpataru v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let db_path = expand_home(&config.general.data_dir).join(&config.history.db_file);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    let events = EventBus::default();
    let history = HistoryStore::open(db, config.history.storage_key.clone(), events.clone());

    // Backend.
    let backend = Arc::new(HttpBackend::new(config.backend.base_url.clone())?);
    let base_url = backend.base_url().to_string();
    let channel = RequestChannel::new(backend, config.backend.timeout());
    tracing::info!(base_url = %base_url, timeout_secs = channel.timeout().as_secs(), "Backend configured");

    // Speech.
    let speech_out = SpeechOutputController::new(Arc::new(ConsoleSynthesizer), events.clone());
    let (speech_in, transcripts) = SpeechInputController::new(
        Arc::new(TerminalRecognizer),
        events.clone(),
        config.speech.recognition_locale.clone(),
    );
    tracing::debug!(locale = %speech_in.options().locale, "Speech recognition configured");

    let session = Arc::new(SessionManager::new(
        history,
        channel,
        speech_out,
        events.clone(),
        config.session.request_policy,
    ));
    let pump = session.spawn_transcript_pump(transcripts);
    let renderer = tokio::spawn(render_events(events.subscribe()));

    println!("🌳 Kalpataru. Type /help for commands.");
    print_history(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let ControlFlow::Break(()) = dispatch(&session, &speech_in, parse_command(&line)) {
            break;
        }
    }

    session.speech().stop_all();
    drop(speech_in);
    pump.abort();
    renderer.abort();
    tracing::info!("Kalpataru stopped");
    Ok(())
}
