//! End-to-end session tests against a mock HTTP backend and an on-disk
//! database.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kalpataru_chat::{SessionManager, SubmitOutcome, CHAT_FALLBACK, STOPPED_NOTICE};
use kalpataru_client::{HttpBackend, RequestChannel};
use kalpataru_core::config::RequestPolicy;
use kalpataru_core::events::{EventBus, SessionEvent};
use kalpataru_core::types::Turn;
use kalpataru_speech::{MockSynthesizer, SpeechOutputController};
use kalpataru_storage::{Database, HistoryStore};

struct Fixture {
    session: Arc<SessionManager>,
    _dir: TempDir,
}

fn open_session(server_uri: &str, dir: &TempDir, policy: RequestPolicy) -> Arc<SessionManager> {
    let events = EventBus::default();
    let db = Arc::new(Database::new(&dir.path().join("kalpataru.db")).unwrap());
    let history = HistoryStore::open(db, "chatHistory", events.clone());
    let backend = Arc::new(HttpBackend::new(server_uri).unwrap());
    let channel = RequestChannel::new(backend, Duration::from_secs(10));
    let speech = SpeechOutputController::new(
        Arc::new(MockSynthesizer::new(Duration::from_millis(10))),
        events.clone(),
    );
    Arc::new(SessionManager::new(history, channel, speech, events, policy))
}

fn fixture(server_uri: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    Fixture {
        session: open_session(server_uri, &dir, RequestPolicy::Reject),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_question_and_answer_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"message": "How do I treat wheat rust?", "language": "en"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "Apply fungicide X"})))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server.uri());
    let mut events = f.session.subscribe();

    let outcome = f.session.submit_text("How do I treat wheat rust?").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Answered);
    assert_eq!(
        f.session.history(),
        vec![
            Turn::user("How do I treat wheat rust?"),
            Turn::bot("Apply fungicide X")
        ]
    );

    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::TurnAppended {
            index: 0,
            turn: Turn::user("How do I treat wheat rust?")
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::TurnAppended {
            index: 1,
            turn: Turn::bot("Apply fungicide X")
        }
    );
}

#[tokio::test]
async fn test_stop_before_answer_leaves_one_stop_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"answer": "too late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let f = fixture(&server.uri());
    let task = {
        let session = Arc::clone(&f.session);
        tokio::spawn(async move { session.submit_text("Will it rain?").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    f.session.stop_all().unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("stop should not wait for the server")
        .unwrap()
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::Cancelled);
    assert!(!f.session.is_request_pending());
    assert_eq!(
        f.session.history(),
        vec![Turn::user("Will it rain?"), Turn::bot(STOPPED_NOTICE)]
    );
}

#[tokio::test]
async fn test_blank_message_and_missing_image_send_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let f = fixture(&server.uri());
    assert_eq!(f.session.submit_text("   ").await.unwrap(), SubmitOutcome::Ignored);
    assert_eq!(f.session.submit_image(None).await.unwrap(), SubmitOutcome::Ignored);
    assert!(f.session.history().is_empty());
}

#[tokio::test]
async fn test_server_error_becomes_fallback_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let f = fixture(&server.uri());
    assert_eq!(f.session.submit_text("hello").await.unwrap(), SubmitOutcome::Failed);
    assert_eq!(f.session.history()[1], Turn::bot(CHAT_FALLBACK));
}

#[tokio::test]
async fn test_second_submission_is_refused_while_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"answer": "first answer"}))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture(&server.uri());
    let first = {
        let session = Arc::clone(&f.session);
        tokio::spawn(async move { session.submit_text("first").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(f.session.submit_text("second").await.unwrap(), SubmitOutcome::Busy);
    assert_eq!(first.await.unwrap().unwrap(), SubmitOutcome::Answered);
    assert_eq!(
        f.session.history(),
        vec![Turn::user("first"), Turn::bot("first answer")]
    );
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"answer": "Sow in June"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    {
        let session = open_session(&server.uri(), &dir, RequestPolicy::Reject);
        session.submit_text("When to sow rice?").await.unwrap();
        session.stop_all().unwrap();
    }

    let reopened = open_session(&server.uri(), &dir, RequestPolicy::Reject);
    assert_eq!(
        reopened.history(),
        vec![
            Turn::user("When to sow rice?"),
            Turn::bot("Sow in June"),
            Turn::bot(STOPPED_NOTICE)
        ]
    );
}
