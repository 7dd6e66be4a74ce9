//! Cancelable request channel.
//!
//! Every cancelable call is raced against its [`RequestToken`] and the
//! configured timeout. Cancellation wins ties, so a call cancelled before or
//! during flight always resolves to [`RequestError::Cancelled`]. The channel
//! never clears the caller's token; whoever owns the token decides when it is
//! no longer pending.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::attachment::Attachment;
use crate::backend::{Backend, ChatRequest};
use crate::error::RequestError;
use crate::token::RequestToken;

pub struct RequestChannel {
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl RequestChannel {
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a chat message; cancelable through `token`.
    pub async fn chat(
        &self,
        token: &RequestToken,
        request: &ChatRequest,
    ) -> Result<String, RequestError> {
        self.cancelable(token, "chat", self.backend.chat(request))
            .await
    }

    /// Send an image for disease diagnosis; cancelable through `token`.
    pub async fn diagnose(
        &self,
        token: &RequestToken,
        image: &Attachment,
    ) -> Result<String, RequestError> {
        self.cancelable(token, "diagnose", self.backend.diagnose(image))
            .await
    }

    /// Upload a file. Not cancelable; bounded only by the timeout.
    pub async fn upload(&self, file: &Attachment) -> Result<String, RequestError> {
        let started = Instant::now();
        let result = self.bounded(self.backend.upload(file)).await;
        log_outcome("upload", None, started, &result);
        result
    }

    async fn cancelable<T, F>(
        &self,
        token: &RequestToken,
        endpoint: &'static str,
        call: F,
    ) -> Result<T, RequestError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        if token.is_cancelled() {
            debug!(request_id = %token.id(), endpoint, "Request cancelled before sending");
            return Err(RequestError::Cancelled);
        }

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(RequestError::Cancelled),
            result = self.bounded(call) => result,
        };
        log_outcome(endpoint, Some(token), started, &result);
        result
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, RequestError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(RequestError::Timeout(self.timeout)))
    }
}

impl std::fmt::Debug for RequestChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestChannel")
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn log_outcome<T>(
    endpoint: &'static str,
    token: Option<&RequestToken>,
    started: Instant,
    result: &Result<T, RequestError>,
) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let request_id = token.map(|t| t.id().to_string()).unwrap_or_default();
    match result {
        Ok(_) => info!(endpoint, request_id = %request_id, elapsed_ms, "Request completed"),
        Err(e) if e.is_cancelled() => {
            info!(endpoint, request_id = %request_id, elapsed_ms, "Request cancelled")
        }
        Err(e) => warn!(endpoint, request_id = %request_id, elapsed_ms, error = %e, "Request failed"),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kalpataru_core::types::LanguageTag;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend that answers after a fixed delay.
    struct SlowBackend {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowBackend {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Backend for SlowBackend {
        async fn chat(&self, request: &ChatRequest) -> Result<String, RequestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(format!("echo {} ({})", request.message, request.language))
        }

        async fn diagnose(&self, image: &Attachment) -> Result<String, RequestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(format!("report for {}", image.file_name))
        }

        async fn upload(&self, file: &Attachment) -> Result<String, RequestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(format!("stored {}", file.file_name))
        }
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            language: LanguageTag::English,
        }
    }

    #[tokio::test]
    async fn test_chat_success() {
        let backend = SlowBackend::new(Duration::ZERO);
        let channel = RequestChannel::new(backend.clone(), Duration::from_secs(5));
        let token = RequestToken::new();

        let answer = channel.chat(&token, &request("hello")).await.unwrap();
        assert_eq!(answer, "echo hello (en)");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_send_skips_backend() {
        let backend = SlowBackend::new(Duration::ZERO);
        let channel = RequestChannel::new(backend.clone(), Duration::from_secs(5));
        let token = RequestToken::new();
        token.cancel();

        let result = channel.chat(&token, &request("hello")).await;
        assert_eq!(result, Err(RequestError::Cancelled));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_flight() {
        let backend = SlowBackend::new(Duration::from_secs(30));
        let channel = Arc::new(RequestChannel::new(backend, Duration::from_secs(60)));
        let token = RequestToken::new();

        let task = {
            let channel = Arc::clone(&channel);
            let token = token.clone();
            tokio::spawn(async move { channel.chat(&token, &request("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("cancel should resolve promptly")
            .unwrap();
        assert_eq!(result, Err(RequestError::Cancelled));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let backend = SlowBackend::new(Duration::from_secs(30));
        let channel = RequestChannel::new(backend, Duration::from_millis(50));
        let token = RequestToken::new();

        let result = channel.diagnose(&token, &Attachment::new("leaf.png", vec![0])).await;
        assert_eq!(result, Err(RequestError::Timeout(Duration::from_millis(50))));
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_diagnose_success() {
        let channel = RequestChannel::new(SlowBackend::new(Duration::ZERO), Duration::from_secs(5));
        let report = channel
            .diagnose(&RequestToken::new(), &Attachment::new("leaf.png", vec![1]))
            .await
            .unwrap();
        assert_eq!(report, "report for leaf.png");
    }

    #[tokio::test]
    async fn test_upload_is_plain() {
        let channel = RequestChannel::new(SlowBackend::new(Duration::ZERO), Duration::from_secs(5));
        let ack = channel
            .upload(&Attachment::new("soil.pdf", vec![1, 2]))
            .await
            .unwrap();
        assert_eq!(ack, "stored soil.pdf");
    }

    #[tokio::test]
    async fn test_upload_timeout() {
        let channel = RequestChannel::new(
            SlowBackend::new(Duration::from_secs(30)),
            Duration::from_millis(30),
        );
        let result = channel.upload(&Attachment::new("soil.pdf", vec![])).await;
        assert!(matches!(result, Err(RequestError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_token_is_not_cleared_by_channel() {
        let channel = RequestChannel::new(SlowBackend::new(Duration::ZERO), Duration::from_secs(5));
        let token = RequestToken::new();
        let id = token.id();
        channel.chat(&token, &request("hi")).await.unwrap();
        // Token is untouched: same id, not cancelled.
        assert_eq!(token.id(), id);
        assert!(!token.is_cancelled());
    }
}
