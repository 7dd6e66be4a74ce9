use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Cancellation handle bound to exactly one in-flight request.
///
/// Clones share the same cancellation state, so the session manager can keep
/// one copy while the request future holds another.
#[derive(Debug, Clone)]
pub struct RequestToken {
    id: Uuid,
    cancel: CancellationToken,
}

impl Default for RequestToken {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestToken {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
