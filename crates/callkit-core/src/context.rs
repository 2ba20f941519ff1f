//! Per-call context.
//!
//! A [`CallContext`] travels with every invocation down to the transport. It
//! carries a request identifier for log correlation, an optional deadline, a
//! cancellation token and string metadata. Invokers pass it through without
//! interpreting it; enforcing deadlines and cancellation is the transport's
//! job.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Context for a single call.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
    metadata: HashMap<String, String>,
}

impl CallContext {
    /// Create a context with a fresh request id, no deadline and no metadata.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
            cancellation: CancellationToken::new(),
            metadata: HashMap::new(),
        }
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Derive a context that is cancelled whenever this one is.
    ///
    /// The child keeps the request id, deadline and metadata. Cancelling the
    /// child does not cancel the parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            deadline: self.deadline,
            cancellation: self.cancellation.child_token(),
            metadata: self.metadata.clone(),
        }
    }

    /// The request id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline, saturating at zero.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|d| d.is_zero())
    }

    /// Look up a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// All metadata entries.
    #[must_use]
    pub fn metadata_map(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Cancel the call (and every child context).
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Wait until the call is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_no_deadline() {
        let ctx = CallContext::new();
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_expired());
        assert!(!ctx.is_cancelled());
        assert!(!ctx.request_id().is_empty());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(CallContext::new().request_id(), CallContext::new().request_id());
    }

    #[test]
    fn test_timeout_sets_deadline() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(60));
        let remaining = ctx.remaining().unwrap();
        assert!(remaining > Duration::from_secs(59));
        assert!(!ctx.is_expired());

        let expired = CallContext::new().with_deadline(Instant::now());
        assert!(expired.is_expired());
    }

    #[test]
    fn test_child_follows_parent_cancellation() {
        let parent = CallContext::new().with_metadata("tenant", "blue");
        let child = parent.child();
        assert_eq!(child.request_id(), parent.request_id());
        assert_eq!(child.metadata("tenant"), Some("blue"));

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancel();
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let ctx = CallContext::new();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
