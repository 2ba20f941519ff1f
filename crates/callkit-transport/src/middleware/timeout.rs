//! Timeout middleware for transport clients.
//!
//! Calls whose context carries no deadline get one, and calls that take
//! longer than the timeout fail with [`TransportError::Timeout`].

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use callkit_core::context::CallContext;
use callkit_core::value::RawValue;

use crate::error::TransportError;
use crate::middleware::TransportLayer;
use crate::stream::{BidiStream, ClientStream, ServerStream};
use crate::traits::{TransportClient, TransportMetadata};

/// A layer that bounds calls by a default timeout.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutLayer {
    timeout: Duration,
}

impl TimeoutLayer {
    /// Create a timeout layer.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TimeoutLayer {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl<T: TransportClient> TransportLayer<T> for TimeoutLayer
where
    T::Error: From<TransportError>,
{
    type Client = TimeoutClient<T>;

    fn layer(&self, inner: T) -> Self::Client {
        TimeoutClient {
            inner,
            timeout: self.timeout,
        }
    }
}

/// A transport client wrapped with timeout handling.
pub struct TimeoutClient<T> {
    inner: T,
    timeout: Duration,
}

impl<T> TimeoutClient<T> {
    /// Get the configured timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The context to pass down, and how long to wait for the call.
    fn bound<'a>(&self, ctx: &'a CallContext) -> (Cow<'a, CallContext>, Duration) {
        match ctx.remaining() {
            Some(remaining) => (Cow::Borrowed(ctx), remaining),
            None => (
                Cow::Owned(ctx.child().with_timeout(self.timeout)),
                self.timeout,
            ),
        }
    }
}

impl<T: TransportClient> TimeoutClient<T>
where
    T::Error: From<TransportError>,
{
    async fn within<V>(
        &self,
        operation: &str,
        limit: Duration,
        call: impl Future<Output = Result<V, T::Error>>,
    ) -> Result<V, T::Error> {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                operation: operation.to_string(),
                duration: limit,
            }
            .into()),
        }
    }
}

impl<T: TransportClient> TransportClient for TimeoutClient<T>
where
    T::Error: From<TransportError>,
{
    type Error = T::Error;

    async fn call_unary(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
        response: RawValue,
    ) -> Result<(), Self::Error> {
        let (ctx, limit) = self.bound(ctx);
        self.within(method, limit, self.inner.call_unary(&ctx, method, request, response))
            .await
    }

    async fn call_client_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<ClientStream, Self::Error> {
        let (ctx, limit) = self.bound(ctx);
        self.within(method, limit, self.inner.call_client_stream(&ctx, method))
            .await
    }

    async fn call_server_stream(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
    ) -> Result<ServerStream, Self::Error> {
        let (ctx, limit) = self.bound(ctx);
        self.within(method, limit, self.inner.call_server_stream(&ctx, method, request))
            .await
    }

    async fn call_bidi_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<BidiStream, Self::Error> {
        let (ctx, limit) = self.bound(ctx);
        self.within(method, limit, self.inner.call_bidi_stream(&ctx, method))
            .await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        // Close is never bounded so shutdown can finish.
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn metadata(&self) -> TransportMetadata {
        self.inner.metadata()
    }
}
