//! Logging middleware for transport clients.
//!
//! Logs every call made through the client and counts calls and failures.

use std::sync::atomic::{AtomicU64, Ordering};

use callkit_core::context::CallContext;
use callkit_core::value::RawValue;
use tracing::{Level, debug, trace};

use crate::middleware::TransportLayer;
use crate::stream::{BidiStream, ClientStream, ServerStream};
use crate::traits::{TransportClient, TransportMetadata};

/// A layer that adds logging to a transport client.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    /// The log level to use.
    level: Level,
}

impl LoggingLayer {
    /// Create a new logging layer with the specified log level.
    ///
    /// Levels above `DEBUG` are logged at `DEBUG`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl<T: TransportClient> TransportLayer<T> for LoggingLayer {
    type Client = LoggingClient<T>;

    fn layer(&self, inner: T) -> Self::Client {
        LoggingClient {
            inner,
            level: self.level,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }
}

/// A transport client wrapped with logging.
pub struct LoggingClient<T> {
    inner: T,
    level: Level,
    calls: AtomicU64,
    failures: AtomicU64,
}

impl<T> LoggingClient<T> {
    /// Number of calls started through this client.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of calls that returned an error.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// The wrapped client.
    pub const fn inner(&self) -> &T {
        &self.inner
    }

    fn start(&self, kind: &'static str, ctx: &CallContext, method: &str) -> u64 {
        let count = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let request_id = ctx.request_id();
        if self.level == Level::TRACE {
            trace!(count, kind, method, request_id, "transport call");
        } else {
            debug!(count, kind, method, request_id, "transport call");
        }
        count
    }

    fn finish<V, E: std::fmt::Display>(&self, count: u64, method: &str, result: &Result<V, E>) {
        if let Err(err) = result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            debug!(count, method, error = %err, "transport call failed");
        }
    }
}

impl<T: TransportClient> TransportClient for LoggingClient<T> {
    type Error = T::Error;

    async fn call_unary(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
        response: RawValue,
    ) -> Result<(), Self::Error> {
        let count = self.start("unary", ctx, method);
        let result = self.inner.call_unary(ctx, method, request, response).await;
        self.finish(count, method, &result);
        result
    }

    async fn call_client_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<ClientStream, Self::Error> {
        let count = self.start("client-stream", ctx, method);
        let result = self.inner.call_client_stream(ctx, method).await;
        self.finish(count, method, &result);
        result
    }

    async fn call_server_stream(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
    ) -> Result<ServerStream, Self::Error> {
        let count = self.start("server-stream", ctx, method);
        let result = self.inner.call_server_stream(ctx, method, request).await;
        self.finish(count, method, &result);
        result
    }

    async fn call_bidi_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<BidiStream, Self::Error> {
        let count = self.start("bidi-stream", ctx, method);
        let result = self.inner.call_bidi_stream(ctx, method).await;
        self.finish(count, method, &result);
        result
    }

    async fn close(&self) -> Result<(), Self::Error> {
        debug!(
            calls = self.calls(),
            failures = self.failures(),
            "closing transport client"
        );
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn metadata(&self) -> TransportMetadata {
        self.inner.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryNetwork, MemoryService};
    use crate::traits::ClientFactory;
    use callkit_core::endpoint::Endpoint;
    use callkit_core::value::{Carrier, raw};
    use serde_json::Value;

    #[tokio::test]
    async fn test_counts_calls_and_failures() {
        let network = MemoryNetwork::new();
        network.bind(
            "127.0.0.1:20000",
            MemoryService::new().unary("Echo", |req| async move { Ok(req) }),
        );
        let endpoint = Endpoint::parse("tri://127.0.0.1:20000/Svc").unwrap();
        let client = LoggingLayer::new(Level::TRACE).layer(network.build(&endpoint).unwrap());

        let ctx = CallContext::new();
        let reply: Carrier<Value> = Carrier::new();
        client
            .call_unary(&ctx, "Echo", raw(Value::Bool(true)), raw(reply.clone()))
            .await
            .unwrap();
        assert!(
            client
                .call_bidi_stream(&ctx, "Nope")
                .await
                .is_err()
        );

        assert_eq!(client.calls(), 2);
        assert_eq!(client.failures(), 1);
        assert_eq!(reply.take(), Some(Value::Bool(true)));

        client.close().await.unwrap();
        assert!(!client.inner().is_connected());
    }
}
