//! Transport traits for callkit.
//!
//! This module defines the abstractions an invoker drives:
//!
//! - [`TransportClient`]: a connected client that performs the four call kinds
//! - [`ClientFactory`]: builds a [`TransportClient`] for an [`Endpoint`]
//!
//! Both are runtime-agnostic and use `impl Future` return types, so
//! implementations write plain `async fn`s.

use std::future::Future;
use std::time::Instant;

use callkit_core::context::CallContext;
use callkit_core::endpoint::Endpoint;
use callkit_core::value::RawValue;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::stream::{BidiStream, ClientStream, ServerStream};

/// Metadata about a transport connection.
#[derive(Debug, Clone, Default)]
pub struct TransportMetadata {
    /// Transport type identifier (e.g., "memory", "triple").
    pub transport_type: String,
    /// Remote address, if applicable.
    pub remote_addr: Option<String>,
    /// When the connection was established.
    pub connected_at: Option<Instant>,
    /// Whether the transport supports streaming calls.
    pub streaming: bool,
    /// Custom metadata specific to the transport type.
    pub custom: Option<serde_json::Value>,
}

impl TransportMetadata {
    /// Create new metadata for a transport type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            remote_addr: None,
            connected_at: None,
            streaming: true,
            custom: None,
        }
    }

    /// Set the remote address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Mark the connection time.
    #[must_use]
    pub fn connected_now(mut self) -> Self {
        self.connected_at = Some(Instant::now());
        self
    }

    /// Set the streaming flag.
    #[must_use]
    pub const fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Attach transport-specific metadata.
    #[must_use]
    pub fn custom(mut self, custom: serde_json::Value) -> Self {
        self.custom = Some(custom);
        self
    }
}

/// A connected RPC client.
///
/// Implementations must be `Send + Sync`; an invoker shares one client
/// between every concurrent call and may call [`close`](Self::close) while
/// calls are still in flight.
///
/// Message values are [`RawValue`]s. Each transport documents which concrete
/// types it accepts and reports anything else as an error.
pub trait TransportClient: Send + Sync + 'static {
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Perform a unary call, writing the reply into `response`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call failed or the reply could not be
    /// written into `response`.
    fn call_unary(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
        response: RawValue,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Open a client-streaming call.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream could not be opened.
    fn call_client_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> impl Future<Output = Result<ClientStream, Self::Error>> + Send;

    /// Open a server-streaming call with a single request.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream could not be opened.
    fn call_server_stream(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
    ) -> impl Future<Output = Result<ServerStream, Self::Error>> + Send;

    /// Open a bidirectional-streaming call.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream could not be opened.
    fn call_bidi_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> impl Future<Output = Result<BidiStream, Self::Error>> + Send;

    /// Close the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the close operation failed.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Check if the client is still connected.
    fn is_connected(&self) -> bool;

    /// Get metadata about the connection.
    fn metadata(&self) -> TransportMetadata;
}

/// Builds transport clients for endpoints.
///
/// Construction is synchronous: a factory either returns a ready client or
/// fails.
pub trait ClientFactory: Send + Sync {
    /// The client type produced by this factory.
    type Client: TransportClient;

    /// Build a client for `endpoint` using the factory's own configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unsupported or unreachable.
    fn build(&self, endpoint: &Endpoint) -> Result<Self::Client, TransportError>;

    /// Build a client for `endpoint` with an explicit configuration.
    ///
    /// Factories without per-client settings ignore `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unsupported or unreachable.
    fn build_with_config(
        &self,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<Self::Client, TransportError> {
        let _ = config;
        self.build(endpoint)
    }
}

impl<F: ClientFactory> ClientFactory for &F {
    type Client = F::Client;

    fn build(&self, endpoint: &Endpoint) -> Result<Self::Client, TransportError> {
        (**self).build(endpoint)
    }

    fn build_with_config(
        &self,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<Self::Client, TransportError> {
        (**self).build_with_config(endpoint, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = TransportMetadata::new("memory")
            .remote_addr("127.0.0.1:20000")
            .streaming(false)
            .connected_now();

        assert_eq!(meta.transport_type, "memory");
        assert_eq!(meta.remote_addr.as_deref(), Some("127.0.0.1:20000"));
        assert!(!meta.streaming);
        assert!(meta.connected_at.is_some());
        assert!(meta.custom.is_none());
    }
}
