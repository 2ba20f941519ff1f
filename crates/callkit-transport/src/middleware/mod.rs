//! Composable middleware for transport clients.
//!
//! A [`TransportLayer`] wraps a [`TransportClient`] in another client that
//! adds behavior around every call. Layers can be applied to a single client
//! with [`LayerStack`], or to every client a factory builds with [`Layered`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use callkit_transport::memory::MemoryNetwork;
//! use callkit_transport::middleware::{Layered, LoggingLayer, TimeoutLayer};
//!
//! let factory = Layered::new(MemoryNetwork::new(), TimeoutLayer::new(Duration::from_secs(5)))
//!     .with(LoggingLayer::default());
//! # let _ = factory;
//! ```

mod logging;
mod timeout;

pub use logging::{LoggingClient, LoggingLayer};
pub use timeout::{TimeoutClient, TimeoutLayer};

use std::fmt;

use callkit_core::endpoint::Endpoint;

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::traits::{ClientFactory, TransportClient};

/// A layer that wraps a transport client to add functionality.
///
/// See [`IdentityLayer`] for the simplest implementation.
pub trait TransportLayer<T: TransportClient> {
    /// The client type produced by this layer.
    type Client: TransportClient;

    /// Wrap the inner client with this layer's functionality.
    fn layer(&self, inner: T) -> Self::Client;
}

/// A stack of layers applied to one client.
///
/// Layers are applied in order: the first added is innermost.
pub struct LayerStack<T> {
    inner: T,
}

impl<T: TransportClient> LayerStack<T> {
    /// Start a stack from a bare client.
    pub const fn new(client: T) -> Self {
        Self { inner: client }
    }

    /// Apply a layer to the stack.
    pub fn with<L>(self, layer: L) -> LayerStack<L::Client>
    where
        L: TransportLayer<T>,
    {
        LayerStack {
            inner: layer.layer(self.inner),
        }
    }

    /// Get the wrapped client.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Get a reference to the wrapped client.
    pub const fn inner(&self) -> &T {
        &self.inner
    }
}

/// Identity layer that passes through without modification.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityLayer;

impl<T: TransportClient> TransportLayer<T> for IdentityLayer {
    type Client = T;

    fn layer(&self, inner: T) -> Self::Client {
        inner
    }
}

/// A factory that applies a layer to every client it builds.
#[derive(Clone)]
pub struct Layered<F, L> {
    factory: F,
    layer: L,
}

impl<F, L> Layered<F, L> {
    /// Wrap `factory` so that its clients are passed through `layer`.
    pub const fn new(factory: F, layer: L) -> Self {
        Self { factory, layer }
    }

    /// Add another layer outside this one.
    pub const fn with<N>(self, layer: N) -> Layered<Self, N> {
        Layered::new(self, layer)
    }

    /// The wrapped factory.
    pub const fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F, L> ClientFactory for Layered<F, L>
where
    F: ClientFactory,
    L: TransportLayer<F::Client> + Send + Sync,
{
    type Client = L::Client;

    fn build(&self, endpoint: &Endpoint) -> Result<Self::Client, TransportError> {
        Ok(self.layer.layer(self.factory.build(endpoint)?))
    }

    fn build_with_config(
        &self,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<Self::Client, TransportError> {
        Ok(self
            .layer
            .layer(self.factory.build_with_config(endpoint, config)?))
    }
}

impl<F: fmt::Debug, L: fmt::Debug> fmt::Debug for Layered<F, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layered")
            .field("factory", &self.factory)
            .field("layer", &self.layer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryNetwork, MemoryService};

    #[test]
    fn test_identity_layer_keeps_client() {
        let network = MemoryNetwork::new();
        network.bind("127.0.0.1:20000", MemoryService::new());
        let endpoint = Endpoint::parse("mem://127.0.0.1:20000/Svc").unwrap();

        let client = Layered::new(network, IdentityLayer).build(&endpoint).unwrap();
        let stack = LayerStack::new(client).with(IdentityLayer);
        assert!(stack.inner().is_connected());
        assert_eq!(stack.into_inner().metadata().transport_type, "memory");
    }
}
