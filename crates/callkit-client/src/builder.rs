//! Invoker builder for fluent construction.
//!
//! The [`InvokerBuilder`] collects an endpoint and an optional client
//! configuration, then builds a [`TransportInvoker`] with a factory.

use callkit_core::endpoint::Endpoint;
use callkit_core::error::InvokeError;
use callkit_transport::config::ClientConfig;
use callkit_transport::traits::ClientFactory;

use crate::invoker::TransportInvoker;

#[derive(Debug, Clone)]
enum Target {
    Unset,
    Url(String),
    Endpoint(Endpoint),
}

/// Builder for constructing invokers.
///
/// # Example
///
/// ```rust
/// use callkit_client::InvokerBuilder;
/// use callkit_core::Invoker;
/// use callkit_transport::memory::{MemoryNetwork, MemoryService};
///
/// let network = MemoryNetwork::new();
/// network.bind("127.0.0.1:20000", MemoryService::new());
///
/// let invoker = InvokerBuilder::new()
///     .url("tri://127.0.0.1:20000/greet.Greeter")
///     .build(&network)
///     .unwrap();
/// assert!(invoker.is_available());
/// ```
#[derive(Debug, Clone)]
pub struct InvokerBuilder {
    target: Target,
    config: Option<ClientConfig>,
}

impl Default for InvokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvokerBuilder {
    /// Create a builder with no endpoint.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target: Target::Unset,
            config: None,
        }
    }

    /// Set the endpoint from a string, parsed when building.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.target = Target::Url(url.into());
        self
    }

    /// Set the endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.target = Target::Endpoint(endpoint);
        self
    }

    /// Use `config` instead of the factory's own configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the invoker.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::InvalidEndpoint`] if no endpoint was set or the
    /// endpoint string does not parse, and
    /// [`InvokeError::ClientConstruction`] if the factory fails.
    pub fn build<F: ClientFactory>(
        self,
        factory: &F,
    ) -> Result<TransportInvoker<F::Client>, InvokeError> {
        let endpoint = match self.target {
            Target::Unset => return Err(InvokeError::invalid_endpoint("", "no endpoint set")),
            Target::Url(url) => Endpoint::parse(&url)?,
            Target::Endpoint(endpoint) => endpoint,
        };

        match &self.config {
            Some(config) => TransportInvoker::with_config(endpoint, factory, config),
            None => TransportInvoker::new(endpoint, factory),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_testing::mock::MockFactory;

    #[test]
    fn test_missing_endpoint() {
        let err = InvokerBuilder::new().build(&MockFactory::new()).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_bad_url() {
        let err = InvokerBuilder::new()
            .url("not a url")
            .build(&MockFactory::new())
            .unwrap_err();
        assert!(matches!(err, InvokeError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_config_is_forwarded() {
        let factory = MockFactory::new();
        let config = ClientConfig::new().stream_buffer(3);
        let invoker = InvokerBuilder::new()
            .url("tri://127.0.0.1:20000/Svc")
            .config(config.clone())
            .build(&factory)
            .unwrap();

        let client = invoker.client().unwrap();
        assert_eq!(client.config(), Some(&config));
    }
}
