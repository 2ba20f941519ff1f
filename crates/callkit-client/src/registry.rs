//! Invoker registry.
//!
//! Keeps one live invoker per target so that callers referring to the same
//! endpoint share a transport client. Invokers that have been destroyed are
//! replaced on the next [`refer`](InvokerRegistry::refer).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_lock::RwLock;
use callkit_core::endpoint::Endpoint;
use callkit_core::error::InvokeError;
use callkit_core::invoker::Invoker;
use callkit_transport::traits::ClientFactory;
use futures::future::join_all;
use tracing::{debug, info};

use crate::invoker::TransportInvoker;

/// A shared invoker handle.
pub type SharedInvoker<F> = Arc<TransportInvoker<<F as ClientFactory>::Client>>;

/// A cache of invokers keyed by [`Endpoint::key`].
pub struct InvokerRegistry<F: ClientFactory> {
    factory: F,
    invokers: RwLock<HashMap<String, SharedInvoker<F>>>,
}

impl<F: ClientFactory> InvokerRegistry<F> {
    /// Create an empty registry that builds clients with `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            invokers: RwLock::new(HashMap::new()),
        }
    }

    /// The factory used for new invokers.
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Return the available invoker for `endpoint`, building one if needed.
    ///
    /// A cached invoker that is no longer available is destroyed and
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::ClientConstruction`] if a new client could not
    /// be built. The cache is left without an entry for the endpoint.
    pub async fn refer(&self, endpoint: &Endpoint) -> Result<SharedInvoker<F>, InvokeError> {
        let key = endpoint.key();

        if let Some(invoker) = self.invokers.read().await.get(&key) {
            if invoker.is_available() {
                return Ok(Arc::clone(invoker));
            }
        }

        let mut invokers = self.invokers.write().await;
        // Another task may have replaced the entry while we waited.
        if let Some(invoker) = invokers.get(&key) {
            if invoker.is_available() {
                return Ok(Arc::clone(invoker));
            }
        }

        let stale = invokers.remove(&key);
        let invoker = Arc::new(TransportInvoker::new(endpoint.clone(), &self.factory)?);
        invokers.insert(key.clone(), Arc::clone(&invoker));
        drop(invokers);
        debug!(%key, "registered invoker");

        if let Some(stale) = stale {
            stale.destroy().await;
        }
        Ok(invoker)
    }

    /// The cached invoker for `endpoint`, available or not.
    pub async fn get(&self, endpoint: &Endpoint) -> Option<SharedInvoker<F>> {
        self.invokers.read().await.get(&endpoint.key()).cloned()
    }

    /// Remove and destroy the invoker for `endpoint`.
    ///
    /// Returns whether an invoker was registered.
    pub async fn remove(&self, endpoint: &Endpoint) -> bool {
        let removed = self.invokers.write().await.remove(&endpoint.key());
        match removed {
            Some(invoker) => {
                invoker.destroy().await;
                true
            }
            None => false,
        }
    }

    /// Remove and destroy every invoker, concurrently.
    pub async fn destroy_all(&self) {
        let drained: Vec<_> = self
            .invokers
            .write()
            .await
            .drain()
            .map(|(_, invoker)| invoker)
            .collect();
        info!(count = drained.len(), "destroying all invokers");
        join_all(drained.iter().map(|invoker| invoker.destroy())).await;
    }

    /// Number of cached invokers.
    pub async fn len(&self) -> usize {
        self.invokers.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.invokers.read().await.is_empty()
    }
}

impl<F: ClientFactory + fmt::Debug> fmt::Debug for InvokerRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerRegistry")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_testing::mock::MockFactory;

    fn endpoint(port: u16) -> Endpoint {
        Endpoint::parse(&format!("tri://127.0.0.1:{port}/test.Svc")).unwrap()
    }

    #[tokio::test]
    async fn test_refer_reuses_available_invoker() {
        let registry = InvokerRegistry::new(MockFactory::new());
        let first = registry.refer(&endpoint(1)).await.unwrap();
        let again = registry
            .refer(&endpoint(1).with_param("timeout", "10"))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.factory().state().build_count(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_refer_replaces_destroyed_invoker() {
        let registry = InvokerRegistry::new(MockFactory::new());
        let first = registry.refer(&endpoint(1)).await.unwrap();
        first.destroy().await;

        let second = registry.refer(&endpoint(1)).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_available());
        assert_eq!(registry.factory().state().build_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_destroys() {
        let registry = InvokerRegistry::new(MockFactory::new());
        let invoker = registry.refer(&endpoint(1)).await.unwrap();

        assert!(registry.remove(&endpoint(1)).await);
        assert!(!registry.remove(&endpoint(1)).await);
        assert!(!invoker.is_available());
        assert!(registry.get(&endpoint(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_destroy_all() {
        let registry = InvokerRegistry::new(MockFactory::new());
        for port in 1..=3 {
            registry.refer(&endpoint(port)).await.unwrap();
        }
        registry.destroy_all().await;

        assert!(registry.is_empty().await);
        assert_eq!(registry.factory().state().close_count(), 3);
    }

    #[tokio::test]
    async fn test_refer_failure_leaves_no_entry() {
        let factory = MockFactory::new();
        factory.state().fail_builds(true);
        let registry = InvokerRegistry::new(factory);

        let err = registry.refer(&endpoint(1)).await.unwrap_err();
        assert!(matches!(err, InvokeError::ClientConstruction { .. }));
        assert!(registry.is_empty().await);
    }
}
