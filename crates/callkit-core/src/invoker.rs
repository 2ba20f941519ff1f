//! The invoker contract.
//!
//! An [`Invoker`] represents one callable RPC target. The framework routes
//! invocations to invokers, asks them whether they are still usable, and
//! destroys them when the target leaves service.
//!
//! [`BaseInvoker`] holds the state every invoker shares: its endpoint and the
//! available/destroyed flags.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::context::CallContext;
use crate::endpoint::Endpoint;
use crate::invocation::Invocation;
use crate::result::RpcResult;

/// A callable RPC target.
pub trait Invoker: Send + Sync {
    /// The endpoint this invoker calls.
    fn endpoint(&self) -> &Endpoint;

    /// Whether the invoker can serve calls.
    fn is_available(&self) -> bool;

    /// Whether the invoker has been destroyed.
    fn is_destroyed(&self) -> bool;

    /// Perform a call.
    ///
    /// Recoverable failures are reported inside the returned [`RpcResult`].
    ///
    /// # Panics
    ///
    /// Implementations panic when the invocation itself is malformed (for
    /// example a missing call type or the wrong number of parameter values).
    /// Such invocations come from a broken call site and are never retried.
    fn invoke(
        &self,
        ctx: &CallContext,
        invocation: &Invocation,
    ) -> impl Future<Output = RpcResult> + Send;

    /// Release the target's resources.
    ///
    /// Safe to call any number of times from any number of tasks.
    fn destroy(&self) -> impl Future<Output = ()> + Send;
}

/// Shared invoker state: the endpoint and lifecycle flags.
#[derive(Debug)]
pub struct BaseInvoker {
    endpoint: Endpoint,
    available: AtomicBool,
    destroyed: AtomicBool,
}

impl BaseInvoker {
    /// Create an available invoker base for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            available: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
        }
    }

    /// The endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the invoker has not been destroyed yet.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Whether the invoker has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Mark the invoker destroyed and unavailable.
    pub fn destroy(&self) {
        info!(endpoint = %self.endpoint, "destroying invoker");
        self.destroyed.store(true, Ordering::SeqCst);
        self.available.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_lifecycle() {
        let endpoint = Endpoint::parse("tri://127.0.0.1:20000/Greeter").unwrap();
        let base = BaseInvoker::new(endpoint.clone());
        assert_eq!(base.endpoint(), &endpoint);
        assert!(base.is_available());
        assert!(!base.is_destroyed());

        base.destroy();
        assert!(!base.is_available());
        assert!(base.is_destroyed());

        base.destroy();
        assert!(base.is_destroyed());
    }
}
