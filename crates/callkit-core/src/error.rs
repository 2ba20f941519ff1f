//! Unified error handling for invocations.
//!
//! Every recoverable failure an invoker can produce flows through
//! [`InvokeError`]. Invokers never return these across the call boundary as
//! `Err`: they are embedded in the [`RpcResult`](crate::result::RpcResult) so
//! the surrounding framework can inspect them and route around a failing
//! target.
//!
//! # Error Categories
//!
//! | Variant | When | Caller reaction |
//! |---------|------|-----------------|
//! | [`InvokeError::DestroyedInvoker`] | Invoker was torn down | Route around the target |
//! | [`InvokeError::ClientClosed`] | Teardown raced an invocation | Same as destroyed |
//! | [`InvokeError::ClientConstruction`] | Transport client could not be built | Retry policy is up to the caller |
//! | [`InvokeError::Transport`] | The call itself failed | Inspect the source error |
//! | [`InvokeError::InvalidEndpoint`] | Endpoint string is malformed | Fix configuration |
//!
//! Malformed invocations (missing call type, wrong parameter count) are not
//! represented here. They indicate a broken call site and abort the call with
//! a panic instead.

use miette::Diagnostic;
use thiserror::Error;

/// Type alias for boxed errors that are Send + Sync.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type carried by an [`RpcResult`](crate::result::RpcResult).
#[derive(Error, Diagnostic, Debug)]
pub enum InvokeError {
    /// The invoker has been destroyed and no longer accepts calls.
    #[error("Invoker for {endpoint} is destroyed")]
    #[diagnostic(
        code(callkit::invoker::destroyed),
        help("Remove the invoker from the routing table before destroying it")
    )]
    DestroyedInvoker {
        /// The endpoint the invoker was bound to.
        endpoint: String,
    },

    /// The transport client was released while the invocation was starting.
    #[error("Transport client is closed")]
    #[diagnostic(code(callkit::invoker::client_closed))]
    ClientClosed,

    /// Building the transport client failed.
    #[error("Failed to build client for {endpoint}: {source}")]
    #[diagnostic(code(callkit::invoker::construction))]
    ClientConstruction {
        /// The endpoint the client was built for.
        endpoint: String,
        /// The error reported by the transport layer, unchanged.
        #[source]
        source: BoxError,
    },

    /// The transport reported an error for the call.
    #[error("Transport error: {source}")]
    #[diagnostic(code(callkit::transport::error))]
    Transport {
        /// The error reported by the transport layer, unchanged.
        #[source]
        source: BoxError,
    },

    /// An endpoint descriptor could not be parsed.
    #[error("Invalid endpoint '{endpoint}': {message}")]
    #[diagnostic(
        code(callkit::endpoint::invalid),
        help("Endpoints look like tri://host:port/package.Service?timeout=3000")
    )]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// What was wrong with it.
        message: String,
    },
}

impl InvokeError {
    /// Wrap a transport error without altering it.
    pub fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport {
            source: source.into(),
        }
    }

    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether the target can no longer serve calls.
    ///
    /// True for [`InvokeError::DestroyedInvoker`] and
    /// [`InvokeError::ClientClosed`].
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::DestroyedInvoker { .. } | Self::ClientClosed)
    }

    /// Borrow the transport error of the given type, if this error wraps one.
    ///
    /// Works for both [`InvokeError::Transport`] and
    /// [`InvokeError::ClientConstruction`].
    #[must_use]
    pub fn transport_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Transport { source } | Self::ClientConstruction { source, .. } => {
                source.downcast_ref::<E>()
            }
            _ => None,
        }
    }
}
