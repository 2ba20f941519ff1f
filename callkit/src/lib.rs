//! # callkit
//!
//! Client-side RPC invokers for Rust.
//!
//! An invoker is the last hop between a caller and the wire: it receives a
//! transport-neutral [`Invocation`], reads its call type, and hands it to a
//! transport client as a unary, client-streaming, server-streaming or
//! bidirectional-streaming call.
//!
//! ## Features
//!
//! - **Four call shapes** through one [`Invoker::invoke`] entry point
//! - **Safe teardown**: [`Invoker::destroy`] closes the client exactly once,
//!   and calls made afterwards fail fast instead of touching the transport
//! - **Pluggable transports** behind [`TransportClient`] and
//!   [`ClientFactory`], with logging and timeout middleware
//! - **Rich error handling** with miette diagnostics
//!
//! ## Quick Start
//!
//! ```rust
//! use callkit::prelude::*;
//! use serde_json::{Value, json};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), InvokeError> {
//! let network = MemoryNetwork::new();
//! network.bind(
//!     "127.0.0.1:20000",
//!     MemoryService::new().unary("Echo", |req: Value| async move { Ok(req) }),
//! );
//!
//! let invoker = InvokerBuilder::new()
//!     .url("tri://127.0.0.1:20000/echo.Echo")
//!     .build(&network)?;
//!
//! let reply = Carrier::new();
//! let invocation = Invocation::new("Echo")
//!     .with_call_type(CallType::Unary)
//!     .with_raw_value(raw(json!("ping")))
//!     .with_raw_value(raw(reply.clone()));
//! invoker.invoke(&CallContext::new(), &invocation).await.into_result()?;
//! assert_eq!(reply.take(), Some(json!("ping")));
//!
//! invoker.destroy().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`callkit_core`] - Invocations, results, errors and the invoker trait
//! - [`callkit_transport`] - Transport abstractions and the memory transport
//! - [`callkit_client`] - The transport-backed invoker and its registry

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

// Re-export all public items from core
pub use callkit_core::*;

// Re-export client types
pub use callkit_client::{InvokerBuilder, InvokerRegistry, SharedInvoker, TransportInvoker};

// Re-export transport types
pub use callkit_transport::{ClientFactory, TransportClient, TransportError, TransportMetadata};

pub mod prelude;

/// Transport module re-exports
pub mod transport {
    //! Transport layer types.
    pub use callkit_transport::*;
}

/// Client module re-exports
pub mod client {
    //! Invoker implementation types.
    pub use callkit_client::*;
}
