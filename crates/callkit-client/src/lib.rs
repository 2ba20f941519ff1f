//! Invoker implementation for callkit.
//!
//! This crate turns a transport client into an [`Invoker`]:
//!
//! - [`TransportInvoker`]: dispatches invocations by call type, guards the
//!   client handle and tears it down exactly once
//! - [`InvokerBuilder`]: fluent construction from an endpoint string
//! - [`InvokerRegistry`]: one shared invoker per target
//!
//! # Example
//!
//! ```rust
//! use callkit_client::TransportInvoker;
//! use callkit_core::prelude::*;
//! use callkit_transport::memory::{MemoryNetwork, MemoryService};
//! use serde_json::{Value, json};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), InvokeError> {
//! let network = MemoryNetwork::new();
//! network.bind(
//!     "127.0.0.1:20000",
//!     MemoryService::new().unary("SayHello", |req: Value| async move { Ok(req) }),
//! );
//!
//! let endpoint = Endpoint::parse("tri://127.0.0.1:20000/greet.Greeter")?;
//! let invoker = TransportInvoker::new(endpoint, &network)?;
//!
//! let reply: Carrier<Value> = Carrier::new();
//! let invocation = Invocation::new("SayHello")
//!     .with_call_type(CallType::Unary)
//!     .with_raw_value(raw(json!({ "name": "callkit" })))
//!     .with_raw_value(raw(reply.clone()));
//!
//! invoker.invoke(&CallContext::new(), &invocation).await.into_result()?;
//! assert_eq!(reply.take(), Some(json!({ "name": "callkit" })));
//!
//! invoker.destroy().await;
//! assert!(!invoker.is_available());
//! # Ok(())
//! # }
//! ```
//!
//! [`Invoker`]: callkit_core::Invoker

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod invoker;
pub mod registry;

// Re-export commonly used types
pub use builder::InvokerBuilder;
pub use invoker::TransportInvoker;
pub use registry::{InvokerRegistry, SharedInvoker};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::InvokerBuilder;
    pub use crate::invoker::TransportInvoker;
    pub use crate::registry::InvokerRegistry;
}
