//! # callkit-core
//!
//! Core types and traits for the callkit RPC client.
//!
//! This crate provides the transport-agnostic building blocks shared by every
//! other callkit crate:
//!
//! - **Invocations**: [`Invocation`] and its [`CallType`]
//! - **Results**: [`RpcResult`] carrying an error or a payload
//! - **Errors**: the unified [`InvokeError`]
//! - **Endpoints**: parsed target descriptors ([`Endpoint`])
//! - **Context**: per-call deadline, cancellation and metadata ([`CallContext`])
//! - **Invokers**: the [`Invoker`] trait and [`BaseInvoker`] state
//!
//! This crate does not depend on an async runtime.
//!
//! # Example
//!
//! ```rust
//! use callkit_core::{CallType, Endpoint, Invocation};
//! use callkit_core::value::{raw, Carrier};
//!
//! let endpoint = Endpoint::parse("tri://127.0.0.1:20000/greet.Greeter").unwrap();
//!
//! let reply: Carrier<serde_json::Value> = Carrier::new();
//! let invocation = Invocation::new("SayHello")
//!     .with_call_type(CallType::Unary)
//!     .with_raw_value(raw(serde_json::json!({ "name": "callkit" })))
//!     .with_raw_value(raw(reply.clone()));
//!
//! assert_eq!(endpoint.service(), "greet.Greeter");
//! assert_eq!(invocation.parameter_raw_values().len(), 2);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod endpoint;
pub mod error;
pub mod invocation;
pub mod invoker;
pub mod result;
pub mod value;

// Re-export commonly used types at the crate root
pub use context::CallContext;
pub use endpoint::Endpoint;
pub use error::{BoxError, InvokeError};
pub use invocation::{CALL_TYPE_KEY, CallType, Invocation, UnknownCallType};
pub use invoker::{BaseInvoker, Invoker};
pub use result::RpcResult;
pub use value::{Carrier, RawValue, raw};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use callkit_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::context::CallContext;
    pub use crate::endpoint::Endpoint;
    pub use crate::error::InvokeError;
    pub use crate::invocation::{CALL_TYPE_KEY, CallType, Invocation};
    pub use crate::invoker::{BaseInvoker, Invoker};
    pub use crate::result::RpcResult;
    pub use crate::value::{Carrier, RawValue, raw};
}
