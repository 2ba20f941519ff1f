//! Prelude module for convenient imports.
//!
//! ```rust
//! use callkit::prelude::*;
//!
//! let invocation = Invocation::new("SayHello").with_call_type(CallType::Unary);
//! assert_eq!(invocation.method_name(), "SayHello");
//! ```
//!
//! ## Included Types
//!
//! - Core types: [`Invocation`], [`RpcResult`], [`CallContext`], [`Endpoint`]
//!   and the [`Invoker`] trait
//! - Client types: [`TransportInvoker`], [`InvokerBuilder`], [`InvokerRegistry`]
//! - Transport types: client traits, stream handles, middleware and the
//!   memory transport

// Core types
pub use callkit_core::prelude::*;

// Client types
pub use callkit_client::prelude::*;

// Transport types
pub use callkit_transport::prelude::*;
