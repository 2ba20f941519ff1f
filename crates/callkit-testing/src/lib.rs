//! Testing utilities for callkit.
//!
//! This crate provides mocks, fixtures, and assertions for testing invokers
//! and transports. It includes:
//!
//! - A scriptable mock transport and factory that record every call
//! - Fixture invocations and an in-memory greeter service
//! - Assertions over [`RpcResult`](callkit_core::RpcResult)s
//!
//! # Overview
//!
//! ## Mock Transport
//!
//! ```rust
//! use callkit_testing::mock::MockFactory;
//! use callkit_transport::traits::ClientFactory;
//!
//! let factory = MockFactory::new();
//! let _client = factory.build(&callkit_testing::fixtures::test_endpoint()).unwrap();
//! assert_eq!(factory.state().build_count(), 1);
//! ```
//!
//! ## Assertions
//!
//! ```rust
//! use callkit_testing::assert_invoke_error;
//! use callkit_core::{InvokeError, RpcResult};
//!
//! let result = RpcResult::from_error(InvokeError::ClientClosed);
//! assert_invoke_error!(result, InvokeError::ClientClosed);
//! ```

#![deny(missing_docs)]

pub mod assertions;
pub mod async_helpers;
pub mod fixtures;
pub mod mock;

// Re-export commonly used types
pub use assertions::{assert_invoke_ok, assert_transport_error, assert_unavailable, take_stream};
pub use fixtures::{memory_network, test_endpoint};
pub use mock::{MockFactory, MockState, MockTransport};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assertions::{
        assert_invoke_ok, assert_transport_error, assert_unavailable, take_stream,
    };
    pub use crate::async_helpers::{with_default_timeout, with_timeout};
    pub use crate::fixtures::{
        bidi_stream_invocation, client_stream_invocation, memory_network, server_stream_invocation,
        test_endpoint, unary_invocation,
    };
    pub use crate::mock::{MockFactory, MockState, MockTransport};
}
