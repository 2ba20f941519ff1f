//! Transport abstractions for callkit.
//!
//! This crate defines what an invoker needs from the layer that actually
//! moves messages, and ships an in-process implementation of it.
//!
//! # Overview
//!
//! - [`TransportClient`]: performs unary, client-stream, server-stream and
//!   bidi-stream calls, and can be closed
//! - [`ClientFactory`]: builds a client for an endpoint
//! - [`stream`]: the stream handles streaming calls return
//! - [`middleware`]: composable layers (logging, timeouts)
//! - [`ClientConfig`]: per-client settings, readable from endpoint parameters
//!
//! # Available Transports
//!
//! | Transport | Use Case |
//! |-----------|----------|
//! | [`memory::MemoryTransport`] | Testing and in-process services |
//!
//! # Example
//!
//! ```rust
//! use callkit_core::Endpoint;
//! use callkit_transport::memory::{MemoryNetwork, MemoryService};
//! use callkit_transport::{ClientFactory, TransportClient};
//!
//! let network = MemoryNetwork::new();
//! network.bind("127.0.0.1:20000", MemoryService::new());
//!
//! let endpoint = Endpoint::parse("tri://127.0.0.1:20000/greet.Greeter").unwrap();
//! let client = network.build(&endpoint).unwrap();
//! assert!(client.is_connected());
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod memory;
pub mod middleware;
pub mod stream;
pub mod traits;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{TransportError, TransportErrorKind};
pub use memory::{MemoryNetwork, MemoryService, MemoryTransport};
pub use stream::{BidiStream, ClientStream, ServerStream, StreamSink};
pub use traits::{ClientFactory, TransportClient, TransportMetadata};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::ClientConfig;
    pub use crate::error::TransportError;
    pub use crate::memory::{MemoryNetwork, MemoryService, MemoryTransport};
    pub use crate::middleware::{
        IdentityLayer, LayerStack, Layered, LoggingLayer, TimeoutLayer, TransportLayer,
    };
    pub use crate::stream::{BidiStream, ClientStream, ServerStream};
    pub use crate::traits::{ClientFactory, TransportClient, TransportMetadata};
}
