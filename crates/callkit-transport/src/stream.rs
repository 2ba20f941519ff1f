//! Stream handles for streaming calls.
//!
//! Streaming call types return a handle that the caller keeps using after
//! `invoke` has returned:
//!
//! | Call type | Handle | Caller side |
//! |-----------|--------|-------------|
//! | client-stream | [`ClientStream`] | `send` many, then `close_and_recv` once |
//! | server-stream | [`ServerStream`] | `recv` until `None` |
//! | bidi-stream | [`BidiStream`] | `send`, `recv`, `close_send` in any order |
//!
//! Each handle is created together with a transport-side peer by its
//! `channel` constructor. Transport implementations keep the peer and pump
//! messages between it and the wire.
//!
//! # Example
//!
//! ```rust
//! use callkit_core::raw;
//! use callkit_transport::stream::ServerStream;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut stream, sink) = ServerStream::channel("Watch", 8);
//! sink.send(raw(1_u32)).await.unwrap();
//! drop(sink);
//!
//! let first = stream.recv().await.unwrap().unwrap();
//! assert_eq!(first.downcast_ref::<u32>(), Some(&1));
//! assert!(stream.recv().await.unwrap().is_none());
//! # }
//! ```

use std::any::Any;
use std::fmt;

use callkit_core::value::{RawValue, raw};
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;

type Outbound = Result<RawValue, TransportError>;

// =============================================================================
// Client streaming
// =============================================================================

/// Caller side of a client-streaming call.
pub struct ClientStream {
    method: String,
    tx: mpsc::Sender<RawValue>,
    reply: oneshot::Receiver<Outbound>,
}

/// Transport side of a client-streaming call.
pub struct ClientStreamPeer {
    inbound: mpsc::Receiver<RawValue>,
    reply: oneshot::Sender<Outbound>,
}

impl ClientStream {
    /// Create a connected handle/peer pair buffering up to `capacity` messages.
    #[must_use]
    pub fn channel(method: impl Into<String>, capacity: usize) -> (Self, ClientStreamPeer) {
        let (tx, inbound) = mpsc::channel(capacity.max(1));
        let (reply_tx, reply_rx) = oneshot::channel();
        (
            Self {
                method: method.into(),
                tx,
                reply: reply_rx,
            },
            ClientStreamPeer {
                inbound,
                reply: reply_tx,
            },
        )
    }

    /// The method this stream calls.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Send one request message.
    pub async fn send(&self, msg: RawValue) -> Result<(), TransportError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Send one request message, wrapping it as a [`RawValue`].
    pub async fn send_value<T: Any + Send + Sync>(&self, msg: T) -> Result<(), TransportError> {
        self.send(raw(msg)).await
    }

    /// Finish sending and wait for the single response.
    pub async fn close_and_recv(self) -> Result<RawValue, TransportError> {
        let Self { tx, reply, .. } = self;
        drop(tx);
        reply.await.map_err(|_| TransportError::ConnectionClosed)?
    }
}

impl ClientStreamPeer {
    /// Receive the next request message; `None` once the caller has finished.
    pub async fn recv(&mut self) -> Option<RawValue> {
        self.inbound.recv().await
    }

    /// Deliver the response (or failure) to the caller.
    pub fn respond(self, result: Result<RawValue, TransportError>) {
        // The caller may have dropped its handle; nothing to deliver to.
        let _ = self.reply.send(result);
    }
}

impl fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStream")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ClientStreamPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStreamPeer").finish_non_exhaustive()
    }
}

// =============================================================================
// Server streaming
// =============================================================================

/// Caller side of a server-streaming call.
pub struct ServerStream {
    method: String,
    rx: mpsc::Receiver<Outbound>,
}

/// Transport side of a stream that delivers messages to the caller.
///
/// Used as the peer of a [`ServerStream`] and as the outbound half of a
/// [`BidiStreamPeer`]. Dropping the sink ends the stream.
#[derive(Clone)]
pub struct StreamSink {
    tx: mpsc::Sender<Outbound>,
}

impl ServerStream {
    /// Create a connected handle/sink pair buffering up to `capacity` messages.
    #[must_use]
    pub fn channel(method: impl Into<String>, capacity: usize) -> (Self, StreamSink) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                method: method.into(),
                rx,
            },
            StreamSink { tx },
        )
    }

    /// The method this stream calls.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Receive the next response message.
    ///
    /// Returns `Ok(None)` when the stream ended normally.
    pub async fn recv(&mut self) -> Result<Option<RawValue>, TransportError> {
        self.rx.recv().await.transpose()
    }
}

impl StreamSink {
    /// Deliver one message to the caller.
    pub async fn send(&self, msg: RawValue) -> Result<(), TransportError> {
        self.tx
            .send(Ok(msg))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Terminate the caller's stream with an error.
    pub async fn fail(&self, err: TransportError) {
        // A caller that dropped its handle has no use for the error.
        let _ = self.tx.send(Err(err)).await;
    }

    /// Whether the caller dropped its handle.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for ServerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStream")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// Bidirectional streaming
// =============================================================================

/// Caller side of a bidirectional-streaming call.
pub struct BidiStream {
    method: String,
    tx: Option<mpsc::Sender<RawValue>>,
    rx: mpsc::Receiver<Outbound>,
}

/// Transport side of a bidirectional-streaming call.
pub struct BidiStreamPeer {
    inbound: mpsc::Receiver<RawValue>,
    sink: StreamSink,
}

impl BidiStream {
    /// Create a connected handle/peer pair buffering up to `capacity`
    /// messages in each direction.
    #[must_use]
    pub fn channel(method: impl Into<String>, capacity: usize) -> (Self, BidiStreamPeer) {
        let (req_tx, req_rx) = mpsc::channel(capacity.max(1));
        let (resp_tx, resp_rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                method: method.into(),
                tx: Some(req_tx),
                rx: resp_rx,
            },
            BidiStreamPeer {
                inbound: req_rx,
                sink: StreamSink { tx: resp_tx },
            },
        )
    }

    /// The method this stream calls.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Send one request message.
    pub async fn send(&self, msg: RawValue) -> Result<(), TransportError> {
        let Some(tx) = &self.tx else {
            return Err(TransportError::protocol("send after close_send"));
        };
        tx.send(msg)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Send one request message, wrapping it as a [`RawValue`].
    pub async fn send_value<T: Any + Send + Sync>(&self, msg: T) -> Result<(), TransportError> {
        self.send(raw(msg)).await
    }

    /// Signal that no more requests will be sent.
    pub fn close_send(&mut self) {
        self.tx = None;
    }

    /// Receive the next response message; `Ok(None)` at end of stream.
    pub async fn recv(&mut self) -> Result<Option<RawValue>, TransportError> {
        self.rx.recv().await.transpose()
    }
}

impl BidiStreamPeer {
    /// Receive the next request; `None` once the caller closed its send side.
    pub async fn recv(&mut self) -> Option<RawValue> {
        self.inbound.recv().await
    }

    /// The outbound half.
    #[must_use]
    pub fn sink(&self) -> &StreamSink {
        &self.sink
    }

    /// Split into the inbound receiver and the outbound sink so both
    /// directions can be driven concurrently.
    #[must_use]
    pub fn split(self) -> (mpsc::Receiver<RawValue>, StreamSink) {
        (self.inbound, self.sink)
    }
}

impl fmt::Debug for BidiStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidiStream")
            .field("method", &self.method)
            .field("send_closed", &self.tx.is_none())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for BidiStreamPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidiStreamPeer")
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}
