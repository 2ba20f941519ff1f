//! Mock transport for testing invokers.
//!
//! [`MockFactory`] builds [`MockTransport`]s that share one [`MockState`].
//! The state counts builds, closes and calls, records every call, can be
//! told to fail, and hands out the transport side of streams the mock
//! opened.
//!
//! ```rust
//! use callkit_testing::mock::MockFactory;
//! use callkit_transport::ClientFactory;
//!
//! let factory = MockFactory::new();
//! let _client = factory.build(&callkit_testing::fixtures::test_endpoint()).unwrap();
//! assert_eq!(factory.state().build_count(), 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use callkit_core::context::CallContext;
use callkit_core::endpoint::Endpoint;
use callkit_core::invocation::CallType;
use callkit_core::value::{Carrier, RawValue};
use callkit_transport::config::ClientConfig;
use callkit_transport::error::TransportError;
use callkit_transport::stream::{
    BidiStream, BidiStreamPeer, ClientStream, ClientStreamPeer, ServerStream, StreamSink,
};
use callkit_transport::traits::{ClientFactory, TransportClient, TransportMetadata};
use serde_json::Value;
use tokio::sync::Semaphore;

const DEFAULT_STREAM_BUFFER: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A call observed by a [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The kind of call.
    pub call_type: CallType,
    /// The method called.
    pub method: String,
    /// The request id of the call context.
    pub request_id: String,
}

/// State shared by a [`MockFactory`] and every transport it built.
#[derive(Debug, Default)]
pub struct MockState {
    builds: AtomicUsize,
    closes: AtomicUsize,
    unary: AtomicUsize,
    client_stream: AtomicUsize,
    server_stream: AtomicUsize,
    bidi_stream: AtomicUsize,
    fail_builds: AtomicBool,
    fail_close: AtomicBool,
    call_error: Mutex<Option<TransportError>>,
    close_delay: Mutex<Option<Duration>>,
    unary_reply: Mutex<Option<Value>>,
    unary_gate: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Vec<RecordedCall>>,
    client_stream_peers: Mutex<Vec<ClientStreamPeer>>,
    server_stream_sinks: Mutex<Vec<StreamSink>>,
    bidi_stream_peers: Mutex<Vec<BidiStreamPeer>>,
}

impl MockState {
    /// Create fresh shared state.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of clients built.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of `close` calls across all clients.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of unary calls.
    pub fn unary_calls(&self) -> usize {
        self.unary.load(Ordering::SeqCst)
    }

    /// Number of client-streaming calls.
    pub fn client_stream_calls(&self) -> usize {
        self.client_stream.load(Ordering::SeqCst)
    }

    /// Number of server-streaming calls.
    pub fn server_stream_calls(&self) -> usize {
        self.server_stream.load(Ordering::SeqCst)
    }

    /// Number of bidi-streaming calls.
    pub fn bidi_stream_calls(&self) -> usize {
        self.bidi_stream.load(Ordering::SeqCst)
    }

    /// Number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.unary_calls()
            + self.client_stream_calls()
            + self.server_stream_calls()
            + self.bidi_stream_calls()
    }

    /// Every call observed so far, in order.
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Make the factory fail (or stop failing) to build clients.
    pub fn fail_builds(&self, fail: bool) {
        self.fail_builds.store(fail, Ordering::SeqCst);
    }

    /// Make `close` report an error.
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Make every call fail with `error`, or succeed again with `None`.
    pub fn fail_calls_with(&self, error: Option<TransportError>) {
        *lock(&self.call_error) = error;
    }

    /// Make `close` take `delay` before returning.
    pub fn close_delay(&self, delay: Duration) {
        *lock(&self.close_delay) = Some(delay);
    }

    /// Reply to unary calls with `reply` instead of echoing the request.
    pub fn reply_with(&self, reply: Value) {
        *lock(&self.unary_reply) = Some(reply);
    }

    /// Park unary calls after they are recorded, until
    /// [`release_unary_calls`](Self::release_unary_calls).
    pub fn hold_unary_calls(&self) {
        *lock(&self.unary_gate) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let parked unary calls finish.
    pub fn release_unary_calls(&self) {
        if let Some(gate) = lock(&self.unary_gate).take() {
            gate.close();
        }
    }

    /// Take the transport side of the oldest open client stream.
    pub fn take_client_stream_peer(&self) -> Option<ClientStreamPeer> {
        let mut peers = lock(&self.client_stream_peers);
        (!peers.is_empty()).then(|| peers.remove(0))
    }

    /// Take the transport side of the oldest open server stream.
    pub fn take_server_stream_sink(&self) -> Option<StreamSink> {
        let mut sinks = lock(&self.server_stream_sinks);
        (!sinks.is_empty()).then(|| sinks.remove(0))
    }

    /// Take the transport side of the oldest open bidi stream.
    pub fn take_bidi_stream_peer(&self) -> Option<BidiStreamPeer> {
        let mut peers = lock(&self.bidi_stream_peers);
        (!peers.is_empty()).then(|| peers.remove(0))
    }

    fn record(&self, call_type: CallType, ctx: &CallContext, method: &str) -> Result<(), TransportError> {
        let counter = match call_type {
            CallType::Unary => &self.unary,
            CallType::ClientStream => &self.client_stream,
            CallType::ServerStream => &self.server_stream,
            CallType::BidiStream => &self.bidi_stream,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(RecordedCall {
            call_type,
            method: method.to_string(),
            request_id: ctx.request_id().to_string(),
        });
        lock(&self.call_error).clone().map_or(Ok(()), Err)
    }
}

/// A transport client that records calls instead of performing them.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<MockState>,
    endpoint: Endpoint,
    config: Option<ClientConfig>,
    connected: AtomicBool,
}

impl MockTransport {
    /// Create a standalone mock with its own state.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_state(endpoint, MockState::shared(), None)
    }

    fn with_state(endpoint: Endpoint, state: Arc<MockState>, config: Option<ClientConfig>) -> Self {
        Self {
            state,
            endpoint,
            config,
            connected: AtomicBool::new(true),
        }
    }

    /// The shared state.
    #[must_use]
    pub const fn state(&self) -> &Arc<MockState> {
        &self.state
    }

    /// The endpoint this client was built for.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The explicit configuration, if the client was built with one.
    #[must_use]
    pub const fn config(&self) -> Option<&ClientConfig> {
        self.config.as_ref()
    }

    fn stream_buffer(&self) -> usize {
        self.config
            .as_ref()
            .map_or(DEFAULT_STREAM_BUFFER, |c| c.stream_buffer)
    }

    fn begin(&self, call_type: CallType, ctx: &CallContext, method: &str) -> Result<(), TransportError> {
        self.state.record(call_type, ctx, method)?;
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

impl TransportClient for MockTransport {
    type Error = TransportError;

    async fn call_unary(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
        response: RawValue,
    ) -> Result<(), Self::Error> {
        self.begin(CallType::Unary, ctx, method)?;
        let gate = lock(&self.state.unary_gate).clone();
        if let Some(gate) = gate {
            // A closed gate fails the acquire, which is the release signal.
            let _ = gate.acquire().await;
        }
        if let Some(carrier) = response.downcast_ref::<Carrier<Value>>() {
            let reply = lock(&self.state.unary_reply)
                .clone()
                .or_else(|| request.downcast_ref::<Value>().cloned())
                .unwrap_or_default();
            carrier.fill(reply);
        }
        Ok(())
    }

    async fn call_client_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<ClientStream, Self::Error> {
        self.begin(CallType::ClientStream, ctx, method)?;
        let (stream, peer) = ClientStream::channel(method, self.stream_buffer());
        lock(&self.state.client_stream_peers).push(peer);
        Ok(stream)
    }

    async fn call_server_stream(
        &self,
        ctx: &CallContext,
        method: &str,
        _request: RawValue,
    ) -> Result<ServerStream, Self::Error> {
        self.begin(CallType::ServerStream, ctx, method)?;
        let (stream, sink) = ServerStream::channel(method, self.stream_buffer());
        lock(&self.state.server_stream_sinks).push(sink);
        Ok(stream)
    }

    async fn call_bidi_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<BidiStream, Self::Error> {
        self.begin(CallType::BidiStream, ctx, method)?;
        let (stream, peer) = BidiStream::channel(method, self.stream_buffer());
        lock(&self.state.bidi_stream_peers).push(peer);
        Ok(stream)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.state.close_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.connected.store(false, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::connection("mock close failure"));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("mock").remote_addr(self.endpoint.address())
    }
}

/// A factory producing [`MockTransport`]s that share one [`MockState`].
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    state: Arc<MockState>,
}

impl MockFactory {
    /// Create a factory with fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared state.
    #[must_use]
    pub const fn state(&self) -> &Arc<MockState> {
        &self.state
    }

    fn make(
        &self,
        endpoint: &Endpoint,
        config: Option<ClientConfig>,
    ) -> Result<MockTransport, TransportError> {
        self.state.builds.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_builds.load(Ordering::SeqCst) {
            return Err(TransportError::connection(format!(
                "mock cannot reach {}",
                endpoint.address()
            )));
        }
        Ok(MockTransport::with_state(
            endpoint.clone(),
            Arc::clone(&self.state),
            config,
        ))
    }
}

impl ClientFactory for MockFactory {
    type Client = MockTransport;

    fn build(&self, endpoint: &Endpoint) -> Result<Self::Client, TransportError> {
        self.make(endpoint, None)
    }

    fn build_with_config(
        &self,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<Self::Client, TransportError> {
        self.make(endpoint, Some(config.clone()))
    }
}
