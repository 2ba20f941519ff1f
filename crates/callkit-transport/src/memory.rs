//! In-memory transport for testing.
//!
//! This module provides a transport that serves calls from handlers
//! registered in the same process. It's primarily useful for testing
//! invokers and callers without network overhead.
//!
//! - [`MemoryService`] routes method names to handlers
//! - [`MemoryNetwork`] binds services to addresses and builds clients
//! - [`MemoryTransport`] is the client the network builds
//!
//! Messages are [`serde_json::Value`]s. Unary calls expect the response
//! parameter to be a [`Carrier<Value>`].
//!
//! # Example
//!
//! ```rust
//! use callkit_core::{CallContext, Carrier, Endpoint, raw};
//! use callkit_transport::memory::{MemoryNetwork, MemoryService};
//! use callkit_transport::{ClientFactory, TransportClient};
//! use serde_json::{Value, json};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let network = MemoryNetwork::new();
//! network.bind(
//!     "127.0.0.1:20000",
//!     MemoryService::new().unary("SayHello", |req: Value| async move {
//!         Ok(json!({ "greeting": format!("hello {}", req["name"].as_str().unwrap_or("?")) }))
//!     }),
//! );
//!
//! let endpoint = Endpoint::parse("tri://127.0.0.1:20000/greet.Greeter").unwrap();
//! let client = network.build(&endpoint).unwrap();
//!
//! let reply: Carrier<Value> = Carrier::new();
//! client
//!     .call_unary(&CallContext::new(), "SayHello", raw(json!({ "name": "ada" })), raw(reply.clone()))
//!     .await
//!     .unwrap();
//! assert_eq!(reply.take(), Some(json!({ "greeting": "hello ada" })));
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use callkit_core::context::CallContext;
use callkit_core::endpoint::Endpoint;
use callkit_core::invocation::CallType;
use callkit_core::value::{Carrier, RawValue, raw};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::stream::{BidiStream, ClientStream, ServerStream};
use crate::traits::{ClientFactory, TransportClient, TransportMetadata};

/// Protocols the memory network accepts.
pub const MEMORY_PROTOCOLS: &[&str] = &["tri", "mem"];

/// Request messages handed to streaming handlers.
pub type Requests = BoxStream<'static, Value>;

type Reply = BoxFuture<'static, Result<Value, TransportError>>;
type Replies = BoxStream<'static, Result<Value, TransportError>>;

#[derive(Clone)]
enum Route {
    Unary(Arc<dyn Fn(Value) -> Reply + Send + Sync>),
    ClientStream(Arc<dyn Fn(Requests) -> Reply + Send + Sync>),
    ServerStream(Arc<dyn Fn(Value) -> Replies + Send + Sync>),
    BidiStream(Arc<dyn Fn(Requests) -> Replies + Send + Sync>),
}

impl Route {
    const fn call_type(&self) -> CallType {
        match self {
            Self::Unary(_) => CallType::Unary,
            Self::ClientStream(_) => CallType::ClientStream,
            Self::ServerStream(_) => CallType::ServerStream,
            Self::BidiStream(_) => CallType::BidiStream,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// A set of method handlers served by a [`MemoryNetwork`].
///
/// Handlers report failures as [`TransportError`]s; use
/// [`TransportError::remote`] for application errors.
#[derive(Clone, Default)]
pub struct MemoryService {
    routes: HashMap<String, Route>,
}

impl MemoryService {
    /// Create a service with no methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unary method.
    #[must_use]
    pub fn unary<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        let handler: Arc<dyn Fn(Value) -> Reply + Send + Sync> =
            Arc::new(move |req| handler(req).boxed());
        self.routes.insert(method.into(), Route::Unary(handler));
        self
    }

    /// Register a client-streaming method.
    #[must_use]
    pub fn client_stream<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Requests) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        let handler: Arc<dyn Fn(Requests) -> Reply + Send + Sync> =
            Arc::new(move |reqs| handler(reqs).boxed());
        self.routes.insert(method.into(), Route::ClientStream(handler));
        self
    }

    /// Register a server-streaming method.
    #[must_use]
    pub fn server_stream<F, S>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Value, TransportError>> + Send + 'static,
    {
        let handler: Arc<dyn Fn(Value) -> Replies + Send + Sync> =
            Arc::new(move |req| handler(req).boxed());
        self.routes.insert(method.into(), Route::ServerStream(handler));
        self
    }

    /// Register a bidirectional-streaming method.
    #[must_use]
    pub fn bidi_stream<F, S>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Requests) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Value, TransportError>> + Send + 'static,
    {
        let handler: Arc<dyn Fn(Requests) -> Replies + Send + Sync> =
            Arc::new(move |reqs| handler(reqs).boxed());
        self.routes.insert(method.into(), Route::BidiStream(handler));
        self
    }

    /// The call type a method was registered with.
    #[must_use]
    pub fn call_type(&self, method: &str) -> Option<CallType> {
        self.routes.get(method).map(Route::call_type)
    }

    /// Names of all registered methods.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    fn handler<H>(
        &self,
        method: &str,
        expected: CallType,
        pick: impl FnOnce(&Route) -> Option<H>,
    ) -> Result<H, TransportError> {
        let route = self
            .routes
            .get(method)
            .ok_or_else(|| TransportError::Unimplemented {
                method: method.to_string(),
            })?;
        pick(route).ok_or_else(|| {
            TransportError::protocol(format!(
                "{method} is a {} method, called as {expected}",
                route.call_type()
            ))
        })
    }
}

impl fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods().collect();
        methods.sort_unstable();
        f.debug_struct("MemoryService")
            .field("methods", &methods)
            .finish()
    }
}

// =============================================================================
// Network
// =============================================================================

/// An in-process registry of services keyed by address.
///
/// Cloning the network shares the registry.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    services: Arc<RwLock<HashMap<String, Arc<MemoryService>>>>,
    config: ClientConfig,
}

impl MemoryNetwork {
    /// Create an empty network with the default client configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` as the base configuration for clients built by
    /// [`ClientFactory::build`].
    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve `service` at `address`, replacing any service already there.
    pub fn bind(&self, address: impl Into<String>, service: MemoryService) {
        let address = address.into();
        debug!(%address, ?service, "binding memory service");
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, Arc::new(service));
    }

    /// Stop serving `address`. Returns whether a service was bound.
    ///
    /// Clients already built keep their service.
    pub fn unbind(&self, address: &str) -> bool {
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(address)
            .is_some()
    }

    /// Whether a service is bound at `address`.
    #[must_use]
    pub fn is_bound(&self, address: &str) -> bool {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }

    fn lookup(&self, endpoint: &Endpoint) -> Result<Arc<MemoryService>, TransportError> {
        if !MEMORY_PROTOCOLS.contains(&endpoint.protocol()) {
            return Err(TransportError::protocol(format!(
                "unsupported protocol: {}",
                endpoint.protocol()
            )));
        }
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint.address())
            .cloned()
            .ok_or_else(|| {
                TransportError::connection(format!("no service bound at {}", endpoint.address()))
            })
    }
}

impl ClientFactory for MemoryNetwork {
    type Client = MemoryTransport;

    fn build(&self, endpoint: &Endpoint) -> Result<Self::Client, TransportError> {
        let config = self.config.clone().apply_endpoint(endpoint)?;
        self.build_with_config(endpoint, &config)
    }

    fn build_with_config(
        &self,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<Self::Client, TransportError> {
        let service = self.lookup(endpoint)?;
        debug!(%endpoint, "connected memory transport");
        Ok(MemoryTransport::new(endpoint, service, config.clone()))
    }
}

impl fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let services = self.services.read().unwrap_or_else(PoisonError::into_inner);
        let mut addresses: Vec<_> = services.keys().cloned().collect();
        addresses.sort_unstable();
        f.debug_struct("MemoryNetwork")
            .field("addresses", &addresses)
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A client connected to a [`MemoryService`].
pub struct MemoryTransport {
    service: Arc<MemoryService>,
    config: ClientConfig,
    connected: AtomicBool,
    shutdown: CancellationToken,
    metadata: TransportMetadata,
}

impl MemoryTransport {
    fn new(endpoint: &Endpoint, service: Arc<MemoryService>, config: ClientConfig) -> Self {
        let metadata = TransportMetadata::new("memory")
            .remote_addr(endpoint.address())
            .connected_now()
            .custom(serde_json::json!({
                "service": endpoint.service(),
                "metadata": config.metadata,
            }));
        Self {
            service,
            config,
            connected: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            metadata,
        }
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Channel capacity for stream pumps, at least one.
    fn stream_buffer(&self) -> usize {
        self.config.stream_buffer.max(1)
    }

    fn begin(&self, ctx: &CallContext, method: &str) -> Result<CallGuard, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let guard = CallGuard {
            operation: method.to_string(),
            cancellation: ctx.cancellation_token().clone(),
            shutdown: self.shutdown.clone(),
            started: tokio::time::Instant::now(),
            budget: ctx.remaining().or(self.config.request_timeout),
        };
        guard.check()?;
        trace!(method, request_id = ctx.request_id(), "memory call");
        Ok(guard)
    }
}

impl TransportClient for MemoryTransport {
    type Error = TransportError;

    async fn call_unary(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
        response: RawValue,
    ) -> Result<(), Self::Error> {
        let guard = self.begin(ctx, method)?;
        let handler = self.service.handler(method, CallType::Unary, |route| match route {
            Route::Unary(h) => Some(Arc::clone(h)),
            _ => None,
        })?;

        let request = decode(&request)?;
        let carrier = response
            .downcast_ref::<Carrier<Value>>()
            .cloned()
            .ok_or_else(|| {
                TransportError::invalid_message("unary response must be a Carrier<serde_json::Value>")
            })?;

        let reply = guard.run(handler(request)).await?;
        carrier.fill(reply);
        Ok(())
    }

    async fn call_client_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<ClientStream, Self::Error> {
        let guard = self.begin(ctx, method)?;
        let handler = self
            .service
            .handler(method, CallType::ClientStream, |route| match route {
                Route::ClientStream(h) => Some(Arc::clone(h)),
                _ => None,
            })?;

        let buffer = self.stream_buffer();
        let (stream, mut peer) = ClientStream::channel(method, buffer);
        let (tx, rx) = mpsc::channel(buffer);
        let reply = handler(requests(rx));

        tokio::spawn(async move {
            let result = {
                let inbound = &mut peer;
                let forward = async move {
                    while let Some(msg) = inbound.recv().await {
                        if tx.send(decode(&msg)?).await.is_err() {
                            break;
                        }
                    }
                    Ok::<(), TransportError>(())
                };
                guard.run(drive(forward, reply)).await
            };
            if let Err(err) = &result {
                debug!(
                    method = %guard.operation,
                    kind = %err.kind(),
                    error = %err,
                    "client stream failed"
                );
            }
            peer.respond(result.map(raw));
        });

        Ok(stream)
    }

    async fn call_server_stream(
        &self,
        ctx: &CallContext,
        method: &str,
        request: RawValue,
    ) -> Result<ServerStream, Self::Error> {
        let guard = self.begin(ctx, method)?;
        let handler = self
            .service
            .handler(method, CallType::ServerStream, |route| match route {
                Route::ServerStream(h) => Some(Arc::clone(h)),
                _ => None,
            })?;

        let mut replies = handler(decode(&request)?);
        let (stream, sink) = ServerStream::channel(method, self.stream_buffer());

        tokio::spawn(async move {
            let outbound = async {
                while let Some(item) = replies.next().await {
                    sink.send(raw(item?)).await?;
                }
                Ok::<(), TransportError>(())
            };
            if let Err(err) = guard.run(outbound).await {
                debug!(
                    method = %guard.operation,
                    kind = %err.kind(),
                    error = %err,
                    "server stream failed"
                );
                sink.fail(err).await;
            }
        });

        Ok(stream)
    }

    async fn call_bidi_stream(
        &self,
        ctx: &CallContext,
        method: &str,
    ) -> Result<BidiStream, Self::Error> {
        let guard = self.begin(ctx, method)?;
        let handler = self
            .service
            .handler(method, CallType::BidiStream, |route| match route {
                Route::BidiStream(h) => Some(Arc::clone(h)),
                _ => None,
            })?;

        let buffer = self.stream_buffer();
        let (stream, peer) = BidiStream::channel(method, buffer);
        let (mut inbound, sink) = peer.split();
        let (tx, rx) = mpsc::channel(buffer);
        let mut replies = handler(requests(rx));

        tokio::spawn(async move {
            let forward = async move {
                while let Some(msg) = inbound.recv().await {
                    if tx.send(decode(&msg)?).await.is_err() {
                        break;
                    }
                }
                Ok::<(), TransportError>(())
            };
            let outbound = async {
                while let Some(item) = replies.next().await {
                    sink.send(raw(item?)).await?;
                }
                Ok::<(), TransportError>(())
            };
            if let Err(err) = guard.run(drive(forward, outbound)).await {
                debug!(
                    method = %guard.operation,
                    kind = %err.kind(),
                    error = %err,
                    "bidi stream failed"
                );
                sink.fail(err).await;
            }
        });

        Ok(stream)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(
                remote = self.metadata.remote_addr.as_deref().unwrap_or_default(),
                "closing memory transport"
            );
            self.shutdown.cancel();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> TransportMetadata {
        self.metadata.clone()
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("service", &self.service)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Call plumbing
// =============================================================================

/// Bounds one call by the caller's cancellation, the transport's shutdown
/// and the call deadline.
struct CallGuard {
    operation: String,
    cancellation: CancellationToken,
    shutdown: CancellationToken,
    started: tokio::time::Instant,
    budget: Option<Duration>,
}

impl CallGuard {
    fn check(&self) -> Result<(), TransportError> {
        if self.cancellation.is_cancelled() {
            return Err(self.cancelled());
        }
        if self.budget.is_some_and(|b| b.is_zero()) {
            return Err(self.timed_out());
        }
        Ok(())
    }

    async fn run<T>(
        &self,
        work: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        let deadline = async {
            match self.budget {
                Some(budget) => tokio::time::sleep_until(self.started + budget).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(self.cancelled()),
            () = self.shutdown.cancelled() => Err(TransportError::ConnectionClosed),
            () = deadline => Err(self.timed_out()),
            result = work => result,
        }
    }

    fn cancelled(&self) -> TransportError {
        TransportError::Cancelled {
            operation: self.operation.clone(),
        }
    }

    fn timed_out(&self) -> TransportError {
        TransportError::Timeout {
            operation: self.operation.clone(),
            duration: self.budget.unwrap_or_default(),
        }
    }
}

/// Run a request forwarder alongside the work it feeds until the work
/// finishes. A forwarder error aborts the call.
async fn drive<T>(
    forward: impl Future<Output = Result<(), TransportError>>,
    work: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::pin!(forward);
    tokio::pin!(work);
    let mut forwarding = true;
    loop {
        tokio::select! {
            result = &mut forward, if forwarding => {
                result?;
                forwarding = false;
            }
            output = &mut work => return output,
        }
    }
}

fn requests(rx: mpsc::Receiver<Value>) -> Requests {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|msg| (msg, rx)) }).boxed()
}

fn decode(msg: &RawValue) -> Result<Value, TransportError> {
    msg.downcast_ref::<Value>()
        .cloned()
        .ok_or_else(|| TransportError::invalid_message("expected a serde_json::Value message"))
}
