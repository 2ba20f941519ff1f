//! The transport-backed invoker.
//!
//! [`TransportInvoker`] adapts a [`TransportClient`] to the [`Invoker`]
//! contract. It reads the call type of each invocation, dispatches it to the
//! matching client operation and wraps the outcome in an [`RpcResult`].
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► available ──► destroy() ──► destroyed
//! ```
//!
//! There is no way back from destroyed. After [`Invoker::destroy`] has
//! returned, every invocation fails fast with
//! [`InvokeError::DestroyedInvoker`] (or [`InvokeError::ClientClosed`] if it
//! raced the teardown) without touching the transport.
//!
//! # Concurrency
//!
//! The client handle sits behind a read/write lock. Invocations take the
//! read side only long enough to clone the handle, so a slow call never
//! blocks teardown; teardown takes the write side only to move the handle
//! out. The client is closed after the lock is released.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_lock::OnceCell;
use callkit_core::context::CallContext;
use callkit_core::endpoint::Endpoint;
use callkit_core::error::InvokeError;
use callkit_core::invocation::{CALL_TYPE_KEY, CallType, Invocation};
use callkit_core::invoker::{BaseInvoker, Invoker};
use callkit_core::result::RpcResult;
use callkit_transport::config::ClientConfig;
use callkit_transport::traits::{ClientFactory, TransportClient};
use tracing::{debug, info, trace, warn};

/// An [`Invoker`] that performs calls through a transport client.
pub struct TransportInvoker<C: TransportClient> {
    base: BaseInvoker,
    client: RwLock<Option<Arc<C>>>,
    destroyed: OnceCell<()>,
}

impl<C: TransportClient> TransportInvoker<C> {
    /// Build the transport client for `endpoint` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::ClientConstruction`] carrying the factory's
    /// error unchanged if the client could not be built.
    pub fn new<F>(endpoint: Endpoint, factory: &F) -> Result<Self, InvokeError>
    where
        F: ClientFactory<Client = C>,
    {
        let client = factory
            .build(&endpoint)
            .map_err(|source| construction_error(&endpoint, source))?;
        Ok(Self::from_client(endpoint, client))
    }

    /// Like [`new`](Self::new), with an explicit client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::ClientConstruction`] if the client could not
    /// be built.
    pub fn with_config<F>(
        endpoint: Endpoint,
        factory: &F,
        config: &ClientConfig,
    ) -> Result<Self, InvokeError>
    where
        F: ClientFactory<Client = C>,
    {
        let client = factory
            .build_with_config(&endpoint, config)
            .map_err(|source| construction_error(&endpoint, source))?;
        Ok(Self::from_client(endpoint, client))
    }

    /// Wrap an already-built client.
    pub fn from_client(endpoint: Endpoint, client: C) -> Self {
        debug!(%endpoint, transport = %client.metadata().transport_type, "created invoker");
        Self {
            base: BaseInvoker::new(endpoint),
            client: RwLock::new(Some(Arc::new(client))),
            destroyed: OnceCell::new(),
        }
    }

    /// The shared invoker state.
    pub const fn base(&self) -> &BaseInvoker {
        &self.base
    }

    /// The transport client, unless the invoker has released it.
    pub fn client(&self) -> Option<Arc<C>> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn has_client(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn take_client(&self) -> Option<Arc<C>> {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn dispatch(
        &self,
        client: &C,
        ctx: &CallContext,
        invocation: &Invocation,
    ) -> RpcResult {
        let call_type = call_type_of(invocation);
        check_raw_values(call_type, invocation);

        let method = invocation.method_name();
        let values = invocation.parameter_raw_values();
        trace!(
            endpoint = %self.base.endpoint(),
            method,
            %call_type,
            request_id = ctx.request_id(),
            "dispatching invocation"
        );

        match call_type {
            CallType::Unary => {
                let request = Arc::clone(&values[0]);
                let response = Arc::clone(&values[1]);
                match client.call_unary(ctx, method, request, response).await {
                    Ok(()) => RpcResult::ok(),
                    Err(err) => InvokeError::transport(err).into(),
                }
            }
            CallType::ClientStream => match client.call_client_stream(ctx, method).await {
                Ok(stream) => RpcResult::with_value(stream),
                Err(err) => InvokeError::transport(err).into(),
            },
            CallType::ServerStream => {
                let request = Arc::clone(&values[0]);
                match client.call_server_stream(ctx, method, request).await {
                    Ok(stream) => RpcResult::with_value(stream),
                    Err(err) => InvokeError::transport(err).into(),
                }
            }
            CallType::BidiStream => match client.call_bidi_stream(ctx, method).await {
                Ok(stream) => RpcResult::with_value(stream),
                Err(err) => InvokeError::transport(err).into(),
            },
        }
    }
}

impl<C: TransportClient> Invoker for TransportInvoker<C> {
    fn endpoint(&self) -> &Endpoint {
        self.base.endpoint()
    }

    fn is_available(&self) -> bool {
        self.has_client() && self.base.is_available()
    }

    /// True only when the base has been marked destroyed and the client is
    /// still held. Before teardown starts, and after it has released the
    /// client, this reports false.
    fn is_destroyed(&self) -> bool {
        self.has_client() && self.base.is_destroyed()
    }

    async fn invoke(&self, ctx: &CallContext, invocation: &Invocation) -> RpcResult {
        if !self.base.is_available() {
            warn!(
                endpoint = %self.base.endpoint(),
                method = invocation.method_name(),
                "invocation on destroyed invoker"
            );
            return InvokeError::DestroyedInvoker {
                endpoint: self.base.endpoint().to_string(),
            }
            .into();
        }

        let Some(client) = self.client() else {
            return InvokeError::ClientClosed.into();
        };

        self.dispatch(&client, ctx, invocation).await
    }

    async fn destroy(&self) {
        self.destroyed
            .get_or_init(|| async {
                self.base.destroy();
                if let Some(client) = self.take_client() {
                    match client.close().await {
                        Ok(()) => info!(endpoint = %self.base.endpoint(), "closed transport client"),
                        Err(err) => warn!(
                            endpoint = %self.base.endpoint(),
                            error = %err,
                            "failed to close transport client"
                        ),
                    }
                }
            })
            .await;
    }
}

impl<C: TransportClient> fmt::Debug for TransportInvoker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportInvoker")
            .field("endpoint", &self.base.endpoint().to_string())
            .field("available", &self.is_available())
            .field("has_client", &self.has_client())
            .finish()
    }
}

fn construction_error(
    endpoint: &Endpoint,
    source: callkit_transport::error::TransportError,
) -> InvokeError {
    warn!(%endpoint, error = %source, "failed to build transport client");
    InvokeError::ClientConstruction {
        endpoint: endpoint.to_string(),
        source: Box::new(source),
    }
}

/// Read the call type attribute. Malformed invocations panic.
fn call_type_of(invocation: &Invocation) -> CallType {
    let method = invocation.method_name();
    let Some(attribute) = invocation.attribute(CALL_TYPE_KEY) else {
        panic!("invocation of {method} has no {CALL_TYPE_KEY} attribute");
    };
    let Some(name) = attribute.as_str() else {
        panic!("{CALL_TYPE_KEY} attribute of {method} is not a string: {attribute}");
    };
    match name.parse() {
        Ok(call_type) => call_type,
        Err(err) => panic!("invocation of {method}: {err}"),
    }
}

fn check_raw_values(call_type: CallType, invocation: &Invocation) {
    let got = invocation.parameter_raw_values().len();
    match call_type.expected_raw_values() {
        Some(expected) if expected != got => panic!(
            "{call_type} invocation of {} needs {expected} parameter values, got {got}",
            invocation.method_name()
        ),
        None if got > 0 => warn!(
            method = invocation.method_name(),
            %call_type,
            ignored = got,
            "streaming invocation carries parameter values; they are not sent"
        ),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_core::value::{Carrier, raw};
    use callkit_testing::mock::{MockFactory, MockTransport};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn endpoint() -> Endpoint {
        Endpoint::parse("tri://127.0.0.1:20000/test.Greeter").unwrap()
    }

    fn invoker() -> (TransportInvoker<MockTransport>, MockFactory) {
        let factory = MockFactory::new();
        let invoker = TransportInvoker::new(endpoint(), &factory).unwrap();
        (invoker, factory)
    }

    #[test]
    fn test_new_invoker_is_available() {
        let (invoker, factory) = invoker();
        assert!(invoker.is_available());
        assert!(!invoker.is_destroyed());
        assert!(invoker.client().is_some());
        assert_eq!(invoker.endpoint(), &endpoint());
        assert_eq!(factory.state().build_count(), 1);
    }

    #[tokio::test]
    async fn test_is_destroyed_only_while_client_held() {
        let (invoker, _factory) = invoker();

        // Base torn down, client still held.
        invoker.base().destroy();
        assert!(invoker.is_destroyed());
        assert!(!invoker.is_available());

        invoker.destroy().await;
        assert!(!invoker.is_destroyed());
        assert!(!invoker.is_available());
    }

    #[tokio::test]
    async fn test_client_closed_when_handle_released() {
        let (invoker, factory) = invoker();
        let _ = invoker.take_client();

        let inv = Invocation::new("SayHello")
            .with_call_type(CallType::Unary)
            .with_raw_value(raw(json!({})))
            .with_raw_value(raw(Carrier::<Value>::new()));
        let result = invoker.invoke(&CallContext::new(), &inv).await;

        assert!(matches!(result.error(), Some(InvokeError::ClientClosed)));
        assert_eq!(factory.state().unary_calls(), 0);
    }

    #[test]
    fn test_invoke_after_destroy_resolves_on_first_poll() {
        let (invoker, factory) = invoker();
        tokio_test::block_on(invoker.destroy());

        let inv = Invocation::new("SayHello")
            .with_call_type(CallType::Unary)
            .with_raw_value(raw(json!({})))
            .with_raw_value(raw(Carrier::<Value>::new()));
        let ctx = CallContext::new();
        let mut call = tokio_test::task::spawn(invoker.invoke(&ctx, &inv));

        let result = tokio_test::assert_ready!(call.poll());
        assert!(matches!(
            result.error(),
            Some(InvokeError::DestroyedInvoker { .. })
        ));
        assert_eq!(factory.state().total_calls(), 0);
    }

    #[test]
    fn test_call_type_parsing() {
        let inv = Invocation::new("m").with_attribute(CALL_TYPE_KEY, "bidi-stream");
        assert_eq!(call_type_of(&inv), CallType::BidiStream);
    }

    #[test]
    #[should_panic(expected = "has no call-type attribute")]
    fn test_missing_call_type_panics() {
        call_type_of(&Invocation::new("m"));
    }

    #[test]
    #[should_panic(expected = "is not a string")]
    fn test_non_string_call_type_panics() {
        call_type_of(&Invocation::new("m").with_attribute(CALL_TYPE_KEY, 7));
    }

    #[test]
    #[should_panic(expected = "unknown call type: sideways")]
    fn test_unknown_call_type_panics() {
        call_type_of(&Invocation::new("m").with_attribute(CALL_TYPE_KEY, "sideways"));
    }

    #[test]
    fn test_streaming_calls_accept_any_value_count() {
        let inv = Invocation::new("m").with_raw_value(raw(1_u8));
        check_raw_values(CallType::ClientStream, &inv);
        check_raw_values(CallType::BidiStream, &Invocation::new("m"));
    }

    #[test]
    #[should_panic(expected = "needs 2 parameter values, got 1")]
    fn test_unary_arity_panics() {
        let inv = Invocation::new("m").with_raw_value(raw(1_u8));
        check_raw_values(CallType::Unary, &inv);
    }
}
