//! Middleware interaction tests.
//!
//! Tests verifying correct behavior when layers are composed on top of the
//! in-memory transport.

use std::time::Duration;

use callkit_core::{CallContext, Carrier, Endpoint, raw};
use callkit_transport::memory::{MemoryNetwork, MemoryService};
use callkit_transport::middleware::{IdentityLayer, LayerStack, Layered, LoggingLayer, TimeoutLayer};
use callkit_transport::{ClientConfig, ClientFactory, TransportClient, TransportError};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tracing::Level;

const ADDRESS: &str = "127.0.0.1:20000";

fn network() -> MemoryNetwork {
    let network = MemoryNetwork::new();
    network.bind(
        ADDRESS,
        MemoryService::new()
            .unary("Echo", |req| async move { Ok(req) })
            .unary("Slow", |req| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(req)
            })
            .server_stream("Range", |req| {
                let n = req.as_u64().unwrap_or_default();
                futures::stream::iter((0..n).map(|i| Ok(json!(i))))
            }),
    );
    network
}

fn endpoint() -> Endpoint {
    Endpoint::parse(&format!("tri://{ADDRESS}/test.Svc")).unwrap()
}

async fn echo<C: TransportClient>(client: &C, method: &str) -> Result<Value, C::Error> {
    let reply: Carrier<Value> = Carrier::new();
    client
        .call_unary(&CallContext::new(), method, raw(json!("ping")), raw(reply.clone()))
        .await?;
    Ok(reply.take().unwrap_or_default())
}

// =============================================================================
// Layer Composition Tests
// =============================================================================

#[test]
fn test_identity_layer_composition() {
    let client = network().build(&endpoint()).unwrap();

    let stack = LayerStack::new(client)
        .with(IdentityLayer)
        .with(IdentityLayer)
        .with(IdentityLayer);

    assert!(stack.into_inner().is_connected());
}

#[tokio::test]
async fn test_stacked_layers_pass_calls_through() {
    let client = network().build(&endpoint()).unwrap();
    let stack = LayerStack::new(client)
        .with(TimeoutLayer::new(Duration::from_secs(5)))
        .with(LoggingLayer::new(Level::DEBUG));
    let client = stack.into_inner();

    assert_eq!(echo(&client, "Echo").await.unwrap(), json!("ping"));
    assert_eq!(client.calls(), 1);
    assert_eq!(client.inner().timeout(), Duration::from_secs(5));
}

#[tokio::test]
async fn test_layered_factory_applies_timeout() {
    let factory = Layered::new(network(), TimeoutLayer::new(Duration::from_millis(20)))
        .with(LoggingLayer::default());
    let client = factory.build(&endpoint()).unwrap();

    let err = echo(&client, "Slow").await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { .. }));
    assert_eq!(client.failures(), 1);
}

#[tokio::test]
async fn test_layered_factory_forwards_config() {
    let factory = Layered::new(network(), IdentityLayer);
    let client = factory
        .build_with_config(&endpoint(), &ClientConfig::new().stream_buffer(2))
        .unwrap();
    assert_eq!(client.config().stream_buffer, 2);

    let mut stream = client
        .call_server_stream(&CallContext::new(), "Range", raw(json!(5)))
        .await
        .unwrap();
    let mut seen = 0;
    while let Some(msg) = stream.recv().await.unwrap() {
        assert_eq!(msg.downcast_ref::<Value>(), Some(&json!(seen)));
        seen += 1;
    }
    assert_eq!(seen, 5);
}

#[tokio::test]
async fn test_close_through_layers() {
    let client = LayerStack::new(network().build(&endpoint()).unwrap())
        .with(TimeoutLayer::default())
        .with(LoggingLayer::default())
        .into_inner();

    client.close().await.unwrap();
    assert!(!client.is_connected());
    assert_eq!(
        echo(&client, "Echo").await.unwrap_err(),
        TransportError::NotConnected
    );
}

#[tokio::test]
async fn test_unbound_service_reports_connection_error() {
    let network = network();
    assert!(network.unbind(ADDRESS));
    let factory = Layered::new(network, LoggingLayer::default());
    assert!(matches!(
        factory.build(&endpoint()),
        Err(TransportError::Connection { .. })
    ));
}

#[tokio::test]
async fn test_handler_sees_request_stream() {
    let network = MemoryNetwork::new();
    network.bind(
        ADDRESS,
        MemoryService::new().client_stream("Join", |reqs| async move {
            let parts: Vec<String> = reqs
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect()
                .await;
            Ok(json!(parts.join(" ")))
        }),
    );
    let client = LayerStack::new(network.build(&endpoint()).unwrap())
        .with(LoggingLayer::default())
        .into_inner();

    let stream = client
        .call_client_stream(&CallContext::new(), "Join")
        .await
        .unwrap();
    stream.send_value(json!("hello")).await.unwrap();
    stream.send_value(json!("world")).await.unwrap();
    let reply = stream.close_and_recv().await.unwrap();
    assert_eq!(reply.downcast_ref::<Value>(), Some(&json!("hello world")));
}
