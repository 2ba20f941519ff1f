//! Lifecycle tests for the transport invoker.
//!
//! These exercise construction, dispatch, teardown and the interaction
//! between in-flight calls and teardown.

use std::sync::Arc;
use std::time::Duration;

use callkit_client::TransportInvoker;
use callkit_core::prelude::*;
use callkit_testing::assert_invoke_error;
use callkit_testing::async_helpers::{DEFAULT_TIMEOUT, wait_for};
use callkit_testing::prelude::*;
use callkit_transport::error::TransportError;
use callkit_transport::stream::{BidiStream, ClientStream, ServerStream};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn mock_invoker() -> (TransportInvoker<MockTransport>, MockFactory) {
    let factory = MockFactory::new();
    let invoker = TransportInvoker::new(test_endpoint(), &factory).unwrap();
    (invoker, factory)
}

#[tokio::test]
async fn test_unary_then_destroy_then_unary() {
    let (invoker, factory) = mock_invoker();
    let ctx = CallContext::new();

    let (inv, reply) = unary_invocation("SayHello", json!({ "name": "ada" }));
    assert_invoke_ok(&invoker.invoke(&ctx, &inv).await);
    assert_eq!(reply.take(), Some(json!({ "name": "ada" })));

    invoker.destroy().await;
    assert!(!invoker.is_available());
    assert!(!invoker.is_destroyed());
    assert_eq!(factory.state().close_count(), 1);

    let (inv, reply) = unary_invocation("SayHello", json!({ "name": "bob" }));
    let result = invoker.invoke(&ctx, &inv).await;
    assert_invoke_error!(result, InvokeError::DestroyedInvoker { .. });
    assert!(!reply.is_filled());
    assert_eq!(factory.state().unary_calls(), 1);
}

#[tokio::test]
async fn test_every_call_type_fails_fast_after_destroy() {
    let (invoker, factory) = mock_invoker();
    invoker.destroy().await;

    let ctx = CallContext::new();
    let invocations = [
        unary_invocation("SayHello", Value::Null).0,
        client_stream_invocation("SayHelloClientStream"),
        server_stream_invocation("SayHelloServerStream", Value::Null),
        bidi_stream_invocation("SayHelloStream"),
    ];
    for inv in &invocations {
        assert_unavailable(&invoker.invoke(&ctx, inv).await);
    }
    assert_eq!(factory.state().total_calls(), 0);
}

#[tokio::test]
async fn test_destroy_twice_closes_once() {
    let (invoker, factory) = mock_invoker();
    invoker.destroy().await;
    invoker.destroy().await;
    assert_eq!(factory.state().close_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_destroy_closes_once() {
    let (invoker, factory) = mock_invoker();
    factory.state().close_delay(Duration::from_millis(50));
    let invoker = Arc::new(invoker);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move { invoker.destroy().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(factory.state().close_count(), 1);
    assert!(!invoker.is_available());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_calls_racing_destroy_succeed_or_fail_unavailable() {
    let (invoker, factory) = mock_invoker();
    let invoker = Arc::new(invoker);

    let calls: Vec<_> = (0..16)
        .map(|i| {
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move {
                let (inv, _reply) = unary_invocation("SayHello", json!(i));
                invoker.invoke(&CallContext::new(), &inv).await
            })
        })
        .collect();
    invoker.destroy().await;

    for call in calls {
        let result = call.await.unwrap();
        match result.error() {
            None => {}
            Some(err) => assert!(
                err.is_unavailable() || matches!(err, InvokeError::Transport { .. }),
                "unexpected error: {err}"
            ),
        }
    }
    assert_eq!(factory.state().close_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_call_in_flight_finishes_on_its_client_after_destroy() {
    let (invoker, factory) = mock_invoker();
    let invoker = Arc::new(invoker);
    let state = Arc::clone(factory.state());
    state.hold_unary_calls();

    let (inv, reply) = unary_invocation("SayHello", json!({ "name": "ada" }));
    let call = tokio::spawn({
        let invoker = Arc::clone(&invoker);
        async move { invoker.invoke(&CallContext::new(), &inv).await }
    });
    wait_for(DEFAULT_TIMEOUT, Duration::from_millis(1), || state.unary_calls() == 1).await;

    with_default_timeout(invoker.destroy()).await;
    assert_eq!(state.close_count(), 1);
    assert!(!invoker.is_available());
    assert!(!call.is_finished());

    state.release_unary_calls();
    let result = with_default_timeout(call).await.unwrap();
    assert_invoke_ok(&result);
    assert_eq!(reply.take(), Some(json!({ "name": "ada" })));
    assert_eq!(state.unary_calls(), 1);
}

#[tokio::test]
async fn test_transport_error_passes_through_verbatim() {
    let (invoker, factory) = mock_invoker();
    factory
        .state()
        .fail_calls_with(Some(TransportError::remote("server exploded")));

    let (inv, reply) = unary_invocation("SayHello", Value::Null);
    let result = invoker.invoke(&CallContext::new(), &inv).await;

    let err = assert_transport_error::<TransportError>(&result);
    assert_eq!(err, &TransportError::remote("server exploded"));
    assert!(!reply.is_filled());
    assert!(invoker.is_available());
}

#[test]
fn test_construction_error_carries_factory_error() {
    let factory = MockFactory::new();
    factory.state().fail_builds(true);

    let err = TransportInvoker::new(test_endpoint(), &factory).unwrap_err();
    match &err {
        InvokeError::ClientConstruction { endpoint, source } => {
            assert_eq!(endpoint, &test_endpoint().to_string());
            let source = source.downcast_ref::<TransportError>().unwrap();
            assert!(matches!(source, TransportError::Connection { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_close_failure_is_not_surfaced() {
    let (invoker, factory) = mock_invoker();
    factory.state().fail_close(true);

    invoker.destroy().await;
    assert!(!invoker.is_available());
    assert_eq!(factory.state().close_count(), 1);
}

#[tokio::test]
async fn test_streams_are_returned_as_result_values() {
    let (invoker, factory) = mock_invoker();
    let ctx = CallContext::new();

    let client: ClientStream =
        take_stream(invoker.invoke(&ctx, &client_stream_invocation("Up")).await);
    assert_eq!(client.method(), "Up");

    let server: ServerStream = take_stream(
        invoker
            .invoke(&ctx, &server_stream_invocation("Down", json!({})))
            .await,
    );
    assert_eq!(server.method(), "Down");

    let bidi: BidiStream = take_stream(invoker.invoke(&ctx, &bidi_stream_invocation("Both")).await);
    assert_eq!(bidi.method(), "Both");

    let state = factory.state();
    assert_eq!(state.client_stream_calls(), 1);
    assert_eq!(state.server_stream_calls(), 1);
    assert_eq!(state.bidi_stream_calls(), 1);
}

#[tokio::test]
async fn test_server_stream_delivers_sink_messages() {
    let (invoker, factory) = mock_invoker();
    let mut stream: ServerStream = take_stream(
        invoker
            .invoke(&CallContext::new(), &server_stream_invocation("Down", json!({})))
            .await,
    );

    let sink = factory.state().take_server_stream_sink().unwrap();
    sink.send(raw(json!(1))).await.unwrap();
    drop(sink);

    let first = stream.recv().await.unwrap().unwrap();
    assert_eq!(first.downcast_ref::<Value>(), Some(&json!(1)));
    assert!(stream.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn test_extra_values_on_client_stream_are_ignored() {
    let (invoker, factory) = mock_invoker();
    let inv = client_stream_invocation("Up").with_raw_value(raw(json!("ignored")));

    let result = invoker.invoke(&CallContext::new(), &inv).await;
    assert_invoke_ok(&result);
    assert_eq!(factory.state().client_stream_calls(), 1);
}

#[tokio::test]
#[should_panic(expected = "needs 1 parameter values, got 0")]
async fn test_server_stream_without_request_panics() {
    let (invoker, _factory) = mock_invoker();
    let inv = Invocation::new("Down").with_call_type(CallType::ServerStream);
    let _ = invoker.invoke(&CallContext::new(), &inv).await;
}

#[tokio::test]
#[should_panic(expected = "needs 1 parameter values, got 2")]
async fn test_server_stream_with_two_requests_panics() {
    let (invoker, _factory) = mock_invoker();
    let inv = server_stream_invocation("Down", json!(1)).with_raw_value(raw(json!(2)));
    let _ = invoker.invoke(&CallContext::new(), &inv).await;
}

#[tokio::test]
#[should_panic(expected = "has no call-type attribute")]
async fn test_invocation_without_call_type_panics() {
    let (invoker, _factory) = mock_invoker();
    let _ = invoker.invoke(&CallContext::new(), &Invocation::new("SayHello")).await;
}

#[tokio::test]
async fn test_unary_over_memory_network() {
    let network = memory_network();
    let invoker = TransportInvoker::new(test_endpoint(), &network).unwrap();

    let (inv, reply) = unary_invocation("SayHello", json!({ "name": "callkit" }));
    assert_invoke_ok(&invoker.invoke(&CallContext::new(), &inv).await);
    assert_eq!(reply.take(), Some(json!({ "greeting": "Hello, callkit!" })));

    invoker.destroy().await;
    assert!(!invoker.is_available());
}
