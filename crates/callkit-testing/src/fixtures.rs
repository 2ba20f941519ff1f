//! Test fixtures for callkit testing.
//!
//! This module provides pre-built endpoints, invocations and an in-memory
//! greeter service for common testing scenarios.

use callkit_core::endpoint::Endpoint;
use callkit_core::invocation::{CallType, Invocation};
use callkit_core::value::{Carrier, raw};
use callkit_transport::error::TransportError;
use callkit_transport::memory::{MemoryNetwork, MemoryService, Requests};
use futures::StreamExt;
use serde_json::{Value, json};

/// Address the fixture service is bound to.
pub const TEST_ADDRESS: &str = "127.0.0.1:20000";

/// Service path of the fixture endpoint.
pub const TEST_SERVICE: &str = "callkit.test.Greeter";

/// The endpoint of the fixture service.
///
/// # Panics
///
/// Never in practice; the endpoint string is a constant.
#[must_use]
pub fn test_endpoint() -> Endpoint {
    Endpoint::parse(&format!("tri://{TEST_ADDRESS}/{TEST_SERVICE}"))
        .expect("fixture endpoint parses")
}

/// A unary invocation of `method` and the carrier its reply lands in.
#[must_use]
pub fn unary_invocation(method: &str, request: Value) -> (Invocation, Carrier<Value>) {
    let reply = Carrier::new();
    let invocation = Invocation::new(method)
        .with_call_type(CallType::Unary)
        .with_raw_value(raw(request))
        .with_raw_value(raw(reply.clone()));
    (invocation, reply)
}

/// A client-streaming invocation of `method`.
#[must_use]
pub fn client_stream_invocation(method: &str) -> Invocation {
    Invocation::new(method).with_call_type(CallType::ClientStream)
}

/// A server-streaming invocation of `method` with one request.
#[must_use]
pub fn server_stream_invocation(method: &str, request: Value) -> Invocation {
    Invocation::new(method)
        .with_call_type(CallType::ServerStream)
        .with_raw_value(raw(request))
}

/// A bidi-streaming invocation of `method`.
#[must_use]
pub fn bidi_stream_invocation(method: &str) -> Invocation {
    Invocation::new(method).with_call_type(CallType::BidiStream)
}

fn greeting(name: &Value) -> Value {
    json!({ "greeting": format!("Hello, {}!", name.as_str().unwrap_or("stranger")) })
}

/// A greeter service with one method per call type.
///
/// - `SayHello` (unary): greets `request["name"]`
/// - `SayHelloClientStream`: greets every streamed name in one reply
/// - `SayHelloServerStream`: greets `request["name"]` `request["count"]` times
/// - `SayHelloStream` (bidi): greets each streamed name as it arrives
/// - `Fail` (unary): always fails with a remote error
#[must_use]
pub fn greeter_service() -> MemoryService {
    MemoryService::new()
        .unary("SayHello", |req: Value| async move { Ok(greeting(&req["name"])) })
        .unary("Fail", |_| async move {
            Err(TransportError::remote("greeter is grumpy"))
        })
        .client_stream("SayHelloClientStream", |reqs: Requests| async move {
            let names: Vec<String> = reqs
                .map(|req| req["name"].as_str().unwrap_or("stranger").to_string())
                .collect()
                .await;
            Ok(json!({ "greeting": format!("Hello, {}!", names.join(", ")) }))
        })
        .server_stream("SayHelloServerStream", |req: Value| {
            let count = req["count"].as_u64().unwrap_or(1);
            let reply = greeting(&req["name"]);
            futures::stream::iter((0..count).map(move |_| Ok(reply.clone())))
        })
        .bidi_stream("SayHelloStream", |reqs: Requests| {
            reqs.map(|req| Ok(greeting(&req["name"])))
        })
}

/// A memory network serving [`greeter_service`] at [`TEST_ADDRESS`].
#[must_use]
pub fn memory_network() -> MemoryNetwork {
    let network = MemoryNetwork::new();
    network.bind(TEST_ADDRESS, greeter_service());
    network
}
