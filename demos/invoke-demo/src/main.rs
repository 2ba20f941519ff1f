//! callkit Invoke Demo
//!
//! Serves a small greeter over the in-memory transport and drives it through
//! an invoker registry: one call of each type, then teardown.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=debug cargo run -p invoke-demo
//! ```

use std::time::Duration;

use callkit::prelude::*;
use futures::StreamExt;
use miette::{IntoDiagnostic, Result};
use serde_json::{Value, json};
use tracing::{info, warn};

const ADDRESS: &str = "127.0.0.1:20000";

fn greeter() -> MemoryService {
    let hello = |req: &Value| json!(format!("Hello, {}!", req["name"].as_str().unwrap_or("you")));

    MemoryService::new()
        .unary("SayHello", move |req: Value| async move { Ok(hello(&req)) })
        .client_stream("SayHelloAll", move |reqs| async move {
            let count = reqs.count().await;
            Ok(json!(format!("Hello, all {count} of you!")))
        })
        .server_stream("SayHelloRepeat", move |req: Value| {
            let times = req["times"].as_u64().unwrap_or(1);
            let reply = hello(&req);
            futures::stream::iter((0..times).map(move |_| Ok(reply.clone())))
        })
        .bidi_stream("SayHelloEach", move |reqs| reqs.map(move |req| Ok(hello(&req))))
}

fn text(value: &RawValue) -> String {
    value
        .downcast_ref::<Value>()
        .map_or_else(|| "<not json>".to_string(), ToString::to_string)
}

fn stream_of<T: std::any::Any>(mut result: RpcResult) -> Result<T> {
    if let Some(err) = result.take_error() {
        return Err(err.into());
    }
    result
        .take_value::<T>()
        .ok_or_else(|| miette::miette!("invoker returned no stream handle"))
}

async fn unary(invoker: &impl Invoker, ctx: &CallContext) -> Result<()> {
    let reply = Carrier::<Value>::new();
    let invocation = Invocation::new("SayHello")
        .with_call_type(CallType::Unary)
        .with_raw_value(raw(json!({ "name": "Ferris" })))
        .with_raw_value(raw(reply.clone()));

    invoker.invoke(ctx, &invocation).await.into_result()?;
    info!(reply = ?reply.take(), "unary");
    Ok(())
}

async fn client_stream(invoker: &impl Invoker, ctx: &CallContext) -> Result<()> {
    let invocation = Invocation::new("SayHelloAll").with_call_type(CallType::ClientStream);
    let stream: ClientStream = stream_of(invoker.invoke(ctx, &invocation).await)?;

    for name in ["Ferris", "Corro", "Rusty"] {
        stream.send_value(json!({ "name": name })).await.into_diagnostic()?;
    }
    let reply = stream.close_and_recv().await.into_diagnostic()?;
    info!(reply = %text(&reply), "client stream");
    Ok(())
}

async fn server_stream(invoker: &impl Invoker, ctx: &CallContext) -> Result<()> {
    let invocation = Invocation::new("SayHelloRepeat")
        .with_call_type(CallType::ServerStream)
        .with_raw_value(raw(json!({ "name": "Ferris", "times": 3 })));
    let mut stream: ServerStream = stream_of(invoker.invoke(ctx, &invocation).await)?;

    while let Some(reply) = stream.recv().await.into_diagnostic()? {
        info!(reply = %text(&reply), "server stream");
    }
    Ok(())
}

async fn bidi_stream(invoker: &impl Invoker, ctx: &CallContext) -> Result<()> {
    let invocation = Invocation::new("SayHelloEach").with_call_type(CallType::BidiStream);
    let mut stream: BidiStream = stream_of(invoker.invoke(ctx, &invocation).await)?;

    for name in ["Ferris", "Corro"] {
        stream.send_value(json!({ "name": name })).await.into_diagnostic()?;
        if let Some(reply) = stream.recv().await.into_diagnostic()? {
            info!(reply = %text(&reply), "bidi stream");
        }
    }
    stream.close_send();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("invoke_demo=info".parse().into_diagnostic()?),
        )
        .init();

    let network = MemoryNetwork::new();
    network.bind(ADDRESS, greeter());

    let factory = Layered::new(network, TimeoutLayer::new(Duration::from_secs(2)))
        .with(LoggingLayer::default());
    let registry = InvokerRegistry::new(factory);

    let endpoint = Endpoint::parse(&format!("tri://{ADDRESS}/demo.Greeter?timeout=1000"))?;
    let invoker = registry.refer(&endpoint).await?;
    let ctx = CallContext::new().with_metadata("caller", "invoke-demo");

    unary(&*invoker, &ctx).await?;
    client_stream(&*invoker, &ctx).await?;
    server_stream(&*invoker, &ctx).await?;
    bidi_stream(&*invoker, &ctx).await?;

    registry.destroy_all().await;

    let late = Invocation::new("SayHello")
        .with_call_type(CallType::Unary)
        .with_raw_value(raw(json!({ "name": "Late" })))
        .with_raw_value(raw(Carrier::<Value>::new()));
    if let Some(err) = invoker.invoke(&ctx, &late).await.error() {
        warn!(error = %err, "call after teardown rejected");
    }

    Ok(())
}
