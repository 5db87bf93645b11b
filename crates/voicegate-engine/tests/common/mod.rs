//! Shared test helpers: a canned NDJSON upstream mock bound to a local port.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::response::Response;
use axum::routing::post;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpListener;

/// Start a local HTTP server whose single route drains the request body and
/// streams back `lines` (one NDJSON event per entry) with a short delay
/// between each, simulating the upstream speech service. Returns the bound
/// address; the server runs for the remainder of the test process.
pub async fn spawn_mock_upstream(lines: Vec<String>) -> SocketAddr {
    let app = Router::new().route("/", post(move |body: Body| handle(body, lines.clone())));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock upstream server");
    });

    addr
}

async fn handle(body: Body, lines: Vec<String>) -> Response {
    tokio::spawn(async move {
        let mut stream = body.into_data_stream();
        while stream.next().await.is_some() {}
    });

    let response_stream = futures_util::stream::unfold(lines.into_iter(), |mut iter| async move {
        let line = iter.next()?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        Some((Ok::<_, std::io::Error>(Bytes::from(format!("{line}\n"))), iter))
    });

    Response::new(Body::from_stream(response_stream))
}
