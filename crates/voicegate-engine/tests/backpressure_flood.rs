//! Flooding audio chunks must never grow the outbound queue past its
//! configured bound, covering testable property 6 / scenario S6.

mod common;

use std::sync::Arc;

use common::spawn_mock_upstream;
use voicegate_core::GatewayConfig;
use voicegate_engine::{SessionLifecycleManager, SessionRegistry};

fn test_config(upstream_url: String) -> GatewayConfig {
    GatewayConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        upstream_url,
        upstream_token: "test-token".to_string(),
        upstream_region: "us-east-1".to_string(),
        upstream_timeout_secs: 5,
        max_streams_per_client: 10,
        queue_bound: 8,
        idle_timeout_secs: 300,
        sweep_interval_secs: 60,
        teardown_budget_secs: 5,
        max_tokens: 1024,
        top_p: 0.9,
        temperature: 0.7,
        default_system_prompt: "test prompt".to_string(),
        default_voice_id: "tiffany".to_string(),
        static_dir: None,
        allowed_origins: Vec::new(),
    }
}

#[tokio::test]
async fn flooding_audio_chunks_never_exceeds_queue_bound() {
    // Upstream never drains the request body, so every chunk stays queued
    // and the bound has to be enforced purely by the producer side.
    let addr = spawn_mock_upstream(vec![]).await;
    let config = Arc::new(test_config(format!("http://{addr}/")));
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = SessionLifecycleManager::new(registry, Arc::clone(&config));

    let session = lifecycle.create_session("flood-1".to_string()).expect("capacity");
    lifecycle.initiate(&session, None).await.expect("initiation enqueues cleanly");

    for _ in 0..500 {
        lifecycle
            .stream_audio(&session, &[0u8; 320])
            .await
            .expect("stream audio chunk accepted");
    }

    // Queue holds the fixed non-audio setup events (never dropped) plus at
    // most `queue_bound` audioInput chunks; it must never grow unbounded
    // with flood volume despite 500 chunks having been streamed.
    assert!(session.queue.len().await < 20);

    lifecycle.teardown(&session).await;
}
