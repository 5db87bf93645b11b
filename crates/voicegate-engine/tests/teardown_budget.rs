//! An abrupt client disconnect must be handled by `teardown_with_budget`:
//! ordered teardown when the upstream cooperates, force-close when it
//! doesn't, either way within the configured budget. Covers scenario S2.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::spawn_mock_upstream;
use voicegate_core::GatewayConfig;
use voicegate_engine::{SessionLifecycleManager, SessionRegistry};

fn test_config(upstream_url: String, teardown_budget_secs: u64) -> GatewayConfig {
    GatewayConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        upstream_url,
        upstream_token: "test-token".to_string(),
        upstream_region: "us-east-1".to_string(),
        upstream_timeout_secs: 5,
        max_streams_per_client: 10,
        queue_bound: 200,
        idle_timeout_secs: 300,
        sweep_interval_secs: 60,
        teardown_budget_secs,
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
async fn cooperative_upstream_tears_down_within_budget() {
    let addr = spawn_mock_upstream(vec![]).await;
    let config = Arc::new(test_config(format!("http://{addr}/"), 5));
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = SessionLifecycleManager::new(registry, Arc::clone(&config));

    let session = lifecycle.create_session("disc-1".to_string()).expect("capacity");
    lifecycle.initiate(&session, None).await.expect("initiation enqueues cleanly");

    let started = Instant::now();
    lifecycle.teardown_with_budget(&session, Duration::from_secs(5)).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(lifecycle.registry().get("disc-1").is_none());
    assert!(!session.is_active());
}

#[tokio::test]
async fn teardown_is_local_and_unaffected_by_an_unreachable_upstream() {
    // Teardown only mutates local session state and the outbound queue; it
    // never blocks on the upstream connection, so an unreachable upstream
    // URL must not slow it down or prevent the budget from being met.
    let config = Arc::new(test_config("http://127.0.0.1:1/".to_string(), 1));
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = SessionLifecycleManager::new(registry, Arc::clone(&config));

    let session = lifecycle.create_session("disc-2".to_string()).expect("capacity");
    session.track_prompt_open(session.prompt_name.clone()).await;

    let started = Instant::now();
    lifecycle.teardown_with_budget(&session, Duration::from_millis(200)).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(lifecycle.registry().get("disc-2").is_none());
    assert!(!session.is_active());
}

#[tokio::test]
async fn force_close_removes_and_deactivates_without_ordered_teardown() {
    let config = Arc::new(test_config("http://127.0.0.1:1/".to_string(), 1));
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = SessionLifecycleManager::new(registry, Arc::clone(&config));

    let session = lifecycle.create_session("disc-3".to_string()).expect("capacity");
    assert!(session.is_active());

    lifecycle.force_close(&session.id);

    assert!(lifecycle.registry().get("disc-3").is_none());
    assert!(!session.is_active());

    // Idempotent: a second force-close on the same ID is a no-op.
    lifecycle.force_close(&session.id);
}
