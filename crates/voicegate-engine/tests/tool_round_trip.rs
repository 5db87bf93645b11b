//! A `toolUse` event followed by `contentEnd(TOOL)` must produce a
//! `contentStart`/`toolResult`/`contentEnd` triplet on the outbound queue,
//! covering testable property 3 (tool round-trip correlation).

use std::sync::Arc;
use std::time::Duration;

use voicegate_core::event::{ContentType, InboundContentEnd, InboundEvent, ToolUsePayload};
use voicegate_engine::dispatcher::dispatch;
use voicegate_engine::session::{InferenceParams, Session};
use voicegate_engine::{SessionEvent, ToolInvoker};

fn test_session() -> Arc<Session> {
    Arc::new(Session::new(
        "tool-1".to_string(),
        "tiffany".to_string(),
        InferenceParams {
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
        },
        200,
    ))
}

#[tokio::test]
async fn tool_use_followed_by_content_end_enqueues_result_triplet() {
    let session = test_session();
    let tools = Arc::new(ToolInvoker::new());

    let saw_tool_result = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = Arc::clone(&saw_tool_result);
    session.on(
        "toolResult",
        Arc::new(move |_event: &SessionEvent| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }),
    );

    assert_eq!(session.queue.len().await, 0);

    let tool_use = SessionEvent::Upstream(InboundEvent::ToolUse(ToolUsePayload {
        tool_use_id: "call-1".to_string(),
        tool_name: "getDateAndTimeTool".to_string(),
        content: "{}".to_string(),
    }));
    dispatch(&session, tool_use, &tools).await;

    let content_end = SessionEvent::Upstream(InboundEvent::ContentEnd(InboundContentEnd {
        content_name: "tool-content-1".to_string(),
        content_type: Some(ContentType::Tool),
        stop_reason: None,
    }));
    dispatch(&session, content_end, &tools).await;

    // Tool invocation runs in a spawned task; give it a moment to enqueue
    // the upstream triplet and notify the client-facing handler.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.queue.len().await, 3);
    assert!(saw_tool_result.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn content_end_without_pending_tool_use_enqueues_nothing() {
    let session = test_session();
    let tools = Arc::new(ToolInvoker::new());

    let content_end = SessionEvent::Upstream(InboundEvent::ContentEnd(InboundContentEnd {
        content_name: "orphan".to_string(),
        content_type: Some(ContentType::Tool),
        stop_reason: None,
    }));
    dispatch(&session, content_end, &tools).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.queue.len().await, 0);
}
