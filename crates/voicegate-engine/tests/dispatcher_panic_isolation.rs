//! A handler that panics must not prevent the fallback handler from running
//! or corrupt later dispatches, covering testable property 5.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use voicegate_core::event::{ContentType, InboundContentEnd, InboundEvent};
use voicegate_engine::dispatcher::dispatch;
use voicegate_engine::session::{InferenceParams, Session};
use voicegate_engine::{SessionEvent, ToolInvoker};

fn test_session() -> Arc<Session> {
    Arc::new(Session::new(
        "panic-1".to_string(),
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
async fn panicking_handler_does_not_block_fallback_or_later_dispatches() {
    let session = test_session();
    let tools = Arc::new(ToolInvoker::new());

    let fallback_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&fallback_hits);

    session.on(
        "contentEnd",
        Arc::new(|_event: &SessionEvent| {
            panic!("simulated handler failure");
        }),
    );
    session.on(
        "any",
        Arc::new(move |_event: &SessionEvent| {
            hits.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let event = SessionEvent::Upstream(InboundEvent::ContentEnd(InboundContentEnd {
        content_name: "c1".to_string(),
        content_type: Some(ContentType::Text),
        stop_reason: None,
    }));
    dispatch(&session, event, &tools).await;

    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);

    // A second dispatch proves the session is still usable after the panic.
    dispatch(&session, SessionEvent::StreamComplete, &tools).await;
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 2);
}
