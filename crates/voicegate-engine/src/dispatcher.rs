//! Routes decoded session events to per-session handlers and correlates
//! tool-use round-trips.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{error, warn};
use voicegate_core::event::InboundEvent;

use crate::client_event::SessionEvent;
use crate::session::{PendingToolUse, Session};
use crate::tools::ToolInvoker;

/// Invoke `session`'s registered handlers for `event` without performing
/// any tool-call correlation. Used both by `dispatch` and by components
/// (the tool invoker) that raise a locally-originated `SessionEvent`.
pub async fn notify(session: &Arc<Session>, event: &SessionEvent) {
    session.touch().await;
    let kind = event.kind().to_string();
    invoke_handler(session, &kind, event);
    invoke_handler(session, "any", event);
}

/// Dispatch one session event to `session`'s registered handlers, then
/// perform tool-call correlation bookkeeping for upstream events.
pub async fn dispatch(session: &Arc<Session>, event: SessionEvent, tools: &Arc<ToolInvoker>) {
    notify(session, &event).await;

    let SessionEvent::Upstream(inbound) = &event else {
        return;
    };

    match inbound {
        InboundEvent::ToolUse(payload) => {
            session
                .set_pending_tool_use(PendingToolUse {
                    tool_use_id: payload.tool_use_id.clone(),
                    tool_name: payload.tool_name.clone(),
                    arguments: payload.content.clone(),
                })
                .await;
        }
        InboundEvent::ContentEnd(payload)
            if matches!(payload.content_type, Some(voicegate_core::event::ContentType::Tool)) =>
        {
            if let Some(pending) = session.take_pending_tool_use().await {
                let session = Arc::clone(session);
                let tools = Arc::clone(tools);
                tokio::spawn(async move {
                    tools.invoke_and_enqueue(&session, pending).await;
                });
            } else {
                warn!(
                    session_id = %session.id,
                    "contentEnd(TOOL) received with no pending tool use"
                );
            }
        }
        _ => {}
    }
}

fn invoke_handler(session: &Arc<Session>, kind: &str, event: &SessionEvent) {
    let Some(handler) = session.handler_for(kind) else {
        return;
    };
    let result = catch_unwind(AssertUnwindSafe(|| handler(event)));
    if result.is_err() {
        error!(session_id = %session.id, kind, "handler panicked; isolated from response loop");
    }
}
