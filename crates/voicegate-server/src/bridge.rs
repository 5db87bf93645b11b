//! Gateway Bridge: the per-client WebSocket handler. Maintains a 1:1 mapping
//! between one browser connection and at most one in-flight `Session`,
//! translating client control/audio messages into session operations and
//! session events back into client-facing JSON/binary frames.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{info, warn};
use voicegate_core::event::InboundEvent;
use voicegate_engine::{Session, SessionEvent};

use crate::state::AppState;

/// Control messages the browser sends as WebSocket text frames.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientMessage {
    InitSession {
        #[serde(default)]
        prompt: Option<String>,
    },
    StopAudio,
    /// Base64-in-text audio, offered as an alternative to binary frames.
    AudioInput {
        content: String,
    },
}

pub async fn voice_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_voice_ws(socket, state))
}

async fn handle_voice_ws(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let mut current: Option<Arc<Session>> = spawn_session(&state, out_tx.clone()).await;
    if current.is_none() {
        warn!("session registry at capacity; rejecting connection");
        return;
    }

    let mut egress = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(message) = out_rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut egress => break,
            incoming = ws_receiver.next() => {
                let Some(incoming) = incoming else { break };
                match incoming {
                    Ok(Message::Text(text)) => {
                        handle_text(&state, &mut current, &out_tx, &text).await;
                    }
                    Ok(Message::Binary(data)) => {
                        if let Some(session) = &current {
                            if let Err(err) = state.lifecycle.stream_audio(session, &data).await {
                                warn!(session_id = %session.id, error = %err, "failed to stream audio chunk");
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        }
    }
    egress.abort();

    if let Some(session) = current.take() {
        state
            .lifecycle
            .teardown_with_budget(&session, state.config.teardown_budget())
            .await;
    }

    info!("voice gateway connection closed");
}

async fn handle_text(
    state: &Arc<crate::bootstrap::GatewayContext>,
    current: &mut Option<Arc<Session>>,
    out_tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    match parsed {
        Ok(ClientMessage::InitSession { prompt }) => {
            if let Some(old) = current.take() {
                state.lifecycle.teardown(&old).await;
            }
            let Some(session) = spawn_session(state, out_tx.clone()).await else {
                let ack = json!({"type": "sessionInitialized", "success": false, "error": "session registry at capacity"});
                let _ = out_tx.send(Message::Text(ack.to_string().into()));
                return;
            };
            let result = state.lifecycle.initiate(&session, prompt).await;
            let ack = match result {
                Ok(()) => json!({"type": "sessionInitialized", "success": true, "sessionId": session.id}),
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "session initiation failed");
                    json!({"type": "sessionInitialized", "success": false, "sessionId": session.id, "error": err.to_string()})
                }
            };
            let _ = out_tx.send(Message::Text(ack.to_string().into()));
            *current = Some(session);
        }
        Ok(ClientMessage::StopAudio) => {
            if let Some(session) = current.take() {
                state.lifecycle.teardown(&session).await;
            }
        }
        Ok(ClientMessage::AudioInput { content }) => {
            if let Some(session) = current {
                match base64::Engine::decode(&base64::engine::general_purpose::STANDARD, content) {
                    Ok(bytes) => {
                        if let Err(err) = state.lifecycle.stream_audio(session, &bytes).await {
                            warn!(session_id = %session.id, error = %err, "failed to stream text-framed audio");
                        }
                    }
                    Err(err) => warn!(error = %err, "malformed base64 audioInput"),
                }
            }
        }
        Err(err) => {
            warn!(error = %err, raw = %text, "dropping malformed client message");
        }
    }
}

/// Create and register a new session, wiring its default handlers to
/// forward every session event to this connection's outbound channel.
async fn spawn_session(
    state: &Arc<crate::bootstrap::GatewayContext>,
    out_tx: mpsc::UnboundedSender<Message>,
) -> Option<Arc<Session>> {
    let id = uuid::Uuid::new_v4().to_string();
    let session = state.lifecycle.create_session(id)?;

    session.on(
        "any",
        Arc::new(move |event: &SessionEvent| {
            let message = to_client_message(event);
            let _ = out_tx.send(Message::Text(message.to_string().into()));
        }),
    );

    Some(session)
}

/// Translate a session event into the client-facing JSON shape.
fn to_client_message(event: &SessionEvent) -> Value {
    match event {
        SessionEvent::Error { message } => json!({"type": "error", "message": message}),
        SessionEvent::ToolResult {
            tool_use_id,
            tool_name,
            result,
        } => json!({
            "type": "toolResult",
            "toolUseId": tool_use_id,
            "toolName": tool_name,
            "result": result,
        }),
        SessionEvent::StreamComplete => json!({"type": "streamComplete"}),
        SessionEvent::Upstream(inbound) => match inbound {
            InboundEvent::ContentStart(payload) => json!({
                "type": "contentStart",
                "contentName": payload.content_name,
                "promptName": payload.prompt_name,
                "contentType": payload.content_type,
                "role": payload.role,
            }),
            InboundEvent::TextOutput(payload) => json!({
                "type": "textOutput",
                "contentName": payload.content_name,
                "content": payload.content,
                "role": payload.role,
            }),
            InboundEvent::AudioOutput(payload) => json!({
                "type": "audioOutput",
                "contentName": payload.content_name,
                "content": payload.content,
            }),
            InboundEvent::ToolUse(payload) => json!({
                "type": "toolUse",
                "toolUseId": payload.tool_use_id,
                "toolName": payload.tool_name,
            }),
            InboundEvent::ContentEnd(payload) => json!({
                "type": "contentEnd",
                "contentName": payload.content_name,
                "stopReason": payload.stop_reason,
            }),
            InboundEvent::ModelStreamError(payload) | InboundEvent::InternalServerError(payload) => json!({
                "type": "error",
                "message": payload.message,
                "details": payload.code,
            }),
            InboundEvent::Unknown(kind, payload) => json!({
                "type": kind,
                "payload": payload,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicegate_core::GatewayConfig;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            // Unreachable: `initiate`/`teardown` only enqueue locally and
            // never block on the upstream connection actually succeeding.
            upstream_url: "http://127.0.0.1:1/".to_string(),
            upstream_token: "test-token".to_string(),
            upstream_region: "us-east-1".to_string(),
            upstream_timeout_secs: 5,
            max_streams_per_client: 10,
            queue_bound: 200,
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

    /// S4: a second `initSession` while one is already active must close
    /// the first session to completion before the replacement's
    /// `sessionInitialized` ack is ever sent.
    #[tokio::test]
    async fn reinit_session_tears_down_previous_before_acking_new() {
        let state = crate::bootstrap::bootstrap(test_config());
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        let mut current = spawn_session(&state, out_tx.clone()).await;
        assert!(current.is_some());

        handle_text(&state, &mut current, &out_tx, r#"{"type":"initSession","prompt":"A"}"#).await;
        let session_a = current.clone().expect("session A registered");

        handle_text(
            &state,
            &mut current,
            &out_tx,
            r#"{"type":"audioInput","content":"AAAA"}"#,
        )
        .await;

        handle_text(&state, &mut current, &out_tx, r#"{"type":"initSession","prompt":"B"}"#).await;
        let session_b = current.clone().expect("session B registered");

        assert_ne!(session_a.id, session_b.id);
        assert!(!session_a.is_active());
        assert!(state.lifecycle.registry().get(&session_a.id).is_none());
        assert!(session_b.is_active());
        assert!(state.lifecycle.registry().get(&session_b.id).is_some());

        let mut acks = Vec::new();
        while let Ok(message) = out_rx.try_recv() {
            if let Message::Text(text) = message {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == "sessionInitialized" {
                    acks.push(value);
                }
            }
        }

        assert_eq!(acks.len(), 2, "expected one ack per initSession: {acks:?}");
        assert_eq!(acks[0]["sessionId"], json!(session_a.id));
        assert_eq!(acks[0]["success"], json!(true));
        assert_eq!(acks[1]["sessionId"], json!(session_b.id));
        assert_eq!(acks[1]["success"], json!(true));
    }
}
