//! Opens the bidirectional HTTP/2 stream to the upstream speech service,
//! pumps the session's outbound queue into the request body, and decodes
//! the response body into dispatched session events.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use tracing::{error, info, warn};
use voicegate_core::GatewayConfig;
use voicegate_core::event::{
    InferenceConfiguration, OutboundEvent, SessionStartPayload, decode_inbound,
};

use crate::client_event::SessionEvent;
use crate::dispatcher;
use crate::queue::into_body_stream;
use crate::session::Session;
use crate::tools::ToolInvoker;

/// Ensure the session's queue is not empty before the request body is
/// opened — initiation normally guarantees this, but a slow producer could
/// race the driver start.
async fn ensure_seeded(session: &Session) {
    if session.queue.len().await > 0 {
        return;
    }
    warn!(session_id = %session.id, "outbound queue empty at stream open; re-seeding sessionStart");
    let event = OutboundEvent::SessionStart(SessionStartPayload {
        inference_configuration: InferenceConfiguration {
            max_tokens: session.inference_config.max_tokens,
            top_p: session.inference_config.top_p,
            temperature: session.inference_config.temperature,
        },
    });
    let _ = session.enqueue(event).await;
}

/// Drive one session's bidirectional stream to completion. Returns once the
/// upstream stream has ended, erred, or the session has gone inactive. The
/// caller runs this inside a dedicated task per session.
pub async fn run(http: reqwest::Client, session: Arc<Session>, config: Arc<GatewayConfig>, tools: Arc<ToolInvoker>) {
    ensure_seeded(&session).await;

    let body = reqwest::Body::wrap_stream(into_body_stream(
        session.queue.clone(),
        session.close.clone(),
        session.inference_config,
    ));

    let request = http
        .post(&config.upstream_url)
        .bearer_auth(&config.upstream_token)
        .header("x-voicegate-region", &config.upstream_region)
        .header("content-type", "application/x-ndjson")
        .timeout(config.upstream_timeout())
        .body(body);

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            error!(session_id = %session.id, error = %err, "failed to open upstream stream");
            emit_terminal_error(&session, &tools, format!("failed to reach upstream: {err}")).await;
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        error!(session_id = %session.id, %status, "upstream rejected stream");
        emit_terminal_error(&session, &tools, format!("upstream returned {status}: {body_text}")).await;
        return;
    }

    info!(session_id = %session.id, "upstream stream opened");

    let mut byte_stream = response.bytes_stream();
    let mut buf = BytesMut::new();
    let mut saw_error = false;

    loop {
        tokio::select! {
            () = session.close.cancelled() => {
                info!(session_id = %session.id, "session closed; stopping response reader");
                break;
            }
            chunk = byte_stream.next() => {
                let Some(chunk) = chunk else {
                    break;
                };
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        error!(session_id = %session.id, error = %err, "upstream transport error");
                        emit_terminal_error(&session, &tools, format!("upstream transport error: {err}")).await;
                        saw_error = true;
                        break;
                    }
                };
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line = buf.split_to(pos);
                    buf.advance(1);
                    if line.is_empty() {
                        continue;
                    }
                    let text = String::from_utf8_lossy(&line).into_owned();
                    match decode_inbound(&text) {
                        Ok(event) => {
                            if event.is_error() {
                                saw_error = true;
                                let message = match &event {
                                    voicegate_core::InboundEvent::ModelStreamError(e)
                                    | voicegate_core::InboundEvent::InternalServerError(e) => {
                                        e.message.clone().unwrap_or_else(|| "upstream reported an error".to_string())
                                    }
                                    _ => unreachable!(),
                                };
                                dispatcher::dispatch(&session, SessionEvent::Upstream(event), &tools).await;
                                emit_terminal_error(&session, &tools, message).await;
                                return;
                            }
                            dispatcher::dispatch(&session, SessionEvent::Upstream(event), &tools).await;
                        }
                        Err(err) => {
                            warn!(session_id = %session.id, error = %err, line = %text, "dropping malformed upstream line");
                        }
                    }
                }
            }
        }
    }

    if !saw_error {
        dispatcher::dispatch(&session, SessionEvent::StreamComplete, &tools).await;
    }
}

async fn emit_terminal_error(session: &Arc<Session>, tools: &Arc<ToolInvoker>, message: String) {
    dispatcher::dispatch(session, SessionEvent::Error { message }, tools).await;
    dispatcher::dispatch(session, SessionEvent::StreamComplete, tools).await;
}
