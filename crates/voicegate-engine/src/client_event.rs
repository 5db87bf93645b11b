//! The event shape delivered to session handlers: either a decoded upstream
//! event, or one of the two synthetic terminal signals the driver produces
//! when the upstream stream ends (see `RemoteStreamDriver` exit conditions).

use voicegate_core::event::InboundEvent;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A decoded event from the upstream response body.
    Upstream(InboundEvent),
    /// A tool call's result, raised locally by the tool invoker once it has
    /// also enqueued the `toolResult` content block for upstream. Not an
    /// upstream-decoded event, so it carries its own fields rather than
    /// wrapping `InboundEvent`.
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        result: serde_json::Value,
    },
    /// The stream ended in error. Always followed by exactly one
    /// `StreamComplete`.
    Error { message: String },
    /// The stream ended, successfully or after an `Error`. Exactly one is
    /// delivered per session.
    StreamComplete,
}

impl SessionEvent {
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Upstream(event) => event.kind(),
            Self::ToolResult { .. } => "toolResult",
            Self::Error { .. } => "error",
            Self::StreamComplete => "streamComplete",
        }
    }
}
