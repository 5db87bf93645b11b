//! Wire protocol types and codec for the upstream event stream.
//!
//! Every frame on the wire is a single-line JSON object
//! `{"event":{"<kind>":{ ...fields... }}}`. This module defines the typed
//! outbound events the gateway sends, the typed inbound events it accepts,
//! and the encode/decode functions tying them to the newline-delimited wire
//! format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Envelope wrapping a single event under the `event` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<T> {
    pub event: T,
}

// ── Shared sub-structures ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentType {
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "AUDIO")]
    Audio,
    #[serde(rename = "TOOL")]
    Tool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentRole {
    #[serde(rename = "SYSTEM")]
    System,
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ASSISTANT")]
    Assistant,
    #[serde(rename = "TOOL")]
    Tool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    #[serde(rename = "END_TURN")]
    EndTurn,
    #[serde(rename = "INTERRUPTED")]
    Interrupted,
    #[serde(rename = "TOOL_USE")]
    ToolUse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfiguration {
    pub max_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputConfiguration {
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputConfiguration {
    pub audio_type: String,
    pub encoding: String,
    pub media_type: String,
    pub sample_rate_hertz: u32,
    pub sample_size_bits: u16,
    pub channel_count: u8,
    pub voice_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputConfiguration {
    pub audio_type: String,
    pub encoding: String,
    pub media_type: String,
    pub sample_rate_hertz: u32,
    pub sample_size_bits: u16,
    pub channel_count: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub tool_spec: ToolSpec,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfiguration {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultInputConfiguration {
    pub tool_use_id: String,
    pub r#type: String,
}

// ── Outbound events (gateway → upstream) ───────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartPayload {
    pub inference_configuration: InferenceConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStartPayload {
    pub prompt_name: String,
    pub text_output_configuration: TextOutputConfiguration,
    pub audio_output_configuration: AudioOutputConfiguration,
    pub tool_use_output_configuration: TextOutputConfiguration,
    pub tool_configuration: ToolConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStartPayload {
    pub prompt_name: String,
    pub content_name: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub interactive: bool,
    pub role: ContentRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_input_configuration: Option<TextOutputConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_input_configuration: Option<AudioInputConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result_input_configuration: Option<ToolResultInputConfiguration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInputPayload {
    pub prompt_name: String,
    pub content_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputPayload {
    pub prompt_name: String,
    pub content_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPayload {
    pub prompt_name: String,
    pub content_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEndPayload {
    pub prompt_name: String,
    pub content_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEndPayload {
    pub prompt_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndPayload {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutboundEvent {
    SessionStart(SessionStartPayload),
    PromptStart(PromptStartPayload),
    ContentStart(ContentStartPayload),
    TextInput(TextInputPayload),
    AudioInput(AudioInputPayload),
    ToolResult(ToolResultPayload),
    ContentEnd(ContentEndPayload),
    PromptEnd(PromptEndPayload),
    SessionEnd(SessionEndPayload),
}

impl OutboundEvent {
    /// The event kind name as it appears on the wire, e.g. `"sessionStart"`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStart(_) => "sessionStart",
            Self::PromptStart(_) => "promptStart",
            Self::ContentStart(_) => "contentStart",
            Self::TextInput(_) => "textInput",
            Self::AudioInput(_) => "audioInput",
            Self::ToolResult(_) => "toolResult",
            Self::ContentEnd(_) => "contentEnd",
            Self::PromptEnd(_) => "promptEnd",
            Self::SessionEnd(_) => "sessionEnd",
        }
    }
}

// ── Inbound events (upstream → gateway) ─────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundContentStart {
    pub prompt_name: Option<String>,
    pub content_name: String,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub role: Option<ContentRole>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputPayload {
    pub content_name: String,
    pub content: String,
    #[serde(default)]
    pub role: Option<ContentRole>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputPayload {
    pub content_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsePayload {
    pub tool_use_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundContentEnd {
    pub content_name: String,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone)]
pub enum InboundEvent {
    ContentStart(InboundContentStart),
    TextOutput(TextOutputPayload),
    AudioOutput(AudioOutputPayload),
    ToolUse(ToolUsePayload),
    ContentEnd(InboundContentEnd),
    ModelStreamError(ErrorPayload),
    InternalServerError(ErrorPayload),
    /// A kind not named above, preserved verbatim for forward compatibility.
    Unknown(String, Value),
}

impl InboundEvent {
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ContentStart(_) => "contentStart",
            Self::TextOutput(_) => "textOutput",
            Self::AudioOutput(_) => "audioOutput",
            Self::ToolUse(_) => "toolUse",
            Self::ContentEnd(_) => "contentEnd",
            Self::ModelStreamError(_) => "modelStreamError",
            Self::InternalServerError(_) => "internalServerError",
            Self::Unknown(kind, _) => kind,
        }
    }

    /// `true` for the two out-of-band error kinds.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ModelStreamError(_) | Self::InternalServerError(_))
    }
}

fn parse_inbound_kind(kind: &str, payload: Value) -> Result<InboundEvent, CoreError> {
    let event = match kind {
        "contentStart" => InboundEvent::ContentStart(serde_json::from_value(payload)?),
        "textOutput" => InboundEvent::TextOutput(serde_json::from_value(payload)?),
        "audioOutput" => InboundEvent::AudioOutput(serde_json::from_value(payload)?),
        "toolUse" => InboundEvent::ToolUse(serde_json::from_value(payload)?),
        "contentEnd" => InboundEvent::ContentEnd(serde_json::from_value(payload)?),
        "modelStreamErrorException" | "modelStreamError" => {
            InboundEvent::ModelStreamError(serde_json::from_value(payload)?)
        }
        "internalServerException" | "internalServerError" => {
            InboundEvent::InternalServerError(serde_json::from_value(payload)?)
        }
        other => InboundEvent::Unknown(other.to_string(), payload),
    };
    Ok(event)
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Validation(err.to_string())
    }
}

/// Encode an outbound event as a single NDJSON line (no trailing newline).
pub fn encode_outbound(event: &OutboundEvent) -> Result<String, CoreError> {
    let frame = Frame { event };
    serde_json::to_string(&frame).map_err(Into::into)
}

/// Decode one line of the upstream response body into a typed inbound event.
///
/// Lines that do not carry an `event` object, or whose inner object has zero
/// or more than one key, are rejected as malformed.
pub fn decode_inbound(line: &str) -> Result<InboundEvent, CoreError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("empty line".into()));
    }
    let root: Value = serde_json::from_str(trimmed)?;
    let event_obj = root
        .get("event")
        .ok_or_else(|| CoreError::Validation("missing `event` key".into()))?;
    let map = event_obj
        .as_object()
        .ok_or_else(|| CoreError::Validation("`event` is not an object".into()))?;
    if map.len() != 1 {
        return Err(CoreError::Validation(format!(
            "expected exactly one event kind, found {}",
            map.len()
        )));
    }
    let (kind, payload) = map.iter().next().expect("checked len == 1");
    parse_inbound_kind(kind, payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_session_start() {
        let event = OutboundEvent::SessionStart(SessionStartPayload {
            inference_configuration: InferenceConfiguration {
                max_tokens: 1024,
                top_p: 0.9,
                temperature: 0.7,
            },
        });
        let line = encode_outbound(&event).unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert!(value["event"]["sessionStart"]["inferenceConfiguration"]["maxTokens"] == 1024);
    }

    #[test]
    fn decodes_tool_use() {
        let line = r#"{"event":{"toolUse":{"toolUseId":"t1","toolName":"getDateAndTimeTool","content":"{}"}}}"#;
        let event = decode_inbound(line).unwrap();
        match event {
            InboundEvent::ToolUse(payload) => {
                assert_eq!(payload.tool_use_id, "t1");
                assert_eq!(payload.tool_name, "getDateAndTimeTool");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_unknown_kind_verbatim() {
        let line = r#"{"event":{"somethingNew":{"a":1}}}"#;
        let event = decode_inbound(line).unwrap();
        assert_eq!(event.kind(), "somethingNew");
    }

    #[test]
    fn rejects_multi_key_event_object() {
        let line = r#"{"event":{"a":{},"b":{}}}"#;
        assert!(decode_inbound(line).is_err());
    }
}
