//! Tool invoker: executes in-conversation tool calls and re-enqueues their
//! result as a `TOOL`-role content block.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::America::Los_Angeles;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, warn};
use voicegate_core::CoreError;
use voicegate_core::event::{
    ContentEndPayload, ContentRole, ContentStartPayload, ContentType, OutboundEvent,
    ToolResultInputConfiguration, ToolResultPayload,
};

use crate::client_event::SessionEvent;
use crate::dispatcher;
use crate::session::{PendingToolUse, Session};

const WEATHER_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    latitude: String,
    longitude: String,
}

/// Executes the closed set of built-in tools the gateway exposes to the
/// upstream model.
pub struct ToolInvoker {
    http: reqwest::Client,
}

impl ToolInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Run `pending`'s tool and enqueue the result as a full
    /// `contentStart`/`toolResult`/`contentEnd` block on `session`'s
    /// outbound queue. Errors are enqueued as a `toolResult` carrying the
    /// error message rather than silently dropped, so the model can react.
    pub async fn invoke_and_enqueue(&self, session: &Arc<Session>, pending: PendingToolUse) {
        let outcome = self.invoke(&pending.tool_name, &pending.arguments).await;
        let result_json = match outcome {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    session_id = %session.id,
                    tool = %pending.tool_name,
                    error = %err,
                    "tool invocation failed"
                );
                json!({ "error": err.to_string() })
            }
        };

        let content_name = uuid::Uuid::new_v4().to_string();
        let prompt_name = session.prompt_name.clone();

        let start = OutboundEvent::ContentStart(ContentStartPayload {
            prompt_name: prompt_name.clone(),
            content_name: content_name.clone(),
            content_type: ContentType::Tool,
            interactive: false,
            role: ContentRole::Tool,
            text_input_configuration: None,
            audio_input_configuration: None,
            tool_result_input_configuration: Some(ToolResultInputConfiguration {
                tool_use_id: pending.tool_use_id.clone(),
                r#type: "TEXT".to_string(),
            }),
        });
        let result = OutboundEvent::ToolResult(ToolResultPayload {
            prompt_name: prompt_name.clone(),
            content_name: content_name.clone(),
            content: result_json.to_string(),
        });
        let end = OutboundEvent::ContentEnd(ContentEndPayload {
            prompt_name,
            content_name,
        });

        for event in [start, result, end] {
            if let Err(err) = session.enqueue(event).await {
                error!(session_id = %session.id, error = %err, "failed to enqueue tool result");
                return;
            }
        }

        dispatcher::notify(
            session,
            &SessionEvent::ToolResult {
                tool_use_id: pending.tool_use_id,
                tool_name: pending.tool_name,
                result: result_json,
            },
        )
        .await;
    }

    async fn invoke(&self, tool_name: &str, arguments: &str) -> Result<Value, CoreError> {
        match tool_name {
            "getDateAndTimeTool" => Ok(self.get_date_and_time()),
            "getWeatherTool" => self.get_weather(arguments).await,
            other => Err(CoreError::UnsupportedTool(other.to_string())),
        }
    }

    fn get_date_and_time(&self) -> Value {
        let now = Utc::now().with_timezone(&Los_Angeles);
        json!({
            "date": now.format("%Y-%m-%d").to_string(),
            "year": now.format("%Y").to_string(),
            "month": now.format("%m").to_string(),
            "day": now.format("%d").to_string(),
            "dayOfWeek": now.format("%A").to_string().to_uppercase(),
            "timezone": "PST",
            "formattedTime": now.format("%I:%M %p").to_string(),
        })
    }

    async fn get_weather(&self, arguments: &str) -> Result<Value, CoreError> {
        let args: WeatherArgs = serde_json::from_str(arguments)
            .map_err(|err| CoreError::ToolFailure(format!("invalid weather arguments: {err}")))?;

        let response = self
            .http
            .get(WEATHER_ENDPOINT)
            .query(&[
                ("latitude", args.latitude.as_str()),
                ("longitude", args.longitude.as_str()),
                ("current_weather", "true"),
            ])
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|err| CoreError::ToolFailure(format!("weather request failed: {err}")))?;

        let weather_data: Value = response
            .json()
            .await
            .map_err(|err| CoreError::ToolFailure(format!("weather response malformed: {err}")))?;

        Ok(json!({ "weather_data": weather_data }))
    }
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn date_and_time_includes_pst_timezone() {
        let invoker = ToolInvoker::new();
        let value = invoker.get_date_and_time();
        assert_eq!(value["timezone"], "PST");
        assert!(value["dayOfWeek"].as_str().unwrap().chars().all(|c| c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn unsupported_tool_is_rejected() {
        let invoker = ToolInvoker::new();
        let err = invoker.invoke("deleteDatabaseTool", "{}").await.unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedTool(_)));
    }
}
