//! Session lifecycle manager: creation, ordered initiation, audio
//! streaming, ordered teardown, idle sweeping, and force-close.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};
use voicegate_core::CoreError;
use voicegate_core::GatewayConfig;
use voicegate_core::event::{
    AudioInputConfiguration, AudioInputPayload, AudioOutputConfiguration, ContentEndPayload,
    ContentRole, ContentStartPayload, ContentType, InferenceConfiguration, OutboundEvent,
    PromptEndPayload, PromptStartPayload, SessionEndPayload, SessionStartPayload,
    TextInputPayload, TextOutputConfiguration, ToolConfiguration, ToolDescriptor, ToolSpec,
};

use crate::driver;
use crate::registry::SessionRegistry;
use crate::session::{InferenceParams, Session};
use crate::tools::ToolInvoker;

/// A single 4-byte frame of silence, used as the mandatory non-empty audio
/// chunk that precedes closing an audio content block.
const SILENCE_SENTINEL: [u8; 4] = [0, 0, 0, 0];

/// Pause between ordered initiation/teardown steps to give the upstream
/// time to accept each event before the next is sent.
const STEP_SETTLE: Duration = Duration::from_millis(50);

pub struct SessionLifecycleManager {
    registry: Arc<SessionRegistry>,
    http: reqwest::Client,
    config: Arc<GatewayConfig>,
    tools: Arc<ToolInvoker>,
}

impl SessionLifecycleManager {
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, config: Arc<GatewayConfig>) -> Self {
        Self {
            registry,
            http: reqwest::Client::new(),
            config,
            tools: Arc::new(ToolInvoker::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start the idle sweeper using the configured interval/threshold.
    pub fn start_sweeper(&self) -> tokio_util::sync::CancellationToken {
        self.registry
            .start_sweeper(self.config.idle_timeout(), self.config.sweep_interval())
    }

    /// Allocate a new session and register it, deactivating any prior
    /// session registered under the same ID.
    #[must_use]
    pub fn create_session(&self, id: String) -> Option<Arc<Session>> {
        let inference = InferenceParams {
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            temperature: self.config.temperature,
        };
        let session = Arc::new(Session::new(
            id,
            self.config.default_voice_id.clone(),
            inference,
            self.config.queue_bound,
        ));
        if !self.registry.insert(Arc::clone(&session)) {
            return None;
        }
        Some(session)
    }

    /// Seed the fixed opening sequence and spawn the remote stream driver.
    pub async fn initiate(&self, session: &Arc<Session>, system_prompt: Option<String>) -> Result<(), CoreError> {
        let prompt = system_prompt.unwrap_or_else(|| self.config.default_system_prompt.clone());

        session
            .enqueue(OutboundEvent::SessionStart(SessionStartPayload {
                inference_configuration: InferenceConfiguration {
                    max_tokens: session.inference_config.max_tokens,
                    top_p: session.inference_config.top_p,
                    temperature: session.inference_config.temperature,
                },
            }))
            .await?;
        sleep(STEP_SETTLE).await;

        session
            .enqueue(OutboundEvent::PromptStart(PromptStartPayload {
                prompt_name: session.prompt_name.clone(),
                text_output_configuration: TextOutputConfiguration {
                    media_type: "text/plain".to_string(),
                },
                audio_output_configuration: AudioOutputConfiguration {
                    audio_type: "SPEECH".to_string(),
                    encoding: "base64".to_string(),
                    media_type: "audio/lpcm".to_string(),
                    sample_rate_hertz: 24_000,
                    sample_size_bits: 16,
                    channel_count: 1,
                    voice_id: session.voice_id.clone(),
                },
                tool_use_output_configuration: TextOutputConfiguration {
                    media_type: "application/json".to_string(),
                },
                tool_configuration: ToolConfiguration {
                    tools: vec![
                        ToolDescriptor {
                            tool_spec: ToolSpec {
                                name: "getDateAndTimeTool".to_string(),
                                description: "Get the current date and time in Pacific time.".to_string(),
                                input_schema: json!({"type": "object", "properties": {}}),
                            },
                        },
                        ToolDescriptor {
                            tool_spec: ToolSpec {
                                name: "getWeatherTool".to_string(),
                                description: "Get the current weather for a latitude/longitude.".to_string(),
                                input_schema: json!({
                                    "type": "object",
                                    "properties": {
                                        "latitude": {"type": "string"},
                                        "longitude": {"type": "string"}
                                    },
                                    "required": ["latitude", "longitude"]
                                }),
                            },
                        },
                    ],
                },
            }))
            .await?;
        session.track_prompt_open(session.prompt_name.clone()).await;
        session.mark_prompt_start_sent();
        sleep(STEP_SETTLE).await;

        let system_content_id = uuid::Uuid::new_v4().to_string();
        session
            .enqueue(OutboundEvent::ContentStart(ContentStartPayload {
                prompt_name: session.prompt_name.clone(),
                content_name: system_content_id.clone(),
                content_type: ContentType::Text,
                interactive: false,
                role: ContentRole::System,
                text_input_configuration: Some(TextOutputConfiguration {
                    media_type: "text/plain".to_string(),
                }),
                audio_input_configuration: None,
                tool_result_input_configuration: None,
            }))
            .await?;
        session
            .track_content_open(system_content_id.clone(), session.prompt_name.clone())
            .await;
        session
            .enqueue(OutboundEvent::TextInput(TextInputPayload {
                prompt_name: session.prompt_name.clone(),
                content_name: system_content_id.clone(),
                content: prompt,
            }))
            .await?;
        session
            .enqueue(OutboundEvent::ContentEnd(ContentEndPayload {
                prompt_name: session.prompt_name.clone(),
                content_name: system_content_id.clone(),
            }))
            .await?;
        session.untrack_content(&system_content_id).await;
        sleep(STEP_SETTLE).await;

        let audio_content_id = uuid::Uuid::new_v4().to_string();
        session
            .enqueue(OutboundEvent::ContentStart(ContentStartPayload {
                prompt_name: session.prompt_name.clone(),
                content_name: audio_content_id.clone(),
                content_type: ContentType::Audio,
                interactive: true,
                role: ContentRole::User,
                text_input_configuration: None,
                audio_input_configuration: Some(AudioInputConfiguration {
                    audio_type: "SPEECH".to_string(),
                    encoding: "base64".to_string(),
                    media_type: "audio/lpcm".to_string(),
                    sample_rate_hertz: 16_000,
                    sample_size_bits: 16,
                    channel_count: 1,
                }),
                tool_result_input_configuration: None,
            }))
            .await?;
        session.set_audio_content_id(audio_content_id.clone()).await;
        session
            .track_content_open(audio_content_id.clone(), session.prompt_name.clone())
            .await;
        session.mark_audio_content_start_sent();

        // Workaround: upstream rejects an audio content block that receives
        // no data before being closed. Seed one silent chunk immediately.
        self.stream_audio(session, &SILENCE_SENTINEL).await?;

        let http = self.http.clone();
        let session_for_driver = Arc::clone(session);
        let config = Arc::clone(&self.config);
        let tools = Arc::clone(&self.tools);
        tokio::spawn(async move {
            driver::run(http, session_for_driver, config, tools).await;
        });

        Ok(())
    }

    /// Enqueue one chunk of user audio, base64-encoded, against the
    /// session's open audio content block.
    pub async fn stream_audio(&self, session: &Arc<Session>, pcm: &[u8]) -> Result<(), CoreError> {
        let Some(content_id) = session.audio_content_id().await else {
            return Err(CoreError::Validation(
                "audio content not yet opened for this session".to_string(),
            ));
        };
        session
            .enqueue(OutboundEvent::AudioInput(AudioInputPayload {
                prompt_name: session.prompt_name.clone(),
                content_name: content_id,
                content: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, pcm),
            }))
            .await
    }

    /// Ordered teardown: ensure audio has data, close every open content
    /// block, close every open prompt, emit `sessionEnd`, then remove the
    /// session from the registry. Best-effort — every step runs even if an
    /// earlier one failed.
    pub async fn teardown(&self, session: &Arc<Session>) {
        if session.is_audio_content_start_sent() {
            let _ = self.stream_audio(session, &SILENCE_SENTINEL).await;
        }

        for (content_id, prompt_id) in session.open_content_ids().await {
            let result = session
                .enqueue(OutboundEvent::ContentEnd(ContentEndPayload {
                    prompt_name: prompt_id,
                    content_name: content_id.clone(),
                }))
                .await;
            if let Err(err) = result {
                warn!(session_id = %session.id, error = %err, "failed to enqueue contentEnd during teardown");
            }
            session.untrack_content(&content_id).await;
        }
        sleep(STEP_SETTLE).await;

        for prompt_id in session.open_prompt_ids().await {
            let result = session
                .enqueue(OutboundEvent::PromptEnd(PromptEndPayload {
                    prompt_name: prompt_id.clone(),
                }))
                .await;
            if let Err(err) = result {
                warn!(session_id = %session.id, error = %err, "failed to enqueue promptEnd during teardown");
            }
            session.untrack_prompt(&prompt_id).await;
        }
        sleep(STEP_SETTLE).await;

        let _ = session.enqueue(OutboundEvent::SessionEnd(SessionEndPayload {})).await;

        session.deactivate();
        self.registry.remove(&session.id);
        info!(session_id = %session.id, "session torn down");
    }

    /// Run `teardown` but give up after `budget` and force-close instead.
    pub async fn teardown_with_budget(&self, session: &Arc<Session>, budget: Duration) {
        if tokio::time::timeout(budget, self.teardown(session)).await.is_err() {
            warn!(session_id = %session.id, "teardown exceeded budget; force-closing");
            self.force_close(&session.id);
        }
    }

    /// Bypass ordered teardown entirely. Idempotent — a second call on an
    /// already-removed ID is a no-op.
    pub fn force_close(&self, session_id: &str) {
        if let Some(session) = self.registry.remove(session_id) {
            session.deactivate();
            info!(session_id, "session force-closed");
        }
    }
}
