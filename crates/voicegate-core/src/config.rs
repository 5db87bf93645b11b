//! Gateway configuration — flags with environment variable fallbacks.

use std::path::PathBuf;

use clap::Parser;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Default bound on the per-session outbound queue.
pub const DEFAULT_QUEUE_BOUND: usize = 200;

/// Default idle threshold before the sweeper force-closes a session.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default interval between idle-sweeper passes.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default budget given to an in-order teardown before it is abandoned for force-close.
pub const DEFAULT_TEARDOWN_BUDGET_SECS: u64 = 5;

/// Default per-request timeout against the upstream speech service.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 300;

/// Default timeout for the `getWeatherTool` HTTP call.
pub const DEFAULT_WEATHER_TIMEOUT_SECS: u64 = 5;

fn default_system_prompt() -> String {
    "You are a friendly, helpful assistant having a spoken conversation. \
     Keep responses concise and conversational."
        .to_string()
}

/// Typed configuration for the voice gateway, sourced from CLI flags or the
/// matching environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "voicegate", about = "Real-time voice conversation gateway")]
pub struct GatewayConfig {
    /// Address and port the gateway listens on.
    #[arg(long, env = "VOICEGATE_LISTEN_ADDR", default_value = "0.0.0.0:8787")]
    pub listen_addr: String,

    /// Base URL of the upstream speech-to-speech inference service.
    #[arg(long, env = "VOICEGATE_UPSTREAM_URL")]
    pub upstream_url: String,

    /// Bearer token presented to the upstream service.
    #[arg(long, env = "VOICEGATE_UPSTREAM_TOKEN")]
    pub upstream_token: String,

    /// AWS-style region label forwarded in upstream request metadata.
    #[arg(long, env = "VOICEGATE_UPSTREAM_REGION", default_value = "us-east-1")]
    pub upstream_region: String,

    /// Per-request timeout against the upstream service, in seconds.
    #[arg(long, env = "VOICEGATE_UPSTREAM_TIMEOUT_SECS", default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS)]
    pub upstream_timeout_secs: u64,

    /// Maximum concurrent upstream streams per client.
    #[arg(long, env = "VOICEGATE_MAX_STREAMS_PER_CLIENT", default_value_t = 10)]
    pub max_streams_per_client: usize,

    /// Bound on the per-session outbound queue (audio items dropped oldest-first past this).
    #[arg(long, env = "VOICEGATE_QUEUE_BOUND", default_value_t = DEFAULT_QUEUE_BOUND)]
    pub queue_bound: usize,

    /// Seconds of inactivity before the idle sweeper force-closes a session.
    #[arg(long, env = "VOICEGATE_IDLE_TIMEOUT_SECS", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Seconds between idle-sweeper passes.
    #[arg(long, env = "VOICEGATE_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,

    /// Seconds an ordered teardown is given before force-close takes over.
    #[arg(long, env = "VOICEGATE_TEARDOWN_BUDGET_SECS", default_value_t = DEFAULT_TEARDOWN_BUDGET_SECS)]
    pub teardown_budget_secs: u64,

    /// Default inference max-token budget.
    #[arg(long, env = "VOICEGATE_MAX_TOKENS", default_value_t = 1024)]
    pub max_tokens: u32,

    /// Default inference top-p.
    #[arg(long, env = "VOICEGATE_TOP_P", default_value_t = 0.9)]
    pub top_p: f32,

    /// Default inference temperature.
    #[arg(long, env = "VOICEGATE_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,

    /// Default system prompt used when a client does not supply its own.
    #[arg(long, env = "VOICEGATE_SYSTEM_PROMPT", default_value_t = default_system_prompt())]
    pub default_system_prompt: String,

    /// Default synthesized-voice identifier.
    #[arg(long, env = "VOICEGATE_VOICE_ID", default_value = "tiffany")]
    pub default_voice_id: String,

    /// Optional static asset directory for SPA serving.
    #[arg(long, env = "VOICEGATE_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Comma-separated list of allowed CORS origins. Empty means allow all.
    #[arg(long, env = "VOICEGATE_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,
}

impl GatewayConfig {
    /// Resolve the configured CORS policy.
    #[must_use]
    pub fn cors(&self) -> CorsConfig {
        if self.allowed_origins.is_empty() {
            CorsConfig::AllowAll
        } else {
            CorsConfig::AllowOrigins(self.allowed_origins.clone())
        }
    }

    #[must_use]
    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub fn teardown_budget(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.teardown_budget_secs)
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.upstream_timeout_secs)
    }
}
