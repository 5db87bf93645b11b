//! Voice gateway binary — the composition root.

use clap::Parser;
use voicegate_core::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::parse();
    voicegate_server::start_server(config).await
}
