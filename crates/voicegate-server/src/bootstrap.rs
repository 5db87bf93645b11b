//! Composition root: wires the session engine's lifecycle manager and
//! registry together and starts the HTTP/WebSocket server.

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use voicegate_core::GatewayConfig;
use voicegate_engine::{SessionLifecycleManager, SessionRegistry};

/// Application context shared by every handler.
pub struct GatewayContext {
    pub lifecycle: SessionLifecycleManager,
    pub config: Arc<GatewayConfig>,
}

/// Build the gateway context: session registry, lifecycle manager, and idle
/// sweeper. The returned sweeper token is dropped immediately — the sweeper
/// runs for the lifetime of the process, stopped only by process exit.
pub fn bootstrap(config: GatewayConfig) -> Arc<GatewayContext> {
    let config = Arc::new(config);
    let registry = Arc::new(SessionRegistry::new());
    let lifecycle = SessionLifecycleManager::new(registry, Arc::clone(&config));
    let _sweeper = lifecycle.start_sweeper();

    info!(listen_addr = %config.listen_addr, "voice gateway bootstrapped");

    Arc::new(GatewayContext { lifecycle, config })
}

/// Start the web server, serving the WebSocket bridge and the ambient HTTP
/// surface, optionally with static asset serving for SPA deployment.
pub async fn start_server(config: GatewayConfig) -> Result<()> {
    let listen_addr = config.listen_addr.clone();
    let static_dir = config.static_dir.clone();
    let cors = config.cors();
    let ctx = bootstrap(config);

    let app = if let Some(ref dir) = static_dir {
        info!(static_dir = %dir.display(), "serving static assets");
        crate::routes::create_spa_router(ctx, dir, &cors)
    } else {
        crate::routes::create_router(ctx, &cors)
    };

    let listener = TcpListener::bind(&listen_addr).await?;
    info!(addr = %listen_addr, "voice gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
