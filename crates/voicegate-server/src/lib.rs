//! Axum web server: the Gateway Bridge binding browser WebSocket clients to
//! the voice session engine, plus the ambient HTTP surface.

pub mod bootstrap;
pub mod bridge;
pub mod routes;
pub mod state;

pub use bootstrap::{GatewayContext, bootstrap, start_server};
pub use state::AppState;
