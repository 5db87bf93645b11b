//! Shared application state type.

use std::sync::Arc;

use crate::bootstrap::GatewayContext;

pub type AppState = Arc<GatewayContext>;
