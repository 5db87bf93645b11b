//! Shared domain types, configuration, and error taxonomy for the voice
//! conversation gateway: the wire protocol spoken with the upstream
//! speech-to-speech service, the typed configuration surface, and the
//! error enum both the engine and the HTTP adapter build on.

pub mod config;
pub mod error;
pub mod event;

pub use config::{CorsConfig, GatewayConfig};
pub use error::CoreError;
pub use event::{InboundEvent, OutboundEvent, decode_inbound, encode_outbound};
