//! Session engine: owns the per-session state machine, the outbound event
//! queue, the remote stream driver, and tool-call correlation. Wraps
//! `voicegate-core`'s wire protocol types with the runtime machinery that
//! drives a live conversation.

pub mod client_event;
pub mod dispatcher;
pub mod driver;
pub mod lifecycle;
pub mod queue;
pub mod registry;
pub mod session;
pub mod tools;

pub use client_event::SessionEvent;
pub use lifecycle::SessionLifecycleManager;
pub use registry::SessionRegistry;
pub use session::{HandlerFn, InferenceParams, PendingToolUse, Session};
pub use tools::ToolInvoker;

pub use voicegate_core::CoreError;
