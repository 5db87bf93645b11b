//! Per-session mutable state: tracked identifiers, outbound queue, handler
//! table, and the flags that encode the invariants in the session lifecycle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use voicegate_core::CoreError;

use crate::client_event::SessionEvent;
use crate::queue::OutboundQueue;

/// A registered session-event handler. `"any"` is reserved for the
/// fallback handler invoked after the kind-specific one.
pub type HandlerFn = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Inference sampling parameters carried on `sessionStart`.
#[derive(Debug, Clone, Copy)]
pub struct InferenceParams {
    pub max_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
}

/// Scratch state correlating a `toolUse` event to the `contentEnd(TOOL)`
/// that follows it.
#[derive(Debug, Clone)]
pub struct PendingToolUse {
    pub tool_use_id: String,
    pub tool_name: String,
    pub arguments: String,
}

/// A single in-flight voice conversation.
///
/// Owned behind an `Arc` and shared by the producer task, the response
/// reader, tool-invocation tasks, and the gateway bridge. Fields that
/// multiple tasks mutate concurrently are behind locks; fields that are
/// read far more often than written use atomics.
pub struct Session {
    pub id: String,
    pub prompt_name: String,
    pub voice_id: String,

    audio_content_id: AsyncMutex<Option<String>>,
    active_prompt_ids: AsyncMutex<HashSet<String>>,
    active_content_ids: AsyncMutex<HashMap<String, String>>,

    pub queue: Arc<OutboundQueue>,
    pub close: CancellationToken,

    handlers: DashMap<String, HandlerFn>,

    is_active: AtomicBool,
    is_prompt_start_sent: AtomicBool,
    is_audio_content_start_sent: AtomicBool,

    last_activity: AsyncMutex<Instant>,
    tool_use: AsyncMutex<Option<PendingToolUse>>,

    pub inference_config: InferenceParams,
    custom_system_prompt: AsyncMutex<Option<String>>,
}

impl Session {
    #[must_use]
    pub fn new(id: String, voice_id: String, inference_config: InferenceParams, queue_bound: usize) -> Self {
        Self {
            prompt_name: format!("prompt-{id}"),
            id,
            voice_id,
            audio_content_id: AsyncMutex::new(None),
            active_prompt_ids: AsyncMutex::new(HashSet::new()),
            active_content_ids: AsyncMutex::new(HashMap::new()),
            queue: Arc::new(OutboundQueue::new(queue_bound)),
            close: CancellationToken::new(),
            handlers: DashMap::new(),
            is_active: AtomicBool::new(true),
            is_prompt_start_sent: AtomicBool::new(false),
            is_audio_content_start_sent: AtomicBool::new(false),
            last_activity: AsyncMutex::new(Instant::now()),
            tool_use: AsyncMutex::new(None),
            inference_config,
            custom_system_prompt: AsyncMutex::new(None),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// One-way transition to inactive. Fires the close signal so every
    /// suspension point attached to this session wakes up.
    pub fn deactivate(&self) {
        self.is_active.store(false, Ordering::SeqCst);
        self.close.cancel();
    }

    pub fn mark_prompt_start_sent(&self) {
        self.is_prompt_start_sent.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_prompt_start_sent(&self) -> bool {
        self.is_prompt_start_sent.load(Ordering::SeqCst)
    }

    pub fn mark_audio_content_start_sent(&self) {
        self.is_audio_content_start_sent.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_audio_content_start_sent(&self) -> bool {
        self.is_audio_content_start_sent.load(Ordering::SeqCst)
    }

    pub async fn set_custom_system_prompt(&self, prompt: String) {
        *self.custom_system_prompt.lock().await = Some(prompt);
    }

    pub async fn take_custom_system_prompt(&self) -> Option<String> {
        self.custom_system_prompt.lock().await.take()
    }

    pub async fn touch(&self) {
        *self.last_activity.lock().await = Instant::now();
    }

    pub async fn idle_for(&self) -> std::time::Duration {
        self.last_activity.lock().await.elapsed()
    }

    pub async fn set_audio_content_id(&self, content_id: String) {
        *self.audio_content_id.lock().await = Some(content_id);
    }

    pub async fn audio_content_id(&self) -> Option<String> {
        self.audio_content_id.lock().await.clone()
    }

    pub async fn track_prompt_open(&self, prompt_id: String) {
        self.active_prompt_ids.lock().await.insert(prompt_id);
    }

    pub async fn track_content_open(&self, content_id: String, prompt_id: String) {
        self.active_content_ids.lock().await.insert(content_id, prompt_id);
    }

    pub async fn open_content_ids(&self) -> Vec<(String, String)> {
        self.active_content_ids
            .lock()
            .await
            .iter()
            .map(|(c, p)| (c.clone(), p.clone()))
            .collect()
    }

    pub async fn untrack_content(&self, content_id: &str) {
        self.active_content_ids.lock().await.remove(content_id);
    }

    pub async fn open_prompt_ids(&self) -> Vec<String> {
        self.active_prompt_ids.lock().await.iter().cloned().collect()
    }

    pub async fn untrack_prompt(&self, prompt_id: &str) {
        self.active_prompt_ids.lock().await.remove(prompt_id);
    }

    pub async fn set_pending_tool_use(&self, pending: PendingToolUse) {
        *self.tool_use.lock().await = Some(pending);
    }

    pub async fn take_pending_tool_use(&self) -> Option<PendingToolUse> {
        self.tool_use.lock().await.take()
    }

    /// Register a handler for `kind`. `"any"` registers the fallback
    /// handler invoked after the kind-specific one (if any).
    pub fn on(&self, kind: &str, handler: HandlerFn) {
        self.handlers.insert(kind.to_string(), handler);
    }

    pub fn handler_for(&self, kind: &str) -> Option<HandlerFn> {
        self.handlers.get(kind).map(|h| h.clone())
    }

    /// Enqueue an outbound event, rejecting it once the session is inactive.
    pub async fn enqueue(&self, event: voicegate_core::event::OutboundEvent) -> Result<(), CoreError> {
        if !self.is_active() {
            return Err(CoreError::QueueClosed(self.id.clone()));
        }
        self.touch().await;
        self.queue.enqueue(event).await;
        Ok(())
    }
}
