//! Process-wide session registry: a capacity-bounded map from session ID to
//! the live `Session`, plus a periodic sweeper that force-closes sessions
//! that have gone idle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client_event::SessionEvent;
use crate::dispatcher;
use crate::session::Session;

const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// DashMap-backed registry of live sessions with atomic capacity accounting
/// so the length check and insert never race (TOCTOU-safe).
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    count: AtomicUsize,
    max_sessions: usize,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SESSIONS)
    }

    #[must_use]
    pub fn with_capacity(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            count: AtomicUsize::new(0),
            max_sessions,
        }
    }

    /// Insert a session, deactivating and replacing whatever was previously
    /// registered under the same ID.
    pub fn insert(&self, session: Arc<Session>) -> bool {
        if !self.try_reserve() {
            warn!(max = self.max_sessions, "session registry at capacity");
            return false;
        }
        if let Some((_, old)) = self.sessions.remove(&session.id) {
            old.deactivate();
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
        self.sessions.insert(session.id.clone(), session);
        true
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|e| e.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| {
            session.deactivate();
            self.count.fetch_sub(1, Ordering::Relaxed);
            session
        })
    }

    fn try_reserve(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Relaxed);
            if current >= self.max_sessions {
                return false;
            }
            if self
                .count
                .compare_exchange_weak(current, current + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Start a background task that force-closes sessions idle past
    /// `max_idle`. Returns the `CancellationToken` that stops the sweeper.
    pub fn start_sweeper(self: &Arc<Self>, max_idle: Duration, interval: Duration) -> CancellationToken {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    () = shutdown.cancelled() => {
                        info!("session registry sweeper shutting down");
                        return;
                    }
                }

                let ids: Vec<String> = registry.sessions.iter().map(|e| e.key().clone()).collect();
                let mut stale = Vec::new();
                for id in ids {
                    if let Some(session) = registry.get(&id) {
                        if session.idle_for().await >= max_idle {
                            stale.push(session);
                        }
                    }
                }

                for session in &stale {
                    dispatcher::notify(
                        session,
                        &SessionEvent::Error {
                            message: "session idle timeout".to_string(),
                        },
                    )
                    .await;
                    dispatcher::notify(session, &SessionEvent::StreamComplete).await;

                    if registry.remove(&session.id).is_some() {
                        debug!(session_id = %session.id, "sweeper force-closed idle session");
                    }
                }

                if !stale.is_empty() {
                    debug!(count = stale.len(), "sweeper cycle reaped idle sessions");
                }
            }
        });
        info!(max_idle = ?max_idle, interval = ?interval, "session registry sweeper started");
        token
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
