//! Outbound queue: the single producer/consumer buffer that decouples event
//! generation from the lazy stream driving the upstream request body.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use voicegate_core::event::{InferenceConfiguration, OutboundEvent, SessionStartPayload, encode_outbound};

use crate::session::InferenceParams;

/// How long the consumer waits on an empty queue before re-checking state
/// and, if nothing has ever been produced, re-seeding `sessionStart`.
const IDLE_RECHECK: Duration = Duration::from_secs(10);

struct Inner {
    items: VecDeque<OutboundEvent>,
    audio_count: usize,
}

/// Bounded FIFO feeding the upstream request body. Non-audio events are
/// always accepted; once the number of buffered `audioInput` items reaches
/// `bound`, the oldest `audioInput` item is dropped before the new one is
/// appended.
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    bound: usize,
}

impl OutboundQueue {
    #[must_use]
    pub fn new(bound: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                audio_count: 0,
            }),
            notify: Notify::new(),
            bound,
        }
    }

    pub async fn enqueue(&self, event: OutboundEvent) {
        let mut inner = self.inner.lock().await;
        let is_audio = matches!(event, OutboundEvent::AudioInput(_));
        if is_audio && inner.audio_count >= self.bound {
            if let Some(pos) = inner
                .items
                .iter()
                .position(|e| matches!(e, OutboundEvent::AudioInput(_)))
            {
                inner.items.remove(pos);
                inner.audio_count -= 1;
                warn!("outbound queue at audio bound; dropped oldest audioInput chunk");
            }
        }
        if is_audio {
            inner.audio_count += 1;
        }
        inner.items.push_back(event);
        drop(inner);
        self.notify.notify_waiters();
    }

    async fn try_dequeue(&self) -> Option<OutboundEvent> {
        let mut inner = self.inner.lock().await;
        let event = inner.items.pop_front()?;
        if matches!(event, OutboundEvent::AudioInput(_)) {
            inner.audio_count -= 1;
        }
        Some(event)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }
}

/// Adapt a session's outbound queue into a lazy byte stream suitable for
/// `reqwest::Body::wrap_stream`. Ends when `close` is cancelled and the
/// queue has been drained. `seed_config` is used to rebuild `sessionStart`
/// if the queue has produced nothing by the time the idle timer fires.
pub fn into_body_stream(
    queue: std::sync::Arc<OutboundQueue>,
    close: CancellationToken,
    seed_config: InferenceParams,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    futures_util::stream::unfold(
        (queue, close, seed_config, false),
        |(queue, close, seed_config, mut seeded)| async move {
            loop {
                if let Some(event) = queue.try_dequeue().await {
                    seeded = true;
                    let mut line = match encode_outbound(&event) {
                        Ok(line) => line,
                        Err(err) => {
                            return Some((
                                Err(std::io::Error::other(err.to_string())),
                                (queue, close, seed_config, seeded),
                            ));
                        }
                    };
                    line.push('\n');
                    return Some((Ok(Bytes::from(line)), (queue, close, seed_config, seeded)));
                }

                if close.is_cancelled() {
                    return None;
                }

                tokio::select! {
                    () = queue.notify.notified() => {}
                    () = close.cancelled() => return None,
                    () = tokio::time::sleep(IDLE_RECHECK) => {
                        if !seeded {
                            warn!("outbound queue produced nothing within idle window; re-seeding sessionStart");
                            queue.enqueue(OutboundEvent::SessionStart(SessionStartPayload {
                                inference_configuration: InferenceConfiguration {
                                    max_tokens: seed_config.max_tokens,
                                    top_p: seed_config.top_p,
                                    temperature: seed_config.temperature,
                                },
                            }))
                            .await;
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicegate_core::event::{AudioInputPayload, PromptEndPayload};

    fn audio(n: u32) -> OutboundEvent {
        OutboundEvent::AudioInput(AudioInputPayload {
            prompt_name: "p".into(),
            content_name: "c".into(),
            content: n.to_string(),
        })
    }

    #[tokio::test]
    async fn drops_oldest_audio_past_bound() {
        let queue = OutboundQueue::new(2);
        queue.enqueue(audio(1)).await;
        queue.enqueue(audio(2)).await;
        queue.enqueue(audio(3)).await;
        assert_eq!(queue.len().await, 2);
        let first = queue.try_dequeue().await.unwrap();
        match first {
            OutboundEvent::AudioInput(p) => assert_eq!(p.content, "2"),
            _ => panic!("expected audio"),
        }
    }

    #[tokio::test]
    async fn never_drops_non_audio() {
        let queue = OutboundQueue::new(1);
        queue.enqueue(audio(1)).await;
        queue.enqueue(audio(2)).await;
        queue
            .enqueue(OutboundEvent::PromptEnd(PromptEndPayload {
                prompt_name: "p".into(),
            }))
            .await;
        assert_eq!(queue.len().await, 2);
    }
}
