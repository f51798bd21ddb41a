//! Live-feed ingress: decodes the relay's event stream into [`LiveEvent`]s
//! and drives them through policy, response generation, and fan-out.
//!
//! A single [`EventRouter`] task consumes the bounded event queue. Gift
//! events apply synchronously, so they are atomic relative to each other.
//! Chat events apply their mood/level change synchronously and then spawn
//! the streamed-completion continuation, so the loop keeps consuming while
//! the provider is thinking. Two overlapping chats race to set the last
//! message: the later completion wins, with no ordering guarantee relative
//! to arrival.

use crate::character::{self, CharacterStore, RepetitionWindow, StateDelta};
use crate::observers::ObserverRegistry;
use crate::responder::Responder;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Capacity of the ingress queue between the feed adapter and the router.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// An event from the live-stream provider, already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Gift {
        gift_name: String,
        repeat_count: u32,
        user_id: String,
    },
    Chat {
        text: String,
        user_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(rename = "uniqueId")]
    unique_id: String,
}

/// Raw relay event. Unknown `type`s deserialize to `Unknown` and are skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireEvent {
    Gift {
        #[serde(rename = "giftName")]
        gift_name: String,
        #[serde(rename = "repeatCount", default)]
        repeat_count: u32,
        user: WireUser,
    },
    Chat {
        comment: String,
        user: WireUser,
    },
    #[serde(other)]
    Unknown,
}

/// Decodes one relay line. Malformed or unrecognized lines yield `None`.
fn decode_line(line: &str) -> Option<LiveEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<WireEvent>(line) {
        Ok(WireEvent::Gift {
            gift_name,
            repeat_count,
            user,
        }) => Some(LiveEvent::Gift {
            gift_name,
            repeat_count,
            user_id: user.unique_id,
        }),
        Ok(WireEvent::Chat { comment, user }) => Some(LiveEvent::Chat {
            text: comment,
            user_id: user.unique_id,
        }),
        Ok(WireEvent::Unknown) => {
            tracing::debug!(target: "aiko::ingress", "skipping unrecognized event: {line}");
            None
        }
        Err(e) => {
            tracing::debug!(target: "aiko::ingress", "skipping malformed event ({e}): {line}");
            None
        }
    }
}

/// Connects to the live-feed relay and forwards decoded events into the
/// ingress queue. Ends when the feed closes or the queue is dropped; there is
/// no automatic reconnect.
pub struct WebcastSource {
    client: reqwest::Client,
    url: String,
    username: String,
}

impl WebcastSource {
    pub fn new(base_url: &str, username: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/{}", base_url.trim_end_matches('/'), username),
            username: username.to_string(),
        }
    }

    pub async fn run(
        self,
        tx: mpsc::Sender<LiveEvent>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        tracing::info!(target: "aiko::ingress", "connected to live stream: {}", self.username);

        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline_pos) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline_pos).collect();
                if let Some(event) = decode_line(&line) {
                    if tx.send(event).await.is_err() {
                        return Ok(()); // router gone, stop ingesting
                    }
                }
            }
        }
        tracing::info!(target: "aiko::ingress", "live stream ended: {}", self.username);
        Ok(())
    }
}

/// The single consuming loop over the ingress queue, owning everything a
/// handled event touches.
pub struct EventRouter {
    store: Arc<CharacterStore>,
    window: Mutex<RepetitionWindow>,
    responder: Arc<Responder>,
    observers: Arc<ObserverRegistry>,
}

impl EventRouter {
    pub fn new(
        store: Arc<CharacterStore>,
        responder: Arc<Responder>,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            store,
            window: Mutex::new(RepetitionWindow::new()),
            responder,
            observers,
        }
    }

    /// Processes events until the queue closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<LiveEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
    }

    fn handle(self: &Arc<Self>, event: LiveEvent) {
        match &event {
            LiveEvent::Gift {
                gift_name,
                repeat_count,
                user_id,
            } => {
                tracing::info!(
                    target: "aiko::ingress",
                    "gift: {gift_name} x{repeat_count} from {user_id}"
                );
                let snapshot = self.store.apply(character::evaluate(&event));
                self.observers.broadcast(snapshot);
            }
            LiveEvent::Chat { text, user_id } => {
                tracing::info!(target: "aiko::ingress", "{user_id}: {text}");
                let normalized = text.to_lowercase();
                let prior = self
                    .window
                    .lock()
                    .expect("repetition lock poisoned")
                    .record_and_count(&normalized);

                // mood/level change now; the reply broadcasts when it lands
                self.store.apply(character::evaluate(&event));

                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let snapshot = this.store.snapshot();
                    let reply = this.responder.respond(&normalized, &snapshot, prior).await;
                    let snapshot = this.store.apply(StateDelta::message(reply));
                    this.observers.broadcast(snapshot);
                });
            }
        }
    }
}
