//! Observer fan-out: a registry of connected viewer channels keyed by
//! connection id. Delivery is fire-and-forget per observer.

use crate::character::CharacterState;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Push-channel message envelope. `init` goes once to a newly joined
/// observer; `update` fans out on every state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Envelope {
    Init(CharacterState),
    Update(CharacterState),
}

/// Registry of joined observers. Each entry is the sending half of the
/// connection's outbound queue; the socket task owns the receiving half and
/// its removal here is the observer's `leave`.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: DashMap<Uuid, mpsc::UnboundedSender<Envelope>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins an observer: queues its one-time `init` snapshot, then registers
    /// it for updates. The `init` envelope is guaranteed to be the first
    /// message on the queue.
    pub fn join(&self, id: Uuid, tx: mpsc::UnboundedSender<Envelope>, snapshot: CharacterState) {
        if tx.send(Envelope::Init(snapshot)).is_err() {
            // observer vanished during the handshake
            return;
        }
        self.observers.insert(id, tx);
        tracing::debug!(target: "aiko::observers", %id, total = self.observers.len(), "observer joined");
    }

    /// Removes an observer. Duplicate leave is a no-op.
    pub fn leave(&self, id: Uuid) {
        if self.observers.remove(&id).is_some() {
            tracing::debug!(target: "aiko::observers", %id, total = self.observers.len(), "observer left");
        }
    }

    /// Sends an `update` snapshot to every joined observer, best-effort.
    /// Observers whose queue is gone are pruned; the rest still get theirs.
    pub fn broadcast(&self, snapshot: CharacterState) {
        let mut dead = Vec::new();
        for entry in self.observers.iter() {
            if entry.value().send(Envelope::Update(snapshot.clone())).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.leave(id);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterStore;

    fn snapshot() -> CharacterState {
        CharacterStore::new("Aiko").snapshot()
    }

    #[test]
    fn join_delivers_init_before_any_update() {
        let registry = ObserverRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.join(Uuid::new_v4(), tx, snapshot());
        registry.broadcast(snapshot());

        assert!(matches!(rx.try_recv(), Ok(Envelope::Init(_))));
        assert!(matches!(rx.try_recv(), Ok(Envelope::Update(_))));
    }

    #[test]
    fn init_is_sent_exactly_once_per_observer() {
        let registry = ObserverRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.join(Uuid::new_v4(), tx, snapshot());
        registry.broadcast(snapshot());
        registry.broadcast(snapshot());

        let mut inits = 0;
        while let Ok(envelope) = rx.try_recv() {
            if matches!(envelope, Envelope::Init(_)) {
                inits += 1;
            }
        }
        assert_eq!(inits, 1);
    }

    #[test]
    fn broadcast_reaches_all_observers_with_identical_payload() {
        let registry = ObserverRegistry::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.join(Uuid::new_v4(), tx, snapshot());
            receivers.push(rx);
        }

        let mut sent = snapshot();
        sent.level = 42;
        registry.broadcast(sent);

        for rx in &mut receivers {
            let _init = rx.try_recv().unwrap();
            match rx.try_recv().unwrap() {
                Envelope::Update(state) => assert_eq!(state.level, 42),
                other => panic!("expected update, got {other:?}"),
            }
        }
    }

    #[test]
    fn dead_observer_does_not_block_the_rest() {
        let registry = ObserverRegistry::new();

        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        registry.join(Uuid::new_v4(), dead_tx, snapshot());
        drop(dead_rx);

        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        registry.join(Uuid::new_v4(), live_tx, snapshot());

        registry.broadcast(snapshot());

        let _init = live_rx.try_recv().unwrap();
        assert!(matches!(live_rx.try_recv(), Ok(Envelope::Update(_))));
        // the broken observer was pruned
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_leave_is_a_no_op() {
        let registry = ObserverRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.join(id, tx, snapshot());

        registry.leave(id);
        registry.leave(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn envelope_wire_shape() {
        let json = serde_json::to_value(Envelope::Init(snapshot())).unwrap();
        assert_eq!(json["type"], "init");
        assert_eq!(json["data"]["lastMessage"], "Ready to play!");

        let json = serde_json::to_value(Envelope::Update(snapshot())).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["data"]["mood"], "neutral");
    }
}
