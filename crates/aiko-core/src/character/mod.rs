//! Character state: the single mutable record every other component reads
//! from and writes to, plus the pure mood policy and the repetition window.

mod policy;
mod repetition;

pub use policy::evaluate;
pub use repetition::RepetitionWindow;

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Enumerated emotional state, fully overwritten on each processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Neutral,
    Happy,
    Angry,
    Curious,
    Excited,
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Angry => "angry",
            Mood::Curious => "curious",
            Mood::Excited => "excited",
        };
        f.write_str(s)
    }
}

/// Complete character snapshot, exactly the shape sent to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterState {
    pub name: String,
    pub level: u32,
    pub mood: Mood,
    pub last_message: String,
}

impl CharacterState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 1,
            mood: Mood::Neutral,
            last_message: "Ready to play!".to_string(),
        }
    }
}

/// A state transition produced by the policy engine or the responder.
/// `level` only ever grows; `mood` and `message` overwrite when set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub level_gain: u32,
    pub mood: Option<Mood>,
    pub message: Option<String>,
}

impl StateDelta {
    /// Delta that only replaces the last message (the responder's completion path).
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Owns the singleton [`CharacterState`]. Mutation goes through [`apply`],
/// which returns the post-mutation snapshot so callers always broadcast a
/// complete, consistent state.
///
/// [`apply`]: CharacterStore::apply
pub struct CharacterStore {
    state: RwLock<CharacterState>,
}

impl CharacterStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(CharacterState::new(name)),
        }
    }

    /// Complete copy of the current state.
    pub fn snapshot(&self) -> CharacterState {
        self.state.read().expect("character lock poisoned").clone()
    }

    /// Applies a delta atomically and returns the resulting snapshot.
    pub fn apply(&self, delta: StateDelta) -> CharacterState {
        let mut state = self.state.write().expect("character lock poisoned");
        state.level += delta.level_gain;
        if let Some(mood) = delta.mood {
            state.mood = mood;
        }
        if let Some(message) = delta.message {
            state.last_message = message;
        }
        state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_renderable() {
        let state = CharacterState::new("Aiko");
        assert_eq!(state.level, 1);
        assert_eq!(state.mood, Mood::Neutral);
        assert_eq!(state.last_message, "Ready to play!");
    }

    #[test]
    fn apply_returns_post_mutation_snapshot() {
        let store = CharacterStore::new("Aiko");
        let snap = store.apply(StateDelta {
            level_gain: 3,
            mood: Some(Mood::Happy),
            message: Some("hi".into()),
        });
        assert_eq!(snap.level, 4);
        assert_eq!(snap.mood, Mood::Happy);
        assert_eq!(snap.last_message, "hi");
        // and the store agrees
        assert_eq!(store.snapshot().level, 4);
    }

    #[test]
    fn level_is_monotonic_across_deltas() {
        let store = CharacterStore::new("Aiko");
        for gain in [2u32, 0, 5, 1] {
            store.apply(StateDelta {
                level_gain: gain,
                ..StateDelta::default()
            });
        }
        assert_eq!(store.snapshot().level, 1 + 2 + 5 + 1);
    }

    #[test]
    fn empty_delta_changes_nothing() {
        let store = CharacterStore::new("Aiko");
        let before = store.snapshot();
        let after = store.apply(StateDelta::default());
        assert_eq!(after.level, before.level);
        assert_eq!(after.mood, before.mood);
        assert_eq!(after.last_message, before.last_message);
    }

    #[test]
    fn snapshot_wire_shape_is_camel_case() {
        let json = serde_json::to_value(CharacterState::new("Aiko")).unwrap();
        assert_eq!(json["name"], "Aiko");
        assert_eq!(json["level"], 1);
        assert_eq!(json["mood"], "neutral");
        assert_eq!(json["lastMessage"], "Ready to play!");
    }
}
