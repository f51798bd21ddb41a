//! Pure mapping from a live event to a state transition. No I/O.

use super::{Mood, StateDelta};
use crate::ingress::LiveEvent;

/// Evaluates one event against the mood/level policy.
///
/// Gifts always raise the level by the gift magnitude and flip the mood to
/// happy, with a canned thank-you message. Chat text is matched lowercase
/// against fixed keyword rules, first match wins; the chat message itself is
/// answered later by the [`Responder`](crate::Responder), so no message is
/// set here.
pub fn evaluate(event: &LiveEvent) -> StateDelta {
    match event {
        LiveEvent::Gift {
            gift_name,
            repeat_count,
            user_id,
        } => StateDelta {
            level_gain: (*repeat_count).max(1),
            mood: Some(Mood::Happy),
            message: Some(format!("Thank you {user_id} for sending {gift_name}!")),
        },
        LiveEvent::Chat { text, .. } => {
            let text = text.to_lowercase();
            if text.contains("gift") {
                StateDelta {
                    level_gain: 1,
                    mood: Some(Mood::Happy),
                    message: None,
                }
            } else if text.contains("angry") {
                StateDelta {
                    mood: Some(Mood::Angry),
                    ..StateDelta::default()
                }
            } else if text.contains("yay") || text.contains("wow") {
                StateDelta {
                    mood: Some(Mood::Excited),
                    ..StateDelta::default()
                }
            } else {
                StateDelta {
                    mood: Some(Mood::Curious),
                    ..StateDelta::default()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterStore;

    fn chat(text: &str) -> LiveEvent {
        LiveEvent::Chat {
            text: text.to_string(),
            user_id: "viewer".to_string(),
        }
    }

    #[test]
    fn gift_raises_level_by_magnitude_and_thanks_sender() {
        let store = CharacterStore::new("Aiko");
        let delta = evaluate(&LiveEvent::Gift {
            gift_name: "Rose".into(),
            repeat_count: 3,
            user_id: "alice".into(),
        });
        let snap = store.apply(delta);
        assert_eq!(snap.level, 4);
        assert_eq!(snap.mood, Mood::Happy);
        assert_eq!(snap.last_message, "Thank you alice for sending Rose!");
    }

    #[test]
    fn gift_with_zero_repeat_still_counts_once() {
        let delta = evaluate(&LiveEvent::Gift {
            gift_name: "Heart".into(),
            repeat_count: 0,
            user_id: "bob".into(),
        });
        assert_eq!(delta.level_gain, 1);
    }

    #[test]
    fn gift_levels_accumulate_over_a_sequence() {
        let store = CharacterStore::new("Aiko");
        let repeats = [3u32, 0, 7, 1];
        for (i, &n) in repeats.iter().enumerate() {
            store.apply(evaluate(&LiveEvent::Gift {
                gift_name: format!("Gift{i}"),
                repeat_count: n,
                user_id: "carol".into(),
            }));
        }
        let expected: u32 = repeats.iter().map(|&n| n.max(1)).sum();
        assert_eq!(store.snapshot().level, 1 + expected);
    }

    #[test]
    fn chat_rules_follow_priority_order() {
        // "gift" outranks "angry", which outranks "yay"/"wow"
        let delta = evaluate(&chat("an angry gift wow"));
        assert_eq!(delta.level_gain, 1);
        assert_eq!(delta.mood, Some(Mood::Happy));

        let delta = evaluate(&chat("angry about wow"));
        assert_eq!(delta.mood, Some(Mood::Angry));
        assert_eq!(delta.level_gain, 0);

        assert_eq!(evaluate(&chat("yay nice")).mood, Some(Mood::Excited));
        assert_eq!(evaluate(&chat("wow nice")).mood, Some(Mood::Excited));
        assert_eq!(evaluate(&chat("hello there")).mood, Some(Mood::Curious));
    }

    #[test]
    fn chat_matching_ignores_casing() {
        assert_eq!(evaluate(&chat("This Is ANGRY")).mood, Some(Mood::Angry));
        assert_eq!(evaluate(&chat("WOW")).mood, Some(Mood::Excited));
        assert_eq!(evaluate(&chat("GIFT please")).mood, Some(Mood::Happy));
    }

    #[test]
    fn chat_never_sets_the_message() {
        for text in ["gift please", "this is angry", "wow nice", "hello"] {
            assert_eq!(evaluate(&chat(text)).message, None);
        }
    }
}
