//! Response orchestration: prompt assembly, stream draining, fallbacks.

use crate::character::CharacterState;
use crate::llm::CompletionProvider;
use std::sync::Arc;

const NO_WORDS_FALLBACK: &str = "Hmm… I have no words right now!";
const ERROR_FALLBACK: &str = "Oops! My circuits got tangled.";

/// Coordinates the generative call for one chat message. All provider
/// failures are converted to a displayable fallback here; callers always get
/// a string they can show.
pub struct Responder {
    provider: Arc<dyn CompletionProvider>,
}

impl Responder {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Generates the character's reply to `text`, fully draining the
    /// provider's fragment stream. A mid-stream error discards whatever was
    /// accumulated in favor of the fallback.
    pub async fn respond(
        &self,
        text: &str,
        state: &CharacterState,
        prior_occurrences: usize,
    ) -> String {
        let prompt = build_prompt(text, state, prior_occurrences);

        let mut rx = match self.provider.stream_completion(&prompt).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::error!(target: "aiko::chat", "completion request failed: {e}");
                return ERROR_FALLBACK.to_string();
            }
        };

        let mut reply = String::new();
        while let Some(fragment) = rx.recv().await {
            match fragment {
                Ok(text) => reply.push_str(&text),
                Err(e) => {
                    tracing::error!(target: "aiko::chat", "completion stream failed: {e}");
                    return ERROR_FALLBACK.to_string();
                }
            }
        }

        if reply.is_empty() {
            NO_WORDS_FALLBACK.to_string()
        } else {
            reply
        }
    }
}

/// Bounded prompt: persona, optional repetition twist, the viewer's text,
/// and the character's current mood and level.
fn build_prompt(text: &str, state: &CharacterState, prior_occurrences: usize) -> String {
    let repetition_note = if prior_occurrences > 0 {
        format!(
            "Add a funny twist because viewer repeated this command {prior_occurrences} time(s).\n"
        )
    } else {
        String::new()
    };

    format!(
        "You are {name}, a funny and reactive AI character.\n\
         React to viewer commands with:\n\
         - Short emotional response\n\
         - Playful Tagalog joke or mild curse\n\
         - Keep it fun and engaging for live viewers\n\
         {repetition_note}\
         Viewer says: \"{text}\"\n\
         Character current mood: {mood}, Level: {level}\n\
         Respond in 1-2 sentences max.",
        name = state.name,
        mood = state.mood,
        level = state.level,
    )
}
