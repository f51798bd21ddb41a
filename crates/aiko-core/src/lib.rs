//! aiko-core: live character core library (state store, mood policy,
//! response orchestration, observer fan-out, live-feed ingress).
//!
//! The gateway binary wires these pieces together; everything with ordering,
//! consistency, or failure-handling concerns lives here.

mod character;
mod ingress;
mod llm;
mod observers;
mod responder;
mod shared;

pub use shared::CoreConfig;

pub use character::{CharacterState, CharacterStore, Mood, RepetitionWindow, StateDelta};

pub use llm::{CompletionProvider, Fragment, GroqClient, LlmError, MockClient};

pub use responder::Responder;

pub use observers::{Envelope, ObserverRegistry};

pub use ingress::{EventRouter, LiveEvent, WebcastSource, EVENT_QUEUE_DEPTH};
