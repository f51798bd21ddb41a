//! Streaming completion provider: a focused client for the Groq
//! chat-completions API plus a mock for keyless runs and tests.
//!
//! Providers hand back an `mpsc::Receiver<Fragment>` of text deltas; the
//! stream is lazy, finite, and non-restartable, and a broken stream delivers
//! its error as the final item so the consumer can discard partial output.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

const API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const MAX_COMPLETION_TOKENS: u32 = 150;
const CHUNK_CHANNEL_DEPTH: usize = 64;

/// Errors that can occur when talking to the completion API.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Items on the fragment channel: text deltas, or the error that broke the
/// stream (always the last item when present).
pub type Fragment = Result<String, LlmError>;

/// A generative text backend. Returns the fragment stream for one prompt.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn stream_completion(&self, prompt: &str) -> Result<mpsc::Receiver<Fragment>, LlmError>;
}

/// Groq chat-completions client (OpenAI-compatible SSE streaming).
#[derive(Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the GROQ_API_KEY environment variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("GROQ_API_KEY").map_err(|_| LlmError::NoApiKey)?;
        if api_key.is_empty() {
            return Err(LlmError::NoApiKey);
        }
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(&self, prompt: &str) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 1.0,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            top_p: 1.0,
            stream: true,
        }
    }
}

#[async_trait::async_trait]
impl CompletionProvider for GroqClient {
    async fn stream_completion(&self, prompt: &str) -> Result<mpsc::Receiver<Fragment>, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NoApiKey);
        }

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, message });
        }

        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_DEPTH);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Network(e.to_string()))).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                for event in drain_sse_events(&mut buffer) {
                    match event {
                        SseEvent::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                return; // consumer gone
                            }
                        }
                        SseEvent::Done => return,
                    }
                }
            }
        });

        Ok(rx)
    }
}

enum SseEvent {
    Delta(String),
    Done,
}

/// Consumes complete `data:` lines from the buffer, leaving any incomplete
/// line for the next network chunk. Lines that are not deltas (role
/// announcements, keep-alives, unparsable noise) are skipped.
fn drain_sse_events(buffer: &mut String) -> Vec<SseEvent> {
    let mut events = Vec::new();
    loop {
        let Some(newline_pos) = buffer.find('\n') else {
            break;
        };
        let line = buffer[..newline_pos].trim_end_matches('\r');
        if let Some(payload) = line.strip_prefix("data: ") {
            if payload == "[DONE]" {
                events.push(SseEvent::Done);
            } else if !payload.is_empty() {
                if let Ok(chunk) = serde_json::from_str::<ApiStreamChunk>(payload) {
                    if let Some(text) = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                    {
                        if !text.is_empty() {
                            events.push(SseEvent::Delta(text));
                        }
                    }
                }
            }
        }
        buffer.drain(..=newline_pos);
    }
    events
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChunk {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    delta: ApiDelta,
}

#[derive(Debug, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Deterministic provider: streams a canned reply word by word. Used when
/// `llm_mode = "mock"` and throughout the test suite.
pub struct MockClient {
    reply: String,
}

impl MockClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new("Haha, you again? Level up na tayo!")
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MockClient {
    async fn stream_completion(&self, _prompt: &str) -> Result<mpsc::Receiver<Fragment>, LlmError> {
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_DEPTH);
        let words: Vec<String> = self
            .reply
            .split_inclusive(' ')
            .map(|w| w.to_string())
            .collect();
        tokio::spawn(async move {
            for word in words {
                if tx.send(Ok(word)).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
