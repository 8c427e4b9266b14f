//! openai-style chat completion bodies.

use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::transcript::{Transcript, Turn};

/// outbound json body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<Turn>,
}

impl CompletionRequest {
    pub fn new(config: &ChatConfig, messages: Vec<Turn>) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            messages,
        }
    }

    pub fn to_json(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::Decode(e.to_string()))
    }
}

/// system instruction, then the whole transcript, then the new user turn.
///
/// pure concatenation: nothing is trimmed to fit a context window.
pub fn compose_messages(system_prompt: &str, transcript: &Transcript, user_turn: Turn) -> Vec<Turn> {
    let mut messages = Vec::with_capacity(transcript.len() + 2);
    messages.push(Turn::system(system_prompt));
    messages.extend(transcript.iter().cloned());
    messages.push(user_turn);
    messages
}

/// every level is optional: `null` anywhere on the way to the text is an empty reply.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Option<Vec<Option<Choice>>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// raw http result handed back by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// read the assistant text out of a response, or the reason there is none.
pub fn extract_reply(reply: &HttpReply) -> Result<String, ChatError> {
    if !reply.is_success() {
        let envelope: ErrorEnvelope = serde_json::from_str(&reply.body).unwrap_or_default();
        let message = envelope
            .error
            .and_then(|e| e.message)
            .filter(|m| !m.is_empty());
        return Err(match message {
            Some(message) => ChatError::Http { status: reply.status, message },
            None => ChatError::http_status(reply.status),
        });
    }

    let parsed: Option<CompletionResponse> =
        serde_json::from_str(&reply.body).map_err(|e| ChatError::Decode(e.to_string()))?;
    parsed
        .and_then(|r| r.choices)
        .and_then(|choices| choices.into_iter().next())
        .flatten()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(ChatError::EmptyReply)
}
