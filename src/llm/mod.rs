//! Model-completion client boundary

pub mod anthropic;

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anthropic::AnthropicClient;

/// A text block inside a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<TextBlock>,
}

impl Message {
    pub fn user(blocks: Vec<TextBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content: blocks,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![TextBlock::new(text)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completion {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing API key (set ANTHROPIC_API_KEY)")]
    MissingApiKey,

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] std::io::Error),

    #[error("no scripted response left")]
    Exhausted,
}

/// Synchronous completion client
pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// Client returning canned completions in order, recording every request
#[derive(Debug, Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Completion>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: impl IntoIterator<Item = Completion>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(LlmError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".to_string(),
            max_tokens: 100,
            system: "be brief".to_string(),
            messages: vec![Message::user_text("hi")],
        }
    }

    #[test]
    fn test_scripted_client_replays_in_order() {
        let client = ScriptedClient::new([
            Completion {
                text: "one".into(),
                input_tokens: 1,
                output_tokens: 2,
            },
            Completion {
                text: "two".into(),
                input_tokens: 3,
                output_tokens: 4,
            },
        ]);
        assert_eq!(client.complete(&request()).unwrap().text, "one");
        let second = client.complete(&request()).unwrap();
        assert_eq!(second.total_tokens(), 7);
        assert!(matches!(client.complete(&request()), Err(LlmError::Exhausted)));
        assert_eq!(client.requests().len(), 3);
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(Message::user_text("hello")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "content": [{"type": "text", "text": "hello"}]})
        );
    }
}
