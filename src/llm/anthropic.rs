use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use super::{Completion, CompletionClient, CompletionRequest, LlmError};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Blocking client for the Anthropic Messages API
pub struct AnthropicClient {
    agent: ureq::Agent,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { agent, api_key })
    }
}

impl CompletionClient for AnthropicClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "calling messages API"
        );

        let response = self
            .agent
            .post(MESSAGES_URL)
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", API_VERSION)
            .set("content-type", "application/json")
            .send_json(request)
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => LlmError::Api {
                    status,
                    body: response.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(t) => LlmError::Transport(t.to_string()),
            })?;

        let resp: MessagesResponse = response.into_json()?;
        let completion = into_completion(resp);

        info!(
            input_tokens = completion.input_tokens,
            output_tokens = completion.output_tokens,
            "completion received"
        );

        Ok(completion)
    }
}

fn into_completion(resp: MessagesResponse) -> Completion {
    let text = resp
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");

    let (input_tokens, output_tokens) = resp
        .usage
        .map(|u| (u.input_tokens, u.output_tokens))
        .unwrap_or((0, 0));

    Completion {
        text,
        input_tokens,
        output_tokens,
    }
}
