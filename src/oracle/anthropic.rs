//! Anthropic Messages API oracle

use super::prompt::{build_system_prompt, build_turn_prompt};
use super::{OracleConfig, OracleError, OracleRequest, OracleTurnResult, TutorOracle};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Oracle backed by a hosted Claude model
pub struct AnthropicOracle {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    system_prompt: String,
}

impl AnthropicOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let base_url = match config.gateway.as_deref() {
            Some(gw) => format!("{}/_/gateway/anthropic/v1/messages", gw.trim_end_matches('/')),
            None => DEFAULT_BASE_URL.to_string(),
        };

        // Connection-level ceiling only; per-turn timeouts live in the controller
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| OracleError::unknown(format!("Failed to create HTTP client: {e}")))?;

        let api_key = if config.gateway.is_some() {
            config.api_key.clone().unwrap_or_else(|| "implicit".to_string())
        } else {
            config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| OracleError::auth("ANTHROPIC_API_KEY is not set"))?
        };

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url,
            system_prompt: build_system_prompt(),
        })
    }

    fn translate_request(&self, request: &OracleRequest) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: self.system_prompt.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: build_turn_prompt(request),
            }],
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> OracleError {
        match status.as_u16() {
            401 | 403 => OracleError::auth(format!("Authentication failed: {body}")),
            429 => OracleError::rate_limit(format!("Rate limited: {body}")),
            400 => OracleError::invalid_request(format!("Invalid request: {body}")),
            500..=599 => OracleError::server_error(format!("Server error: {body}")),
            _ => OracleError::unknown(format!("HTTP {status}: {body}")),
        }
    }
}

#[async_trait]
impl TutorOracle for AnthropicOracle {
    async fn next_turn(&self, request: &OracleRequest) -> Result<OracleTurnResult, OracleError> {
        let anthropic_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    OracleError::network(format!("Connection failed: {e}"))
                } else {
                    OracleError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OracleError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| OracleError::malformed(format!("Failed to parse response: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .ok_or_else(|| OracleError::malformed("Response contained no text block"))?;

        parse_turn(&text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Parse the model's reply into a turn.
///
/// The JSON object is taken from the first `{` to the last `}` so that code
/// fences or a stray sentence around it do not matter.
pub fn parse_turn(text: &str) -> Result<OracleTurnResult, OracleError> {
    let json = text
        .find('{')
        .zip(text.rfind('}'))
        .and_then(|(start, end)| text.get(start..=end))
        .ok_or_else(|| OracleError::malformed("Reply did not contain a JSON object"))?;

    serde_json::from_str::<OracleTurnResult>(json)
        .map_err(|e| OracleError::malformed(format!("Reply is not a valid turn: {e}")))?
        .validate()
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
