/// LLM Client — the single point of entry for all generative-AI calls in CV Match.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module.
///
/// Models are tried in order (configured preference first, then `CANDIDATE_MODELS`).
/// The first model that answers is remembered as the working model for later calls.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod prompts;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Fallback order when no preferred model is configured or it is unavailable.
pub const CANDIDATE_MODELS: &[&str] = &["claude-sonnet-4-5", "claude-haiku-4-5", "claude-3-5-haiku-latest"];
const MAX_TOKENS: u32 = 4096;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// Backoff stops doubling after this many retries (32 × base).
const MAX_BACKOFF_EXPONENT: u32 = 5;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No working model among: {0}")]
    NoWorkingModel(String),
}

/// Connection settings, built from `Config`.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub api_url: String,
    pub preferred_model: Option<String>,
    pub timeout: Duration,
    /// Attempts per model for transient failures (1 = no retry).
    pub max_attempts: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type", default)]
    error_type: String,
    message: String,
}

/// The single LLM client used by all services in CV Match.
/// Wraps the Anthropic Messages API with model fallback, retries and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: Arc<LlmSettings>,
    working_model: Arc<Mutex<Option<String>>>,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings: Arc::new(settings),
            working_model: Arc::new(Mutex::new(None)),
        })
    }

    /// The model that last answered successfully, if any.
    pub fn working_model(&self) -> Option<String> {
        self.working_model.lock().ok().and_then(|m| m.clone())
    }

    fn models_to_try(&self) -> Vec<String> {
        if let Some(model) = self.working_model() {
            return vec![model];
        }
        let mut models: Vec<String> = Vec::new();
        if let Some(preferred) = &self.settings.preferred_model {
            models.push(preferred.clone());
        }
        for candidate in CANDIDATE_MODELS {
            if !models.iter().any(|m| m == candidate) {
                models.push(candidate.to_string());
            }
        }
        models
    }

    fn remember_model(&self, model: &str) {
        if let Ok(mut working) = self.working_model.lock() {
            if working.as_deref() != Some(model) {
                info!("Using LLM model: {model}");
                *working = Some(model.to_string());
            }
        }
    }

    /// Makes a raw call, returning the full response object.
    /// Moves to the next model when one is not available; retries 429/5xx/transport
    /// errors with exponential backoff up to `max_attempts` per model.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let models = self.models_to_try();
        let mut last_error: Option<LlmError> = None;

        for model in &models {
            match self.call_model(model, prompt, system).await {
                Ok(response) => {
                    self.remember_model(model);
                    return Ok(response);
                }
                Err(LlmError::Api { status, message }) if is_model_unavailable(status, &message) => {
                    warn!("LLM model {model} unavailable ({status}), trying next");
                    last_error = Some(LlmError::Api { status, message });
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::NoWorkingModel(models.join(", "))))
    }

    async fn call_model(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(RETRY_BASE_DELAY, attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.settings.api_url)
                .header("x-api-key", &self.settings.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
                model, llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: max_attempts,
        }))
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        parse_json_text(text)
    }
}

/// Parses model output as JSON: fences are stripped, and if the text still is
/// not valid JSON the outermost `{...}` span is tried.
pub fn parse_json_text<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let text = strip_json_fences(text);
    match serde_json::from_str(text) {
        Ok(v) => Ok(v),
        Err(e) => match JSON_OBJECT.find(text) {
            Some(m) => serde_json::from_str(m.as_str()).map_err(LlmError::Parse),
            None => Err(LlmError::Parse(e)),
        },
    }
}

/// Exponential backoff before retry number `retry` (1-based): base, 2×base, 4×base, ...
/// capped at 32× base.
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    base * (1u32 << exponent)
}

fn is_model_unavailable(status: u16, message: &str) -> bool {
    status == 404 || (status == 400 && message.to_lowercase().contains("model"))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn client(preferred: Option<&str>) -> LlmClient {
        LlmClient::new(LlmSettings {
            api_key: "test".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            preferred_model: preferred.map(String::from),
            timeout: Duration::from_secs(1),
            max_attempts: 2,
        })
        .unwrap()
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_text_extracts_object_from_chatter() {
        let v: Value = parse_json_text("Sure! Here you go:\n{\"ats_score\": 70}\nHope it helps.").unwrap();
        assert_eq!(v["ats_score"], 70);
    }

    #[test]
    fn test_parse_json_text_rejects_non_json() {
        assert!(parse_json_text::<Value>("no json here").is_err());
    }

    #[test]
    fn test_models_to_try_puts_preference_first_without_duplicates() {
        let c = client(Some("claude-haiku-4-5"));
        let models = c.models_to_try();
        assert_eq!(models[0], "claude-haiku-4-5");
        assert_eq!(models.len(), CANDIDATE_MODELS.len());
    }

    #[test]
    fn test_working_model_is_tried_alone() {
        let c = client(None);
        assert!(c.working_model().is_none());
        c.remember_model("claude-sonnet-4-5");
        assert_eq!(c.models_to_try(), vec!["claude-sonnet-4-5".to_string()]);
        // Clones share the remembered model.
        assert_eq!(c.clone().working_model().as_deref(), Some("claude-sonnet-4-5"));
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, 6), Duration::from_secs(32));
        assert_eq!(backoff_delay(base, 200), Duration::from_secs(32));
        assert_eq!(backoff_delay(base, u32::MAX), Duration::from_secs(32));
    }

    #[test]
    fn test_model_unavailable_detection() {
        assert!(is_model_unavailable(404, "not_found_error: model: foo"));
        assert!(is_model_unavailable(400, "invalid model name"));
        assert!(!is_model_unavailable(400, "prompt is too long"));
        assert!(!is_model_unavailable(401, "invalid x-api-key"));
    }
}
