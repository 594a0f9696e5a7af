//! Embedding providers.
//!
//! `HttpEmbeddingProvider` talks to any OpenAI-compatible embeddings endpoint
//! (hosted sentence-transformer servers expose the same shape) and retries
//! transient failures.
//! `LocalEmbeddings` runs a Model2Vec static model in-process, loaded on first use.
//! `DisabledEmbeddings` is used when neither is configured; every call fails
//! and callers fall back to a zero similarity.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use model2vec_rs::model::StaticModel;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::llm_client::backoff_delay;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("Embedding dimensions don't match: {0} vs {1}")]
    DimensionMismatch(usize, usize),

    #[error("Nothing to embed")]
    EmptyInput,

    #[error("Local embedding model error: {0}")]
    Local(String),

    #[error("Embedding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Embeddings are disabled")]
    Disabled,
}

impl EmbeddingError {
    /// Transport failures, 429 and 5xx responses.
    fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Http(_) => true,
            EmbeddingError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Runs `call` up to `max_attempts` times, backing off between transient failures.
async fn with_retries<T, F, Fut>(max_attempts: u32, mut call: F) -> Result<T, EmbeddingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EmbeddingError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Err(e) if attempt < max_attempts && e.is_transient() => {
                let delay = backoff_delay(RETRY_BASE_DELAY, attempt);
                warn!(
                    "Embedding call attempt {} failed ({}), retrying after {}ms...",
                    attempt,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One embedding per input text, in input order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Label for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Connection settings, built from `Config`.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// 1 = no retry.
    pub max_attempts: u32,
}

pub struct HttpEmbeddingProvider {
    client: Client,
    settings: EmbeddingSettings,
}

impl HttpEmbeddingProvider {
    pub fn new(settings: EmbeddingSettings) -> Result<Self, EmbeddingError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    async fn embed_once(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.settings.model,
            input: texts,
        };

        let mut builder = self
            .client
            .post(&self.settings.url)
            .header("content-type", "application/json")
            .json(&request);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response.json().await?;
        order_by_index(body.data, texts.len())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = with_retries(self.settings.max_attempts, || self.embed_once(texts)).await?;
        debug!(
            "Embedded {} texts with {} (dim {})",
            texts.len(),
            self.settings.model,
            vectors.first().map(Vec::len).unwrap_or(0)
        );
        Ok(vectors)
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}

fn order_by_index(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: data.len(),
        });
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// In-process Model2Vec embeddings. The model (a local path or a Hugging Face id)
/// is loaded on the first call; a failed load is retried on the next one.
pub struct LocalEmbeddings {
    model_id: String,
    model: OnceCell<Arc<StaticModel>>,
}

impl LocalEmbeddings {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            model: OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<Arc<StaticModel>, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                let model_id = self.model_id.clone();
                let model = tokio::task::spawn_blocking(move || {
                    StaticModel::from_pretrained(model_id.as_str(), None, None, None)
                })
                .await?
                .map_err(|e| EmbeddingError::Local(e.to_string()))?;
                info!("Loaded local embedding model {}", self.model_id);
                Ok(Arc::new(model))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model().await?;
        let sentences: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = tokio::task::spawn_blocking(move || model.encode(&sentences)).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        Ok(vectors)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

pub struct DisabledEmbeddings;

#[async_trait]
impl EmbeddingProvider for DisabledEmbeddings {
    async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Disabled)
    }

    fn backend(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn api_error(status: u16) -> EmbeddingError {
        EmbeddingError::Api {
            status,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried_once() {
        let calls = AtomicUsize::new(0);
        let result = with_retries(2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(api_error(503))
                } else {
                    Ok(vec![vec![1.0f32, 0.0]])
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), vec![vec![1.0, 0.0]]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_stop_at_max_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<Vec<Vec<f32>>, _> = with_retries(2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api_error(429)) }
        })
        .await;
        assert!(matches!(result, Err(EmbeddingError::Api { status: 429, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<Vec<Vec<f32>>, _> = with_retries(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api_error(400)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_local_provider_skips_empty_input_without_loading() {
        let provider = LocalEmbeddings::new("/nonexistent/model");
        assert!(provider.embed(&[]).await.unwrap().is_empty());
        assert!(provider.model.get().is_none());
        assert_eq!(provider.backend(), "local");
    }

    #[test]
    fn test_response_is_reordered_by_index() {
        let body: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ], "model": "m"}"#,
        )
        .unwrap();
        let vectors = order_by_index(body.data, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let body: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [1.0]}]}"#).unwrap();
        assert!(matches!(
            order_by_index(body.data, 2),
            Err(EmbeddingError::CountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_request_shape() {
        let input = ["a", "b"];
        let json = serde_json::to_value(EmbeddingRequest {
            model: "all-MiniLM-L6-v2",
            input: &input,
        })
        .unwrap();
        assert_eq!(json["model"], "all-MiniLM-L6-v2");
        assert_eq!(json["input"][1], "b");
    }

    #[tokio::test]
    async fn test_disabled_provider_always_fails() {
        assert!(matches!(
            DisabledEmbeddings.embed(&["x"]).await,
            Err(EmbeddingError::Disabled)
        ));
    }
}
