//! Keyword analysis backends.
//!
//! `LlmAnalyzer` asks the LLM for an ATS analysis. `FallbackAnalyzer` is used
//! when no API key is configured and always yields `KeywordAnalysis::default()`.
//! `AppState` holds an `Arc<dyn Analyzer>`, chosen at startup.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::model::KeywordAnalysis;
use crate::analysis::prompts::ATS_ANALYSIS_PROMPT_TEMPLATE;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, resume_text: &str, jd_text: &str) -> Result<KeywordAnalysis, LlmError>;

    /// Label for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

/// Runs `analyzer`, substituting the default analysis on any failure.
pub async fn analyze_or_default(
    analyzer: &dyn Analyzer,
    resume_text: &str,
    jd_text: &str,
) -> KeywordAnalysis {
    match analyzer.analyze(resume_text, jd_text).await {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!("Keyword analysis failed, using fallback analysis: {e}");
            KeywordAnalysis::default()
        }
    }
}

pub struct LlmAnalyzer(pub LlmClient);

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(&self, resume_text: &str, jd_text: &str) -> Result<KeywordAnalysis, LlmError> {
        let prompt = ATS_ANALYSIS_PROMPT_TEMPLATE
            .replace("{resume_text}", resume_text)
            .replace("{jd_text}", jd_text);

        let raw = self.0.call_json::<Value>(&prompt, JSON_ONLY_SYSTEM).await?;
        let model = self.0.working_model();
        info!(
            "Analysis completed with {}",
            model.as_deref().unwrap_or("unknown model")
        );
        let analysis = KeywordAnalysis::from_value(&raw, model);
        if analysis.has_no_keywords() {
            warn!("LLM analysis returned no keywords in any bucket");
        }
        Ok(analysis)
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

pub struct FallbackAnalyzer;

#[async_trait]
impl Analyzer for FallbackAnalyzer {
    async fn analyze(&self, _resume_text: &str, _jd_text: &str) -> Result<KeywordAnalysis, LlmError> {
        Ok(KeywordAnalysis::default())
    }

    fn backend(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingAnalyzer;

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        async fn analyze(&self, _: &str, _: &str) -> Result<KeywordAnalysis, LlmError> {
            Err(LlmError::EmptyContent)
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_failure_substitutes_default() {
        let a = analyze_or_default(&FailingAnalyzer, "resume", "jd").await;
        assert_eq!(a, KeywordAnalysis::default());
    }

    #[tokio::test]
    async fn test_fallback_analyzer_yields_default() {
        let a = analyze_or_default(&FallbackAnalyzer, "resume", "jd").await;
        assert!(a.has_no_keywords());
        assert_eq!(FallbackAnalyzer.backend(), "fallback");
    }

    #[test]
    fn test_prompt_placeholders_are_filled() {
        let prompt = ATS_ANALYSIS_PROMPT_TEMPLATE
            .replace("{resume_text}", "RUST DEV")
            .replace("{jd_text}", "HIRING RUST");
        assert!(prompt.contains("RUST DEV"));
        assert!(prompt.contains("HIRING RUST"));
        assert!(!prompt.contains("{resume_text}"));
    }
}
