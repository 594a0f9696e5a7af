use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::matching::scoring::ScoringFormula;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Upper bound for the `*_MAX_ATTEMPTS` settings.
const MAX_ATTEMPTS_LIMIT: u32 = 10;
/// Model2Vec model loaded in-process when no embedding endpoint is configured.
pub const DEFAULT_LOCAL_EMBEDDING_MODEL: &str = "minishlab/potion-base-8M";

/// Application configuration loaded from environment variables.
/// Everything is optional; integrations without credentials fall back to offline behaviour.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// In-memory sessions when unset.
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
    /// Fallback analysis when unset.
    pub anthropic_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: Option<String>,
    pub llm_timeout: Duration,
    pub llm_max_attempts: u32,
    /// Remote embeddings; the local model is used when unset.
    pub embedding_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub embedding_timeout: Duration,
    pub embedding_max_attempts: u32,
    /// Similarity scoring disabled when this and `embedding_url` are both unset.
    pub local_embedding_model: Option<String>,
    pub enable_llm_synonyms: bool,
    pub skills_db_path: Option<PathBuf>,
    pub scoring_formula: ScoringFormula,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            redis_url: None,
            session_ttl: Duration::from_secs(86_400),
            anthropic_api_key: None,
            llm_api_url: crate::llm_client::DEFAULT_API_URL.to_string(),
            llm_model: None,
            llm_timeout: Duration::from_secs(30),
            llm_max_attempts: 2,
            embedding_url: None,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            embedding_api_key: None,
            embedding_timeout: Duration::from_secs(30),
            embedding_max_attempts: 2,
            local_embedding_model: Some(DEFAULT_LOCAL_EMBEDDING_MODEL.to_string()),
            enable_llm_synonyms: false,
            skills_db_path: None,
            scoring_formula: ScoringFormula::Weighted,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        Ok(Config {
            port: parse_or(&get, "PORT", defaults.port)?,
            rust_log: get("RUST_LOG").unwrap_or(defaults.rust_log),
            redis_url: get("REDIS_URL"),
            session_ttl: Duration::from_secs(parse_or(&get, "SESSION_TTL_SECS", defaults.session_ttl.as_secs())?),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            llm_api_url: get("LLM_API_URL").unwrap_or(defaults.llm_api_url),
            llm_model: get("LLM_MODEL"),
            llm_timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", defaults.llm_timeout.as_secs())?),
            llm_max_attempts: parse_attempts(&get, "LLM_MAX_ATTEMPTS", defaults.llm_max_attempts)?,
            embedding_url: get("EMBEDDING_URL"),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_api_key: get("EMBEDDING_API_KEY"),
            embedding_timeout: Duration::from_secs(parse_or(
                &get,
                "EMBEDDING_TIMEOUT_SECS",
                defaults.embedding_timeout.as_secs(),
            )?),
            embedding_max_attempts: parse_attempts(
                &get,
                "EMBEDDING_MAX_ATTEMPTS",
                defaults.embedding_max_attempts,
            )?,
            local_embedding_model: match get("EMBEDDING_LOCAL_MODEL") {
                Some(v) if matches!(v.to_lowercase().as_str(), "off" | "none") => None,
                Some(v) => Some(v),
                None => defaults.local_embedding_model,
            },
            enable_llm_synonyms: parse_bool(&get, "ENABLE_LLM_SYNONYMS")?,
            skills_db_path: get("SKILLS_DB_PATH").map(PathBuf::from),
            scoring_formula: match get("SCORING_FORMULA") {
                Some(v) => v.parse().map_err(|e: String| anyhow!(e))?,
                None => defaults.scoring_formula,
            },
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

fn parse_attempts(get: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> Result<u32> {
    let attempts = parse_or(get, key, default)?;
    if !(1..=MAX_ATTEMPTS_LIMIT).contains(&attempts) {
        return Err(anyhow!(
            "Environment variable '{key}' must be between 1 and {MAX_ATTEMPTS_LIMIT}, got {attempts}"
        ));
    }
    Ok(attempts)
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    match get(key).map(|v| v.to_lowercase()).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(anyhow!("Environment variable '{key}' must be a boolean, got '{other}'")),
    }
}
