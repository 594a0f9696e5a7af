use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::analysis::analyzer::{Analyzer, FallbackAnalyzer, LlmAnalyzer};
use crate::config::Config;
use crate::llm_client::{LlmClient, LlmSettings};
use crate::matching::aliases::{AliasProvider, LlmAliasProvider, StaticAliasProvider, SynonymCache};
use crate::matching::scoring::ScoringFormula;
use crate::session::{MemorySessionStore, RedisSessionStore, SessionStore};
use crate::similarity::embeddings::{
    DisabledEmbeddings, EmbeddingProvider, EmbeddingSettings, HttpEmbeddingProvider,
    LocalEmbeddings,
};
use crate::similarity::SimilarityEngine;

/// Alias maps kept before the synonym cache is cleared.
const SYNONYM_CACHE_CAPACITY: usize = 256;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Present only when an API key is configured.
    pub llm: Option<LlmClient>,
    /// Pluggable keyword analyzer. Default: LlmAnalyzer, FallbackAnalyzer without an API key.
    pub analyzer: Arc<dyn Analyzer>,
    /// Pluggable alias source. Default: StaticAliasProvider. Swap via ENABLE_LLM_SYNONYMS.
    pub aliases: Arc<dyn AliasProvider>,
    pub synonym_cache: Arc<SynonymCache>,
    pub similarity: Arc<SimilarityEngine>,
    pub sessions: Arc<dyn SessionStore>,
    pub scoring_formula: ScoringFormula,
}

impl AppState {
    /// Wires every collaborator from configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let llm = match &config.anthropic_api_key {
            Some(api_key) => {
                let client = LlmClient::new(LlmSettings {
                    api_key: api_key.clone(),
                    api_url: config.llm_api_url.clone(),
                    preferred_model: config.llm_model.clone(),
                    timeout: config.llm_timeout,
                    max_attempts: config.llm_max_attempts,
                })
                .context("Failed to build LLM client")?;
                info!(
                    "LLM client initialized (preferred model: {})",
                    config.llm_model.as_deref().unwrap_or("default")
                );
                Some(client)
            }
            None => {
                warn!("ANTHROPIC_API_KEY not set, keyword analysis will use the fallback");
                None
            }
        };

        let analyzer: Arc<dyn Analyzer> = match &llm {
            Some(client) => Arc::new(LlmAnalyzer(client.clone())),
            None => Arc::new(FallbackAnalyzer),
        };

        let static_aliases = match &config.skills_db_path {
            Some(path) => StaticAliasProvider::from_skills_db(path)?,
            None => StaticAliasProvider::default(),
        };
        let aliases: Arc<dyn AliasProvider> = match (&llm, config.enable_llm_synonyms) {
            (Some(client), true) => Arc::new(LlmAliasProvider::new(client.clone(), static_aliases)),
            (None, true) => {
                warn!("ENABLE_LLM_SYNONYMS is set but no LLM is configured, using static aliases");
                Arc::new(static_aliases)
            }
            (_, false) => Arc::new(static_aliases),
        };

        let embeddings: Arc<dyn EmbeddingProvider> =
            match (&config.embedding_url, &config.local_embedding_model) {
                (Some(url), _) => Arc::new(
                    HttpEmbeddingProvider::new(EmbeddingSettings {
                        url: url.clone(),
                        model: config.embedding_model.clone(),
                        api_key: config.embedding_api_key.clone(),
                        timeout: config.embedding_timeout,
                        max_attempts: config.embedding_max_attempts,
                    })
                    .context("Failed to build embedding client")?,
                ),
                (None, Some(model_id)) => {
                    info!("Using local embedding model {model_id} (loaded on first use)");
                    Arc::new(LocalEmbeddings::new(model_id.clone()))
                }
                (None, None) => {
                    warn!("No embedding endpoint or local model configured, similarity scoring is disabled");
                    Arc::new(DisabledEmbeddings)
                }
            };

        let sessions: Arc<dyn SessionStore> = match &config.redis_url {
            Some(url) => {
                let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
                Arc::new(RedisSessionStore::new(client, config.session_ttl))
            }
            None => Arc::new(MemorySessionStore::new(config.session_ttl)),
        };

        info!(
            "Backends: analyzer={}, aliases={}, embeddings={}, sessions={}, scoring={}",
            analyzer.backend(),
            aliases.backend(),
            embeddings.backend(),
            sessions.backend(),
            config.scoring_formula
        );

        Ok(AppState {
            scoring_formula: config.scoring_formula,
            config,
            llm,
            analyzer,
            aliases,
            synonym_cache: Arc::new(SynonymCache::new(SYNONYM_CACHE_CAPACITY)),
            similarity: Arc::new(SimilarityEngine::new(embeddings)),
            sessions,
        })
    }

    /// Offline state: in-memory sessions, static aliases, no embeddings.
    #[cfg(test)]
    pub fn for_tests(analyzer: Arc<dyn Analyzer>) -> Self {
        let config = Config::default();
        AppState {
            scoring_formula: config.scoring_formula,
            sessions: Arc::new(MemorySessionStore::new(config.session_ttl)),
            config,
            llm: None,
            analyzer,
            aliases: Arc::new(StaticAliasProvider::default()),
            synonym_cache: Arc::new(SynonymCache::new(SYNONYM_CACHE_CAPACITY)),
            similarity: Arc::new(SimilarityEngine::new(Arc::new(DisabledEmbeddings))),
        }
    }
}
