//! Alias providers: where externally supplied term aliases come from.
//!
//! `StaticAliasProvider` is deterministic and offline (default).
//! `LlmAliasProvider` asks the LLM for role-aware aliases and falls back to the
//! static provider when the call fails.
//!
//! `AppState` holds an `Arc<dyn AliasProvider>` and a `SynonymCache`; neither is global.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm_client::LlmClient;
use crate::matching::prompts::{ALIAS_PROMPT_TEMPLATE, ALIAS_SYSTEM};
use crate::matching::terms::{canonical, canonical_terms};

pub type AliasMap = HashMap<String, Vec<String>>;

/// Aliases kept per term after merging all sources.
pub const MAX_ALIASES_PER_TERM: usize = 8;
/// Aliases accepted per term from a single LLM response.
pub const MAX_LLM_ALIASES: usize = 6;
/// JD characters included in the cache key and in alias prompts.
const JD_KEY_PREFIX_CHARS: usize = 100;
const JD_PROMPT_CHARS: usize = 1500;

static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-/_.]+").expect("valid regex"));

static LANGUAGE_ALIASES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert("javascript", &["js", "ecmascript"]);
    m.insert("typescript", &["ts"]);
    m.insert("python", &["py"]);
    m.insert("c++", &["cpp", "cplusplus"]);
    m.insert("c#", &["csharp", "dotnet"]);
    m.insert("postgresql", &["postgres", "psql"]);
    m.insert("mysql", &["my sql"]);
    m.insert("mongodb", &["mongo"]);
    m.insert("kubernetes", &["k8s"]);
    m.insert("docker", &["containerization"]);
    m.insert("amazon web services", &["aws"]);
    m.insert("google cloud", &["gcp", "google cloud platform"]);
    m.insert("microsoft azure", &["azure"]);
    m
});

/// Source of aliases for canonical terms.
#[async_trait]
pub trait AliasProvider: Send + Sync {
    /// Aliases for one term, given the job description as context.
    async fn get_aliases(&self, term: &str, context: &str) -> Vec<String>;

    /// Aliases for many terms. Backends that can batch should override this.
    async fn get_aliases_batch(&self, terms: &[String], context: &str) -> AliasMap {
        let mut out = AliasMap::new();
        for term in terms {
            out.insert(term.clone(), self.get_aliases(term, context).await);
        }
        out
    }

    /// Label for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

// ────────────────────────────────────────────────────────────────────────────
// StaticAliasProvider
// ────────────────────────────────────────────────────────────────────────────

/// Rule-based aliases: a language alias table, hyphen/space rewrites, and
/// skills-database entries that differ from the term only by separators.
#[derive(Debug, Clone, Default)]
pub struct StaticAliasProvider {
    skills_db: Vec<String>,
}

impl StaticAliasProvider {
    pub fn new(skills_db: Vec<String>) -> Self {
        let skills_db = skills_db
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { skills_db }
    }

    /// Loads a skills database: a JSON array of skill names. Non-string entries are ignored.
    pub fn from_skills_db(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read skills database '{}'", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Skills database '{}' is not valid JSON", path.display()))?;
        let skills = value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let provider = Self::new(skills);
        info!("Loaded skills database with {} skills", provider.skills_count());
        Ok(provider)
    }

    pub fn skills_count(&self) -> usize {
        self.skills_db.len()
    }

    /// Deterministic aliases for a term, without the term itself.
    pub fn deterministic_aliases(&self, term: &str) -> Vec<String> {
        let term = canonical(term);
        if term.is_empty() {
            return Vec::new();
        }

        let mut out: Vec<String> = Vec::new();
        if let Some(list) = LANGUAGE_ALIASES.get(term.as_str()) {
            out.extend(list.iter().map(|s| s.to_string()));
        }
        if term.contains('-') {
            out.push(term.replace('-', " "));
            out.push(term.replace('-', ""));
        }
        if term.contains(' ') {
            out.push(term.replace(' ', "-"));
            out.push(term.replace(' ', ""));
        }

        let key = separator_insensitive_key(&term);
        for skill in &self.skills_db {
            let lowered = skill.to_lowercase();
            if lowered != term && separator_insensitive_key(&lowered) == key {
                out.push(lowered);
            }
        }

        dedup_aliases(&term, out)
    }
}

#[async_trait]
impl AliasProvider for StaticAliasProvider {
    async fn get_aliases(&self, term: &str, _context: &str) -> Vec<String> {
        self.deterministic_aliases(term)
    }

    fn backend(&self) -> &'static str {
        "static"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmAliasProvider
// ────────────────────────────────────────────────────────────────────────────

/// Role-aware aliases from the LLM, merged after the deterministic ones.
pub struct LlmAliasProvider {
    llm: LlmClient,
    fallback: StaticAliasProvider,
}

impl LlmAliasProvider {
    pub fn new(llm: LlmClient, fallback: StaticAliasProvider) -> Self {
        Self { llm, fallback }
    }

    async fn ask_llm(&self, terms: &[String], context: &str) -> AliasMap {
        let jd_excerpt: String = context.chars().take(JD_PROMPT_CHARS).collect();
        let prompt = ALIAS_PROMPT_TEMPLATE
            .replace("{terms}", &serde_json::to_string(terms).unwrap_or_default())
            .replace("{jd_text}", &jd_excerpt);

        match self.llm.call_json::<Value>(&prompt, ALIAS_SYSTEM).await {
            Ok(value) => {
                let aliases = sanitize_alias_response(&value);
                debug!("LLM returned aliases for {} of {} terms", aliases.len(), terms.len());
                aliases
            }
            Err(e) => {
                warn!("Alias generation failed, using deterministic aliases only: {e}");
                AliasMap::new()
            }
        }
    }
}

#[async_trait]
impl AliasProvider for LlmAliasProvider {
    async fn get_aliases(&self, term: &str, context: &str) -> Vec<String> {
        let terms = vec![canonical(term)];
        self.get_aliases_batch(&terms, context)
            .await
            .remove(&terms[0])
            .unwrap_or_default()
    }

    async fn get_aliases_batch(&self, terms: &[String], context: &str) -> AliasMap {
        let terms = canonical_terms(terms);
        if terms.is_empty() {
            return AliasMap::new();
        }

        let mut from_llm = self.ask_llm(&terms, context).await;

        terms
            .into_iter()
            .map(|term| {
                let mut merged = self.fallback.deterministic_aliases(&term);
                merged.extend(from_llm.remove(&term).unwrap_or_default());
                let merged = dedup_aliases(&term, merged);
                (term, merged)
            })
            .collect()
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

/// Keeps only `string → [string]` entries of an LLM alias response.
///
/// Keys and items are canonicalized; items equal to their key or duplicated are
/// dropped, and at most [`MAX_LLM_ALIASES`] items are kept per key.
pub fn sanitize_alias_response(value: &Value) -> AliasMap {
    let mut out = AliasMap::new();
    let Some(object) = value.as_object() else {
        return out;
    };

    for (key, items) in object {
        let key = canonical(key);
        let Some(items) = items.as_array() else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let mut aliases: Vec<String> = Vec::new();
        for item in items.iter().filter_map(Value::as_str) {
            let alias = canonical(item);
            if !alias.is_empty() && alias != key && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }
        aliases.truncate(MAX_LLM_ALIASES);
        out.insert(key, aliases);
    }

    out
}

fn separator_insensitive_key(s: &str) -> String {
    SEPARATOR_RUN.replace_all(&s.to_lowercase(), "").into_owned()
}

fn dedup_aliases(term: &str, aliases: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(term.to_string());
    let mut out: Vec<String> = aliases
        .into_iter()
        .map(|a| canonical(&a))
        .filter(|a| !a.is_empty() && seen.insert(a.clone()))
        .collect();
    out.truncate(MAX_ALIASES_PER_TERM);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// SynonymCache + role synonym aggregation
// ────────────────────────────────────────────────────────────────────────────

/// Bounded cache of alias maps keyed by the analysed term lists and JD prefix.
///
/// Cleared wholesale when full.
pub struct SynonymCache {
    entries: Mutex<HashMap<u64, AliasMap>>,
    capacity: usize,
}

impl SynonymCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn key(buckets: &[&[String]], jd_text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        for bucket in buckets {
            bucket.join(",").hash(&mut hasher);
            '|'.hash(&mut hasher);
        }
        jd_text
            .chars()
            .take(JD_KEY_PREFIX_CHARS)
            .collect::<String>()
            .hash(&mut hasher);
        hasher.finish()
    }

    pub fn get(&self, key: u64) -> Option<AliasMap> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&key).cloned())
    }

    pub fn insert(&self, key: u64, aliases: AliasMap) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity && !entries.contains_key(&key) {
                entries.clear();
            }
            entries.insert(key, aliases);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Aliases for every unique term across the four keyword buckets.
pub async fn role_synonyms(
    provider: &dyn AliasProvider,
    cache: &SynonymCache,
    buckets: [&[String]; 4],
    jd_text: &str,
) -> AliasMap {
    let key = SynonymCache::key(&buckets, jd_text);
    if let Some(hit) = cache.get(key) {
        debug!("Synonym cache hit");
        return hit;
    }

    let all_terms: Vec<String> = buckets.iter().flat_map(|b| b.iter().cloned()).collect();
    let unique = canonical_terms(&all_terms);

    let mut aliases = provider.get_aliases_batch(&unique, jd_text).await;
    for list in aliases.values_mut() {
        list.truncate(MAX_ALIASES_PER_TERM);
    }

    cache.insert(key, aliases.clone());
    info!(
        "Built aliases for {} terms via {} provider ({} cached)",
        unique.len(),
        provider.backend(),
        cache.len()
    );
    aliases
}
