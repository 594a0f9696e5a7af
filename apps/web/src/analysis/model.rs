//! Normalized keyword analysis as returned by the analyzer backends.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Issue counters shown on the result page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartCvCounts {
    pub critical_issues: u32,
    pub improvements: u32,
    pub missing_skills: u32,
    pub keywords_found: u32,
}

/// ATS keyword analysis of one résumé/JD pair.
///
/// `Default` is the fallback used whenever the LLM is unavailable or its
/// response cannot be parsed: zero score, zero counts, empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    pub ats_score: u32,
    pub smart_cv_analysis: SmartCvCounts,
    pub jd_required_keywords: Vec<String>,
    pub jd_optional_keywords: Vec<String>,
    pub resume_keywords_found: Vec<String>,
    pub resume_keywords_missing: Vec<String>,
    pub weak_language_phrases: Vec<String>,
    pub low_context_phrases: Vec<String>,
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub ats_suggestions: Vec<String>,
    /// Model that produced the analysis; `None` for the fallback.
    pub model_used: Option<String>,
}

impl KeywordAnalysis {
    /// Builds a normalized analysis from a raw model response.
    ///
    /// Missing or malformed fields fall back to their defaults. Non-string
    /// list entries are skipped. Keyword lists are lower-cased, de-duplicated
    /// and sorted; phrase lists are trimmed and de-duplicated in first-seen
    /// order with their casing kept.
    pub fn from_value(raw: &Value, model_used: Option<String>) -> Self {
        let resume_keywords_found = keyword_list(raw.get("resume_keywords_found"));
        let resume_keywords_missing = keyword_list(raw.get("resume_keywords_missing"));

        let counts = raw.get("smart_cv_analysis");
        let count = |key: &str| counts.and_then(|c| c.get(key)).and_then(coerce_u32);
        let smart_cv_analysis = SmartCvCounts {
            critical_issues: count("critical_issues").unwrap_or(0),
            improvements: count("improvements").unwrap_or(0),
            missing_skills: count("missing_skills")
                .unwrap_or(resume_keywords_missing.len() as u32),
            keywords_found: count("keywords_found").unwrap_or(resume_keywords_found.len() as u32),
        };

        KeywordAnalysis {
            ats_score: raw.get("ats_score").and_then(coerce_u32).unwrap_or(0).min(100),
            smart_cv_analysis,
            jd_required_keywords: keyword_list(raw.get("jd_required_keywords")),
            jd_optional_keywords: keyword_list(raw.get("jd_optional_keywords")),
            resume_keywords_found,
            resume_keywords_missing,
            weak_language_phrases: phrase_list(raw.get("weak_language_phrases")),
            low_context_phrases: phrase_list(raw.get("low_context_phrases")),
            technical_skills: keyword_list(raw.get("technical_skills")),
            soft_skills: keyword_list(raw.get("soft_skills")),
            ats_suggestions: phrase_list(raw.get("ats_suggestions")),
            model_used,
        }
    }

    /// True when no keyword bucket has any term.
    pub fn has_no_keywords(&self) -> bool {
        self.jd_required_keywords.is_empty()
            && self.jd_optional_keywords.is_empty()
            && self.technical_skills.is_empty()
            && self.soft_skills.is_empty()
    }
}

fn strings(value: Option<&Value>) -> impl Iterator<Item = &str> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn keyword_list(value: Option<&Value>) -> Vec<String> {
    strings(value)
        .map(str::to_lowercase)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn phrase_list(value: Option<&Value>) -> Vec<String> {
    let mut seen = HashSet::new();
    strings(value)
        .filter(|s| seen.insert(s.to_string()))
        .map(String::from)
        .collect()
}

/// Integers, floats (truncated) and numeric strings; negatives become 0.
fn coerce_u32(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.trunc().clamp(0.0, u32::MAX as f64) as u32)
}
