//! Presence matching: which terms occur in a text, and in what surface form.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::matching::patterns::{compile_with_aliases, first_surface};
use crate::matching::terms::canonical;

/// Outcome of matching one term list against one text.
///
/// Ordered collections keep the output identical across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceResult {
    pub present: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    /// canonical term → literal substring that matched it
    pub surfaces: BTreeMap<String, String>,
}

impl PresenceResult {
    pub fn present_count(&self) -> usize {
        self.present.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn present_sorted(&self) -> Vec<String> {
        self.present.iter().cloned().collect()
    }

    pub fn missing_sorted(&self) -> Vec<String> {
        self.missing.iter().cloned().collect()
    }

    /// Matched surface strings in canonical-term order.
    pub fn surface_values(&self) -> Vec<String> {
        self.surfaces.values().cloned().collect()
    }
}

/// Matches `terms` against `text` using the curated variant table only.
#[allow(dead_code)]
pub fn present_missing_with_surface<S: AsRef<str>>(text: &str, terms: &[S]) -> PresenceResult {
    present_missing_with_aliases(text, terms, &HashMap::new())
}

/// Matches `terms` against `text`, merging per-term aliases into each variant set.
///
/// Terms are canonicalized first; empty terms are skipped.
pub fn present_missing_with_aliases<S: AsRef<str>>(
    text: &str,
    terms: &[S],
    aliases: &HashMap<String, Vec<String>>,
) -> PresenceResult {
    let mut result = PresenceResult::default();

    for raw in terms {
        let term = canonical(raw.as_ref());
        if term.is_empty() || result.present.contains(&term) || result.missing.contains(&term) {
            continue;
        }

        let term_aliases = aliases.get(&term).map(Vec::as_slice).unwrap_or(&[]);
        let patterns = compile_with_aliases(&term, term_aliases);

        match first_surface(text, &patterns) {
            Some(surface) => {
                result.surfaces.insert(term.clone(), surface.to_string());
                result.present.insert(term);
            }
            None => {
                result.missing.insert(term);
            }
        }
    }

    result
}

/// Phrases (trimmed, lower-cased) that occur anywhere in `text`, case-insensitively.
///
/// Plain substring search: weak or low-context phrases are judged by occurrence,
/// not by word boundaries.
pub fn occurring_phrases<S: AsRef<str>>(text: &str, phrases: &[S]) -> BTreeSet<String> {
    let haystack = text.to_lowercase();
    phrases
        .iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty() && haystack.contains(p.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scoring::BucketCounts;

    #[test]
    fn test_python_present_sql_missing() {
        let r = present_missing_with_surface(
            "Experienced Python developer, no database skills",
            &["python", "sql"],
        );
        assert_eq!(r.present_sorted(), vec!["python"]);
        assert_eq!(r.missing_sorted(), vec!["sql"]);
        assert!((BucketCounts::from(&r).coverage() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_power_bi_surface_keeps_original_casing() {
        let r = present_missing_with_surface("Built dashboards in PowerBI", &["Power BI"]);
        assert!(r.present.contains("power bi"));
        assert_eq!(r.surfaces.get("power bi").map(String::as_str), Some("PowerBI"));
    }

    #[test]
    fn test_empty_and_whitespace_terms_are_skipped() {
        let r = present_missing_with_surface("anything", &["", "   "]);
        assert!(r.present.is_empty());
        assert!(r.missing.is_empty());
        assert_eq!(BucketCounts::from(&r).coverage(), 0.0);
    }

    #[test]
    fn test_external_alias_makes_term_present() {
        let mut aliases = HashMap::new();
        aliases.insert("kubernetes".to_string(), vec!["k8s".to_string()]);
        let r = present_missing_with_aliases("Ran K8s clusters", &["kubernetes"], &aliases);
        assert!(r.present.contains("kubernetes"));
        assert_eq!(r.surfaces["kubernetes"], "K8s");
    }

    #[test]
    fn test_alias_on_multi_token_term_with_table_synonyms() {
        let mut aliases = HashMap::new();
        aliases.insert("azure devops".to_string(), vec!["vsts".to_string()]);
        let r = present_missing_with_aliases("Managed VSTS pipelines", &["Azure DevOps"], &aliases);
        assert!(r.present.contains("azure devops"));
        assert_eq!(r.surfaces["azure devops"], "VSTS");
    }

    #[test]
    fn test_matching_is_idempotent() {
        let text = "Go, Rust, C++ and node js; some ci-cd";
        let terms = ["rust", "c++", "node.js", "ci/cd", "java", "go"];
        let a = present_missing_with_surface(text, &terms);
        let b = present_missing_with_surface(text, &terms);
        assert_eq!(a, b);
        assert_eq!(a.surfaces["node.js"], "node js");
        assert_eq!(a.surfaces["ci/cd"], "ci-cd");
        assert!(a.missing.contains("java"));
    }

    #[test]
    fn test_term_order_does_not_change_result() {
        let text = "AWS and Terraform";
        let a = present_missing_with_surface(text, &["aws", "terraform", "gcp"]);
        let b = present_missing_with_surface(text, &["gcp", "terraform", "aws"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_occurring_phrases_case_insensitive() {
        let found = occurring_phrases(
            "Responsible for managing the team. Helped with deployments.",
            &["responsible for", "Helped With", "synergy", " "],
        );
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["helped with".to_string(), "responsible for".to_string()]
        );
    }
}
