//! Report pipeline: runs the whole analysis for one résumé/JD pair.
//!
//! Stages: model-input cleaning → similarity + LLM analysis (concurrently) →
//! role aliases → presence per bucket → highlighting → deterministic counts
//! and ATS score. No stage can fail the pipeline; collaborators degrade to
//! their fallbacks.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::analyzer::analyze_or_default;
use crate::analysis::model::SmartCvCounts;
use crate::documents::clean_for_model;
use crate::matching::aliases::role_synonyms;
use crate::matching::highlight::{highlight, HighlightBuckets};
use crate::matching::presence::{occurring_phrases, present_missing_with_aliases, PresenceResult};
use crate::matching::priority::split_critical;
use crate::matching::scoring::{
    score, BucketCounts, CoverageCounts, PenaltyInputs, ScoreLevel, ScoringFormula,
};
use crate::similarity::{Comparison, JobMatch, TOP_JOB_MATCHES};
use crate::state::AppState;

pub mod handlers;

/// Coverage per bucket as a percentage, one decimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub required: f64,
    pub optional: f64,
    pub technical: f64,
    pub soft: f64,
}

impl From<&CoverageCounts> for CoverageMetrics {
    fn from(c: &CoverageCounts) -> Self {
        let pct = |b: &BucketCounts| (b.coverage() * 1000.0).round() / 10.0;
        CoverageMetrics {
            required: pct(&c.required),
            optional: pct(&c.optional),
            technical: pct(&c.technical),
            soft: pct(&c.soft),
        }
    }
}

/// Everything the result page and the JSON API report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub similarity_score: f64,
    pub top_matches: Vec<JobMatch>,

    pub present_required: Vec<String>,
    pub missing_required: Vec<String>,
    pub present_optional: Vec<String>,
    pub missing_optional: Vec<String>,
    pub present_technical: Vec<String>,
    pub missing_technical: Vec<String>,
    pub present_soft: Vec<String>,
    pub missing_soft: Vec<String>,

    /// present required ∪ present optional
    pub keywords_found: Vec<String>,
    /// missing required ∪ missing optional
    pub keywords_missing: Vec<String>,
    pub critical_missing_required: Vec<String>,
    pub non_critical_missing_required: Vec<String>,

    pub weak_language_phrases: Vec<String>,
    pub low_context_phrases: Vec<String>,
    pub smart_cv_analysis: SmartCvCounts,
    pub coverage: CoverageMetrics,

    pub ats_score: u32,
    pub ats_level: ScoreLevel,
    pub scoring_formula: ScoringFormula,
    /// Score proposed by the model; informational only.
    pub model_ats_score: u32,
    pub model_used: Option<String>,

    pub resume_hl: String,
    pub jd_hl: String,
    pub suggestions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl MatchReport {
    pub fn ats_css_class(&self) -> String {
        self.ats_level.css_class()
    }
}

fn union(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Vec<String> {
    a.union(b).cloned().collect()
}

/// Runs the full analysis. `resume_text` and `jd_text` are display text.
pub async fn run_analysis(state: &AppState, resume_text: &str, jd_text: &str) -> MatchReport {
    let resume_clean = clean_for_model(resume_text);
    let jd_clean = clean_for_model(jd_text);

    let (comparison, analysis) = tokio::join!(
        state.similarity.compare(&resume_clean, &jd_clean, TOP_JOB_MATCHES),
        analyze_or_default(state.analyzer.as_ref(), resume_text, jd_text),
    );
    let Comparison {
        score: similarity_score,
        top_matches,
    } = comparison;
    info!(
        "Similarity {similarity_score:.2}%, {} job matches, analysis by {}",
        top_matches.len(),
        analysis.model_used.as_deref().unwrap_or("fallback")
    );

    let aliases = role_synonyms(
        state.aliases.as_ref(),
        &state.synonym_cache,
        [
            analysis.jd_required_keywords.as_slice(),
            analysis.jd_optional_keywords.as_slice(),
            analysis.technical_skills.as_slice(),
            analysis.soft_skills.as_slice(),
        ],
        jd_text,
    )
    .await;

    let required = present_missing_with_aliases(resume_text, &analysis.jd_required_keywords, &aliases);
    let optional = present_missing_with_aliases(resume_text, &analysis.jd_optional_keywords, &aliases);
    let technical = present_missing_with_aliases(resume_text, &analysis.technical_skills, &aliases);
    let soft = present_missing_with_aliases(resume_text, &analysis.soft_skills, &aliases);

    // JD: green where the résumé has it, red for required misses, blue for optional misses.
    let jd_hl = highlight(
        jd_text,
        &HighlightBuckets {
            good: union(&required.present, &optional.present),
            critical: required.missing_sorted(),
            low: optional.missing_sorted(),
            ..Default::default()
        },
    );

    // Résumé: the exact surfaces that matched, plus weak and low-context phrases.
    let resume_good: Vec<String> = [&required, &optional, &technical, &soft]
        .iter()
        .flat_map(|r: &&PresenceResult| r.surface_values())
        .collect();
    let resume_hl = highlight(
        resume_text,
        &HighlightBuckets {
            good: resume_good,
            medium: lowercased(&analysis.weak_language_phrases),
            low: lowercased(&analysis.low_context_phrases),
            ..Default::default()
        },
    );

    let weak_matched = occurring_phrases(resume_text, &analysis.weak_language_phrases);
    let low_matched = occurring_phrases(resume_text, &analysis.low_context_phrases);
    let (critical_missing, non_critical_missing) = split_critical(&required.missing);

    let keywords_found = union(&required.present, &optional.present);
    let keywords_missing = union(&required.missing, &optional.missing);

    let counts = CoverageCounts {
        required: BucketCounts::from(&required),
        optional: BucketCounts::from(&optional),
        technical: BucketCounts::from(&technical),
        soft: BucketCounts::from(&soft),
    };
    let penalties = PenaltyInputs {
        critical_missing: critical_missing.len(),
        weak_phrases: weak_matched.len(),
        low_context_phrases: low_matched.len(),
    };
    let ats_score = score(state.scoring_formula, &counts, &penalties);

    let smart_cv_analysis = SmartCvCounts {
        critical_issues: critical_missing.len() as u32,
        improvements: weak_matched.len() as u32,
        missing_skills: keywords_missing.len() as u32,
        keywords_found: keywords_found.len() as u32,
    };

    info!(
        "ATS score {ats_score} ({}), {} found / {} missing",
        state.scoring_formula,
        keywords_found.len(),
        keywords_missing.len()
    );

    MatchReport {
        similarity_score,
        top_matches,
        present_required: required.present_sorted(),
        missing_required: required.missing_sorted(),
        present_optional: optional.present_sorted(),
        missing_optional: optional.missing_sorted(),
        present_technical: technical.present_sorted(),
        missing_technical: technical.missing_sorted(),
        present_soft: soft.present_sorted(),
        missing_soft: soft.missing_sorted(),
        keywords_found,
        keywords_missing,
        critical_missing_required: critical_missing,
        non_critical_missing_required: non_critical_missing,
        weak_language_phrases: analysis.weak_language_phrases,
        low_context_phrases: analysis.low_context_phrases,
        smart_cv_analysis,
        coverage: CoverageMetrics::from(&counts),
        ats_score,
        ats_level: ScoreLevel::from_score(ats_score),
        scoring_formula: state.scoring_formula,
        model_ats_score: analysis.ats_score,
        model_used: analysis.model_used,
        resume_hl,
        jd_hl,
        suggestions: analysis.ats_suggestions,
        generated_at: Utc::now(),
    }
}

fn lowercased(phrases: &[String]) -> Vec<String> {
    phrases.iter().map(|p| p.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::analysis::analyzer::Analyzer;
    use crate::analysis::model::KeywordAnalysis;
    use crate::llm_client::LlmError;
    use crate::state::AppState;

    /// Canned analysis so the pipeline can be checked without the network.
    pub(crate) struct CannedAnalyzer;

    #[async_trait]
    impl Analyzer for CannedAnalyzer {
        async fn analyze(&self, _: &str, _: &str) -> Result<KeywordAnalysis, LlmError> {
            Ok(KeywordAnalysis {
                ats_score: 77,
                jd_required_keywords: vec!["python".into(), "sql".into(), "kubernetes".into()],
                jd_optional_keywords: vec!["power bi".into(), "tableau".into()],
                technical_skills: vec!["python".into(), "docker".into()],
                soft_skills: vec!["communication".into()],
                weak_language_phrases: vec!["Responsible for".into(), "synergy".into()],
                low_context_phrases: vec!["worked on dashboards".into()],
                ats_suggestions: vec!["Add SQL projects".into()],
                model_used: Some("canned".into()),
                ..Default::default()
            })
        }

        fn backend(&self) -> &'static str {
            "canned"
        }
    }

    const RESUME: &str = "Experienced Python developer. Responsible for ETL jobs; \
        worked on dashboards in PowerBI. Ran K8s clusters & Docker images.";
    const JD: &str = "We need Python, SQL and Kubernetes. Power BI or Tableau is a plus. \
        Strong communication <required>.";

    #[tokio::test]
    async fn test_pipeline_buckets_and_counts() {
        let state = AppState::for_tests(Arc::new(CannedAnalyzer));
        let report = run_analysis(&state, RESUME, JD).await;

        assert_eq!(report.present_required, vec!["kubernetes", "python"]);
        assert_eq!(report.missing_required, vec!["sql"]);
        assert_eq!(report.present_optional, vec!["power bi"]);
        assert_eq!(report.missing_optional, vec!["tableau"]);
        assert_eq!(report.present_technical, vec!["docker", "python"]);
        assert_eq!(report.missing_soft, vec!["communication"]);

        assert_eq!(report.keywords_found, vec!["kubernetes", "power bi", "python"]);
        assert_eq!(report.keywords_missing, vec!["sql", "tableau"]);
        assert_eq!(report.critical_missing_required, vec!["sql"]);
        assert!(report.non_critical_missing_required.is_empty());

        assert_eq!(
            report.smart_cv_analysis,
            SmartCvCounts {
                critical_issues: 1,
                improvements: 1,
                missing_skills: 2,
                keywords_found: 3,
            }
        );
        assert_eq!(report.coverage.required, 66.7);
        assert_eq!(report.coverage.optional, 50.0);
        assert_eq!(report.model_ats_score, 77);
        assert_eq!(report.model_used.as_deref(), Some("canned"));
        assert_eq!(report.suggestions, vec!["Add SQL projects"]);
    }

    #[tokio::test]
    async fn test_pipeline_score_uses_weighted_formula() {
        let state = AppState::for_tests(Arc::new(CannedAnalyzer));
        let report = run_analysis(&state, RESUME, JD).await;
        // base 100 × (0.5·2/3 + 0.25·1/2 + 0.2·1 + 0.05·0) = 65.83
        // penalty 8·1 + 3·1 + 2·1 = 13
        assert_eq!(report.scoring_formula, ScoringFormula::Weighted);
        assert_eq!(report.ats_score, 53);
        assert_eq!(report.ats_level, ScoreLevel::Fair);
    }

    #[tokio::test]
    async fn test_pipeline_highlights_both_texts() {
        let state = AppState::for_tests(Arc::new(CannedAnalyzer));
        let report = run_analysis(&state, RESUME, JD).await;

        assert!(report.resume_hl.contains("<span class=\"hl hl-good\">PowerBI</span>"));
        assert!(report.resume_hl.contains("<span class=\"hl hl-good\">K8s</span>"));
        assert!(report.resume_hl.contains("<span class=\"hl hl-medium\">Responsible for</span>"));
        assert!(report.resume_hl.contains("&amp; "));

        assert!(report.jd_hl.contains("<span class=\"hl hl-critical\">SQL</span>"));
        assert!(report.jd_hl.contains("<span class=\"hl hl-low\">Tableau</span>"));
        assert!(report.jd_hl.contains("<span class=\"hl hl-good\">Python</span>"));
        assert!(report.jd_hl.contains("&lt;required&gt;"));
    }

    #[tokio::test]
    async fn test_pipeline_without_embeddings_reports_zero_similarity() {
        let state = AppState::for_tests(Arc::new(CannedAnalyzer));
        let report = run_analysis(&state, RESUME, JD).await;
        assert_eq!(report.similarity_score, 0.0);
        assert!(report.top_matches.is_empty());
    }

    #[test]
    fn test_coverage_metrics_one_decimal() {
        let counts = CoverageCounts {
            required: BucketCounts { present: 1, missing: 2 },
            ..Default::default()
        };
        let m = CoverageMetrics::from(&counts);
        assert_eq!(m.required, 33.3);
        assert_eq!(m.soft, 0.0);
    }
}
