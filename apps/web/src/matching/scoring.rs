//! ATS compatibility scoring.
//!
//! `Weighted` is the canonical formula. `Simplified` is the legacy formula,
//! kept selectable for deployments that still report against it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::matching::presence::PresenceResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFormula {
    #[default]
    Weighted,
    Simplified,
}

impl FromStr for ScoringFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" => Ok(ScoringFormula::Weighted),
            "simplified" => Ok(ScoringFormula::Simplified),
            other => Err(format!(
                "unknown scoring formula '{other}' (expected 'weighted' or 'simplified')"
            )),
        }
    }
}

impl fmt::Display for ScoringFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringFormula::Weighted => write!(f, "weighted"),
            ScoringFormula::Simplified => write!(f, "simplified"),
        }
    }
}

/// Present/missing counts for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub present: usize,
    pub missing: usize,
}

impl BucketCounts {
    /// present / max(1, present + missing). An empty bucket reports 0.
    pub fn coverage(&self) -> f64 {
        self.present as f64 / (self.present + self.missing).max(1) as f64
    }
}

impl From<&PresenceResult> for BucketCounts {
    fn from(r: &PresenceResult) -> Self {
        BucketCounts {
            present: r.present_count(),
            missing: r.missing_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageCounts {
    pub required: BucketCounts,
    pub optional: BucketCounts,
    pub technical: BucketCounts,
    pub soft: BucketCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyInputs {
    /// Missing required terms that are in the priority skill set.
    pub critical_missing: usize,
    pub weak_phrases: usize,
    pub low_context_phrases: usize,
}

/// Scores with the chosen formula. Always in [0, 100].
pub fn score(formula: ScoringFormula, counts: &CoverageCounts, penalties: &PenaltyInputs) -> u32 {
    match formula {
        ScoringFormula::Weighted => weighted_score(counts, penalties),
        ScoringFormula::Simplified => simplified_score(counts, penalties),
    }
}

/// Four-bucket weighted coverage minus penalties capped at 70% of the base.
pub fn weighted_score(counts: &CoverageCounts, penalties: &PenaltyInputs) -> u32 {
    let base = 100.0
        * (0.50 * counts.required.coverage()
            + 0.25 * counts.optional.coverage()
            + 0.20 * counts.technical.coverage()
            + 0.05 * counts.soft.coverage().min(1.0));

    let penalty = 8.0 * counts.required.missing as f64
        + 3.0 * penalties.weak_phrases as f64
        + 2.0 * penalties.low_context_phrases as f64;

    clamp_round(base - penalty.min(base * 0.7))
}

/// Required/optional coverage minus critical-miss and excess-weak-phrase penalties.
pub fn simplified_score(counts: &CoverageCounts, penalties: &PenaltyInputs) -> u32 {
    let base = 100.0 * (0.65 * counts.required.coverage() + 0.25 * counts.optional.coverage());

    let penalty = 5.0 * penalties.critical_missing as f64
        + 2.0 * penalties.weak_phrases.saturating_sub(3) as f64
        + penalties.low_context_phrases as f64;

    clamp_round(base - penalty)
}

fn clamp_round(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u32
}

/// Qualitative bucket for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLevel {
    Great,
    Good,
    Fair,
    Poor,
}

impl ScoreLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => ScoreLevel::Great,
            s if s >= 60 => ScoreLevel::Good,
            s if s >= 40 => ScoreLevel::Fair,
            _ => ScoreLevel::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreLevel::Great => "great",
            ScoreLevel::Good => "good",
            ScoreLevel::Fair => "fair",
            ScoreLevel::Poor => "poor",
        }
    }

    /// CSS class used by the result page.
    pub fn css_class(self) -> String {
        format!("ats-{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(present: usize, missing: usize) -> BucketCounts {
        BucketCounts { present, missing }
    }

    #[test]
    fn test_full_coverage_no_penalties_is_100() {
        let counts = CoverageCounts {
            required: bucket(3, 0),
            optional: bucket(2, 0),
            technical: bucket(4, 0),
            soft: bucket(1, 0),
        };
        assert_eq!(weighted_score(&counts, &PenaltyInputs::default()), 100);
    }

    #[test]
    fn test_empty_buckets_score_zero() {
        let counts = CoverageCounts::default();
        assert_eq!(weighted_score(&counts, &PenaltyInputs::default()), 0);
        assert_eq!(simplified_score(&counts, &PenaltyInputs::default()), 0);
    }

    #[test]
    fn test_weighted_penalty_per_missing_required() {
        let counts = CoverageCounts {
            required: bucket(2, 2),
            optional: bucket(1, 0),
            technical: bucket(1, 0),
            soft: bucket(0, 0),
        };
        // base 70, penalty 16
        assert_eq!(weighted_score(&counts, &PenaltyInputs::default()), 54);
    }

    #[test]
    fn test_weighted_penalty_capped_at_seventy_percent() {
        let counts = CoverageCounts {
            required: bucket(2, 2),
            optional: bucket(1, 0),
            technical: bucket(1, 0),
            soft: bucket(0, 0),
        };
        let penalties = PenaltyInputs {
            weak_phrases: 20,
            ..Default::default()
        };
        // base 70, penalty 76 capped at 49
        assert_eq!(weighted_score(&counts, &penalties), 21);
    }

    #[test]
    fn test_simplified_formula() {
        let counts = CoverageCounts {
            required: bucket(2, 1),
            optional: bucket(1, 0),
            ..Default::default()
        };
        let penalties = PenaltyInputs {
            critical_missing: 1,
            weak_phrases: 5,
            low_context_phrases: 1,
        };
        // 68.33 - (5 + 4 + 1)
        assert_eq!(simplified_score(&counts, &penalties), 58);
    }

    #[test]
    fn test_simplified_clamps_to_zero() {
        let counts = CoverageCounts {
            required: bucket(0, 10),
            ..Default::default()
        };
        let penalties = PenaltyInputs {
            critical_missing: 10,
            weak_phrases: 100,
            low_context_phrases: 100,
        };
        assert_eq!(simplified_score(&counts, &penalties), 0);
    }

    #[test]
    fn test_score_always_within_bounds() {
        for present in 0..5 {
            for missing in 0..5 {
                for weak in [0, 1, 4, 50, usize::MAX / 4] {
                    let counts = CoverageCounts {
                        required: bucket(present, missing),
                        optional: bucket(missing, present),
                        technical: bucket(present, present),
                        soft: bucket(missing, 0),
                    };
                    let penalties = PenaltyInputs {
                        critical_missing: missing,
                        weak_phrases: weak,
                        low_context_phrases: weak,
                    };
                    for formula in [ScoringFormula::Weighted, ScoringFormula::Simplified] {
                        assert!(score(formula, &counts, &penalties) <= 100);
                    }
                }
            }
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(ScoreLevel::from_score(100), ScoreLevel::Great);
        assert_eq!(ScoreLevel::from_score(80), ScoreLevel::Great);
        assert_eq!(ScoreLevel::from_score(79), ScoreLevel::Good);
        assert_eq!(ScoreLevel::from_score(60), ScoreLevel::Good);
        assert_eq!(ScoreLevel::from_score(40), ScoreLevel::Fair);
        assert_eq!(ScoreLevel::from_score(39), ScoreLevel::Poor);
        assert_eq!(ScoreLevel::from_score(0).css_class(), "ats-poor");
    }

    #[test]
    fn test_formula_parses_from_config_string() {
        assert_eq!("Weighted".parse(), Ok(ScoringFormula::Weighted));
        assert_eq!(" simplified ".parse(), Ok(ScoringFormula::Simplified));
        assert!("linear".parse::<ScoringFormula>().is_err());
    }
}
