//! Semantic similarity between a résumé and a job description, and ranking of
//! the résumé against a fixed job taxonomy.
//!
//! Inputs are expected to be cleaned for the model (`documents::clean_for_model`).
//! Failures never propagate: similarity degrades to 0.0 and job matches to an
//! empty list, with a warning logged.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub mod embeddings;

use embeddings::{EmbeddingError, EmbeddingProvider};

pub const JOB_TAXONOMY: [&str; 10] = [
    "System Administrator",
    "Database Administrator",
    "Web Developer",
    "Security Analyst",
    "Network Administrator",
    "Data Scientist",
    "DevOps Engineer",
    "Cloud Engineer",
    "Machine Learning Engineer",
    "Software Engineer",
];

pub const TOP_JOB_MATCHES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub title: String,
    /// Cosine similarity as a percentage, two decimals.
    pub score: f64,
}

/// Cosine similarity of two vectors. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch(a.len(), b.len()));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        Ok(0.0)
    } else {
        Ok(dot_product / (norm_a * norm_b))
    }
}

/// similarity × 100, rounded to two decimals.
fn as_percentage(similarity: f32) -> f64 {
    (f64::from(similarity) * 100.0 * 100.0).round() / 100.0
}

/// Output of [`SimilarityEngine::compare`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// Résumé/JD cosine similarity as a percentage.
    pub score: f64,
    pub top_matches: Vec<JobMatch>,
}

/// Owns the embedding provider and the lazily computed taxonomy embeddings.
pub struct SimilarityEngine {
    provider: Arc<dyn EmbeddingProvider>,
    taxonomy: OnceCell<Vec<Vec<f32>>>,
}

impl SimilarityEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            taxonomy: OnceCell::new(),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.provider.backend()
    }

    /// Résumé/JD similarity and the `n` closest taxonomy titles, from one
    /// embedding call for the pair. Either part degrades independently:
    /// similarity to 0.0, job matches to an empty list.
    pub async fn compare(&self, resume_clean: &str, jd_clean: &str, n: usize) -> Comparison {
        if resume_clean.trim().is_empty() {
            warn!("Similarity calculation skipped: {}", EmbeddingError::EmptyInput);
            return Comparison::default();
        }

        let vectors = match self.embed_pair(resume_clean, jd_clean).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Similarity calculation failed: {e}");
                return Comparison::default();
            }
        };
        let (resume, jd) = vectors;

        let score = match jd.as_deref().map(|jd| cosine_similarity(&resume, jd)) {
            Some(Ok(similarity)) => as_percentage(similarity),
            Some(Err(e)) => {
                warn!("Similarity calculation failed: {e}");
                0.0
            }
            None => {
                warn!("Similarity calculation skipped: job description is empty");
                0.0
            }
        };

        let top_matches = match self.rank_taxonomy(&resume, n).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Top job matches failed: {e}");
                Vec::new()
            }
        };

        Comparison { score, top_matches }
    }

    /// Résumé vector, plus the JD vector when the JD has text.
    async fn embed_pair(
        &self,
        resume_clean: &str,
        jd_clean: &str,
    ) -> Result<(Vec<f32>, Option<Vec<f32>>), EmbeddingError> {
        let texts: Vec<&str> = if jd_clean.trim().is_empty() {
            vec![resume_clean]
        } else {
            vec![resume_clean, jd_clean]
        };
        let vectors = self.provider.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }
        let mut vectors = vectors.into_iter();
        match (vectors.next(), vectors.next()) {
            (Some(resume), jd) => Ok((resume, jd)),
            (None, _) => Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: 0,
            }),
        }
    }

    async fn rank_taxonomy(&self, resume: &[f32], n: usize) -> Result<Vec<JobMatch>, EmbeddingError> {
        let taxonomy = self.taxonomy_embeddings().await?;

        let mut scored = Vec::with_capacity(taxonomy.len());
        for (title, job) in JOB_TAXONOMY.iter().zip(taxonomy) {
            scored.push((*title, cosine_similarity(resume, job)?));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(n)
            .map(|(title, s)| JobMatch {
                title: title.to_string(),
                score: as_percentage(s),
            })
            .collect())
    }

    /// Embeds the taxonomy once; a failed attempt is retried on the next call.
    async fn taxonomy_embeddings(&self) -> Result<&Vec<Vec<f32>>, EmbeddingError> {
        self.taxonomy
            .get_or_try_init(|| async {
                let vectors = self.provider.embed(&JOB_TAXONOMY).await?;
                if vectors.len() != JOB_TAXONOMY.len() {
                    return Err(EmbeddingError::CountMismatch {
                        expected: JOB_TAXONOMY.len(),
                        got: vectors.len(),
                    });
                }
                info!("Generated job taxonomy embeddings ({} titles)", vectors.len());
                Ok(vectors)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use embeddings::DisabledEmbeddings;

    /// Letter-frequency vectors: deterministic and offline.
    struct LetterCounts {
        calls: AtomicUsize,
    }

    impl LetterCounts {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LetterCounts {
        async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                        v[(c - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn backend(&self) -> &'static str {
            "letters"
        }
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
        assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_percentage_rounds_to_two_decimals() {
        assert_eq!(as_percentage(0.123456), 12.35);
        assert_eq!(as_percentage(1.0), 100.0);
    }

    #[tokio::test]
    async fn test_identical_texts_score_100() {
        let engine = SimilarityEngine::new(Arc::new(LetterCounts::new()));
        let result = engine.compare("rust engineer", "rust engineer", TOP_JOB_MATCHES).await;
        assert_eq!(result.score, 100.0);
    }

    #[tokio::test]
    async fn test_failure_and_empty_input_degrade() {
        let engine = SimilarityEngine::new(Arc::new(DisabledEmbeddings));
        assert_eq!(engine.compare("a", "b", TOP_JOB_MATCHES).await, Comparison::default());

        let engine = SimilarityEngine::new(Arc::new(LetterCounts::new()));
        assert_eq!(engine.compare("", "rust", TOP_JOB_MATCHES).await, Comparison::default());

        // An empty JD still ranks the résumé against the taxonomy.
        let result = engine.compare("web developer", " ", TOP_JOB_MATCHES).await;
        assert_eq!(result.score, 0.0);
        assert_eq!(result.top_matches.len(), TOP_JOB_MATCHES);
    }

    #[tokio::test]
    async fn test_top_matches_sorted_and_truncated() {
        let engine = SimilarityEngine::new(Arc::new(LetterCounts::new()));
        let matches = engine
            .compare("database administrator", "sql", TOP_JOB_MATCHES)
            .await
            .top_matches;
        assert_eq!(matches.len(), TOP_JOB_MATCHES);
        assert_eq!(matches[0].title, "Database Administrator");
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_one_embedding_call_per_comparison() {
        let provider = Arc::new(LetterCounts::new());
        let engine = SimilarityEngine::new(provider.clone());
        engine.compare("web developer", "frontend role", 3).await;
        engine.compare("cloud engineer", "aws role", 3).await;
        // one taxonomy call, then one résumé+JD call per comparison
        assert_eq!(provider.calls.load(AtomicOrdering::SeqCst), 3);
    }
}
