//! Curated high-priority skills. A missing required term in this set counts as a critical issue.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;

static HIGH_PRIORITY_SKILLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // core languages/stacks
        "python", "java", "c++", "c#", ".net", "node.js", "javascript", "typescript", "go",
        "rust", "sql", "mysql", "postgresql", "oracle", "mongodb", "spark", "hadoop",
        // cloud
        "aws", "azure", "gcp", "google cloud", "kubernetes", "docker", "terraform", "ansible",
        // data/ml
        "pandas", "numpy", "scikit-learn", "tensorflow", "pytorch", "mlops",
        // devops/infra
        "linux", "git", "ci/cd", "jenkins", "kafka", "elastic", "elasticsearch", "snowflake",
        // analytics/bi
        "power bi", "tableau", "looker", "excel",
        // security
        "siem", "soc", "iam", "okta", "splunk",
    ]
    .into_iter()
    .collect()
});

pub fn is_priority_skill(term: &str) -> bool {
    HIGH_PRIORITY_SKILLS.contains(term)
}

/// Splits missing required terms into (critical, non-critical).
pub fn split_critical(missing_required: &BTreeSet<String>) -> (Vec<String>, Vec<String>) {
    missing_required
        .iter()
        .cloned()
        .partition(|term| is_priority_skill(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_priority_skills() {
        assert!(is_priority_skill("python"));
        assert!(is_priority_skill("ci/cd"));
        assert!(!is_priority_skill("Python"));
        assert!(!is_priority_skill("basket weaving"));
    }

    #[test]
    fn test_split_critical_is_sorted_partition() {
        let missing: BTreeSet<String> = ["stakeholder management", "sql", "docker", "figma"]
            .into_iter()
            .map(String::from)
            .collect();
        let (critical, other) = split_critical(&missing);
        assert_eq!(critical, vec!["docker", "sql"]);
        assert_eq!(other, vec!["figma", "stakeholder management"]);
    }
}
