//! Synonym expansion: canonical term → ordered, de-duplicated variant set.
//!
//! All literals come first: the canonical term, the curated table below, then
//! any externally supplied aliases. Separator-flexible pattern fragments for the
//! multi-token literals follow, so the cap never crowds out a literal alias.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::matching::terms::canonical;

/// Upper bound on variants per term; bounds pattern compilation per request.
pub const MAX_VARIANTS: usize = 8;

/// Any run of separators (or none) between two tokens of a multi-token term.
pub const FLEX_SEP: &str = r"[\s\-/_.]*";

static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-/_.]+").expect("valid regex"));

/// Curated aliases. Keys are canonical forms.
static SYNONYMS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    // cloud
    m.insert("gcp", &["google cloud", "google cloud platform"]);
    m.insert("aws", &["amazon web services"]);
    m.insert("azure devops", &["azure boards", "ado"]);
    // web/dev
    m.insert("node.js", &["nodejs", "node js"]);
    m.insert(".net", &["dotnet", "dot net"]);
    // bi/analytics
    m.insert("power bi", &["powerbi", "pbi"]);
    m.insert("ms office", &["microsoft office", "office 365", "office365"]);
    m.insert("postgresql", &["postgres"]);
    // data engineering
    m.insert("ci/cd", &["cicd", "ci cd"]);
    m.insert("google bigquery", &["bigquery", "gcp bigquery"]);
    m.insert("etl", &["extract transform load"]);
    // gis
    m.insert("pix4d", &["pix 4d", "pix-4d"]);
    m.insert("arcgis", &["arc gis", "arc-gis"]);
    m.insert("qgis", &["q gis", "q-gis"]);
    // security
    m.insert("iam", &["identity and access management"]);
    m
});

/// One surface form of a term.
///
/// `Pattern` fragments are already valid regex and must not be escaped again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Literal(String),
    Pattern(String),
}

impl Variant {
    pub fn as_str(&self) -> &str {
        match self {
            Variant::Literal(s) | Variant::Pattern(s) => s,
        }
    }

    /// Regex source for this variant, without boundary guards.
    pub fn regex_source(&self) -> String {
        match self {
            Variant::Literal(s) => regex::escape(s),
            Variant::Pattern(s) => s.clone(),
        }
    }
}

/// Curated aliases for a canonical term, if any.
pub fn static_synonyms(term: &str) -> &'static [&'static str] {
    SYNONYMS.get(term).copied().unwrap_or(&[])
}

/// True if the string contains a token separator (space, `-`, `_`, `/`, `.`).
pub fn has_separator(s: &str) -> bool {
    s.chars()
        .any(|c| c.is_whitespace() || matches!(c, '-' | '_' | '/' | '.'))
}

/// Variants of a term from the curated table only.
pub fn variants(term: &str) -> Vec<Variant> {
    variants_with_aliases(term, &[])
}

/// Variants of a term, merging externally supplied aliases after the curated ones.
///
/// The first element is always the canonical term. Empty input yields no variants.
pub fn variants_with_aliases(term: &str, aliases: &[String]) -> Vec<Variant> {
    let canon = canonical(term);
    if canon.is_empty() {
        return Vec::new();
    }

    let mut literals: Vec<String> = vec![canon.clone()];
    literals.extend(static_synonyms(&canon).iter().map(|s| s.to_string()));
    literals.extend(aliases.iter().map(|a| canonical(a)).filter(|a| !a.is_empty()));

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Variant> = Vec::new();

    let mut push = |variant: Variant, out: &mut Vec<Variant>| {
        if seen.insert(variant.as_str().to_lowercase()) {
            out.push(variant);
        }
    };

    for literal in &literals {
        push(Variant::Literal(literal.clone()), &mut out);
    }
    for literal in literals.iter().filter(|l| has_separator(l)) {
        if let Some((flexible, spaced)) = separator_variants(literal) {
            push(Variant::Pattern(flexible), &mut out);
            push(Variant::Pattern(spaced), &mut out);
        }
    }

    out.truncate(MAX_VARIANTS);
    out
}

/// Builds the two pattern fragments for a multi-token literal:
/// tokens joined by any-or-no separator, and tokens joined by mandatory whitespace.
/// Returns `None` when the literal has fewer than two non-empty tokens (e.g. `.net`).
fn separator_variants(literal: &str) -> Option<(String, String)> {
    let tokens: Vec<String> = SEPARATOR_RUN
        .split(literal)
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();
    if tokens.len() < 2 {
        return None;
    }
    Some((tokens.join(FLEX_SEP), tokens.join(r"\s+")))
}
