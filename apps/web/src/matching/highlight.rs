//! Keyword highlighting into HTML.
//!
//! Buckets are applied in fixed priority order (critical → medium → low → good).
//! Each match is swapped for an opaque placeholder so later buckets cannot
//! re-match inside a region an earlier bucket already claimed. Placeholders are
//! built from Unicode private-use characters, which are stripped from the input
//! first, so no term can ever match inside one.
//!
//! HTML escaping (`&`, `<`, `>`) is applied while placeholders are expanded, to
//! plain text and matched tokens alike. Matching therefore never sees entities
//! and a term like `amp` or `lt` cannot split one.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::matching::patterns::GuardedPattern;

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';
const PLACEHOLDER_DIGIT_BASE: u32 = 0xE010;

/// Severity classes, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightClass {
    Critical,
    Medium,
    Low,
    Good,
}

impl HighlightClass {
    pub const PRIORITY: [HighlightClass; 4] = [
        HighlightClass::Critical,
        HighlightClass::Medium,
        HighlightClass::Low,
        HighlightClass::Good,
    ];

    pub fn css_class(self) -> &'static str {
        match self {
            HighlightClass::Critical => "hl-critical",
            HighlightClass::Medium => "hl-medium",
            HighlightClass::Low => "hl-low",
            HighlightClass::Good => "hl-good",
        }
    }
}

/// Term lists per severity class. Any bucket may be empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighlightBuckets {
    #[serde(default)]
    pub good: Vec<String>,
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
    #[serde(default)]
    pub low: Vec<String>,
}

impl HighlightBuckets {
    fn terms(&self, class: HighlightClass) -> &[String] {
        match class {
            HighlightClass::Critical => &self.critical,
            HighlightClass::Medium => &self.medium,
            HighlightClass::Low => &self.low,
            HighlightClass::Good => &self.good,
        }
    }
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        push_escaped_char(out, c);
    }
}

fn push_escaped_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        _ => out.push(c),
    }
}

/// Renders `text` as escaped HTML with non-overlapping highlight spans.
pub fn highlight(text: &str, buckets: &HighlightBuckets) -> String {
    let mut work = strip_placeholder_chars(text);
    let mut claimed: Vec<(HighlightClass, String)> = Vec::new();

    for class in HighlightClass::PRIORITY {
        let Some(pattern) = compile_bucket(buckets.terms(class)) else {
            continue;
        };
        work = pattern.replace_all(&work, |token| {
            let placeholder = placeholder(claimed.len());
            claimed.push((class, token.to_string()));
            placeholder
        });
    }

    expand(&work, &claimed)
}

/// Combined alternation for one bucket: de-duplicated, longest term first.
fn compile_bucket(terms: &[String]) -> Option<GuardedPattern> {
    let mut cleaned: Vec<String> = terms
        .iter()
        .map(|t| strip_placeholder_chars(t.trim()))
        .filter(|t| !t.is_empty())
        .collect();
    cleaned.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
    });
    cleaned.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
    if cleaned.is_empty() {
        return None;
    }

    let sources: Vec<String> = cleaned.iter().map(|t| regex::escape(t)).collect();
    match GuardedPattern::alternation(&sources) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("Highlight bucket skipped, pattern failed to compile: {e}");
            None
        }
    }
}

fn is_placeholder_char(c: char) -> bool {
    ('\u{E000}'..='\u{E0FF}').contains(&c)
}

fn strip_placeholder_chars(text: &str) -> String {
    text.chars().filter(|c| !is_placeholder_char(*c)).collect()
}

fn placeholder(index: usize) -> String {
    let mut out = String::new();
    out.push(PLACEHOLDER_OPEN);
    for d in index.to_string().chars() {
        let digit = d.to_digit(10).unwrap_or(0);
        if let Some(c) = char::from_u32(PLACEHOLDER_DIGIT_BASE + digit) {
            out.push(c);
        }
    }
    out.push(PLACEHOLDER_CLOSE);
    out
}

/// Escapes plain text and swaps every placeholder for its span markup.
fn expand(work: &str, claimed: &[(HighlightClass, String)]) -> String {
    let mut out = String::with_capacity(work.len() + claimed.len() * 32);
    let mut chars = work.chars();

    while let Some(c) = chars.next() {
        if c != PLACEHOLDER_OPEN {
            push_escaped_char(&mut out, c);
            continue;
        }
        let mut index = 0usize;
        for d in chars.by_ref() {
            if d == PLACEHOLDER_CLOSE {
                break;
            }
            index = index * 10 + (d as u32 - PLACEHOLDER_DIGIT_BASE) as usize;
        }
        if let Some((class, token)) = claimed.get(index) {
            out.push_str("<span class=\"hl ");
            out.push_str(class.css_class());
            out.push_str("\">");
            push_escaped(&mut out, token);
            out.push_str("</span>");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_spans(html: &str) -> String {
        let mut s = html.replace("</span>", "");
        for class in HighlightClass::PRIORITY {
            s = s.replace(&format!("<span class=\"hl {}\">", class.css_class()), "");
        }
        s
    }

    #[test]
    fn test_cpp_wrapped_in_critical_span() {
        let buckets = HighlightBuckets {
            critical: vec!["c++".to_string()],
            ..Default::default()
        };
        assert_eq!(
            highlight("C++ is great", &buckets),
            "<span class=\"hl hl-critical\">C++</span> is great"
        );
    }

    #[test]
    fn test_bare_plus_signs_are_not_matched() {
        let buckets = HighlightBuckets {
            critical: vec!["c++".to_string()],
            ..Default::default()
        };
        let html = highlight("x ++ y and abc++", &buckets);
        assert!(!html.contains("<span"));
    }

    #[test]
    fn test_critical_wins_over_good_on_same_span() {
        let buckets = HighlightBuckets {
            good: vec!["python".to_string()],
            critical: vec!["python".to_string()],
            ..Default::default()
        };
        let html = highlight("Python developer", &buckets);
        assert!(html.contains("hl-critical"));
        assert!(!html.contains("hl-good"));
    }

    #[test]
    fn test_later_bucket_cannot_match_inside_claimed_region() {
        let buckets = HighlightBuckets {
            good: vec!["learning".to_string()],
            low: vec!["machine learning".to_string()],
            ..Default::default()
        };
        let html = highlight("machine learning and learning", &buckets);
        assert_eq!(
            html,
            "<span class=\"hl hl-low\">machine learning</span> and <span class=\"hl hl-good\">learning</span>"
        );
    }

    #[test]
    fn test_longest_term_wins_within_bucket() {
        let buckets = HighlightBuckets {
            good: vec!["data".to_string(), "data engineering".to_string()],
            ..Default::default()
        };
        let html = highlight("data engineering", &buckets);
        assert_eq!(html, "<span class=\"hl hl-good\">data engineering</span>");
    }

    #[test]
    fn test_output_is_escaped_outside_markup() {
        let buckets = HighlightBuckets {
            good: vec!["script".to_string(), "r&d".to_string()],
            medium: vec!["(a+b)*".to_string()],
            ..Default::default()
        };
        let html = highlight("<script>alert(1)</script> R&D > (a+b)* & more", &buckets);
        let plain = strip_spans(&html);
        assert!(!plain.contains('<'));
        assert!(!plain.contains('>'));
        assert_eq!(plain.matches('&').count(), plain.matches("&amp;").count()
            + plain.matches("&lt;").count()
            + plain.matches("&gt;").count());
        assert!(html.contains("<span class=\"hl hl-good\">R&amp;D</span>"));
    }

    #[test]
    fn test_terms_cannot_split_entities() {
        let buckets = HighlightBuckets {
            good: vec!["amp".to_string(), "lt".to_string()],
            ..Default::default()
        };
        let html = highlight("R&D <tag>", &buckets);
        assert_eq!(html, "R&amp;D &lt;tag&gt;");
    }

    #[test]
    fn test_placeholder_chars_in_input_are_removed() {
        let text = format!("a{}0{} python", PLACEHOLDER_OPEN, PLACEHOLDER_CLOSE);
        let buckets = HighlightBuckets {
            good: vec!["python".to_string()],
            ..Default::default()
        };
        let html = highlight(&text, &buckets);
        assert_eq!(html, "a0 <span class=\"hl hl-good\">python</span>");
    }

    #[test]
    fn test_many_spans_expand_in_order() {
        let text = (0..15).map(|_| "go").collect::<Vec<_>>().join(" ");
        let buckets = HighlightBuckets {
            good: vec!["go".to_string()],
            ..Default::default()
        };
        let html = highlight(&text, &buckets);
        assert_eq!(html.matches("<span class=\"hl hl-good\">go</span>").count(), 15);
    }

    #[test]
    fn test_no_buckets_only_escapes() {
        assert_eq!(
            highlight("a < b & c", &HighlightBuckets::default()),
            "a &lt; b &amp; c"
        );
    }
}
