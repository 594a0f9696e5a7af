//! Pattern compilation with non-word guards.
//!
//! A match must not be preceded or followed by a word character. Unlike `\b`,
//! this lets tokens that start or end in punctuation (`c++`, `.net`, `c#`)
//! match at the edges of the text and next to punctuation.
//!
//! The `regex` crate has no look-around, so the guards are split:
//! the trailing guard is part of the regex (`(?:\W|$)` after a capture group),
//! and the leading guard is checked against the preceding character, retrying
//! one character further on rejection. The leftmost accepted match is the same
//! one a look-around engine would report.

use std::ops::Range;

use regex::Regex;
use tracing::warn;

use crate::matching::synonyms::{variants_with_aliases, Variant};

/// A case-insensitive regex whose matches are guarded by non-word characters.
#[derive(Debug, Clone)]
pub struct GuardedPattern {
    re: Regex,
}

impl GuardedPattern {
    /// Compiles a guarded pattern from raw regex source (already escaped where needed).
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!(r"(?i)({source})(?:\W|$)"))?;
        Ok(Self { re })
    }

    /// Compiles a single alternation over several regex sources, tried in the given order.
    pub fn alternation<S: AsRef<str>>(sources: &[S]) -> Result<Self, regex::Error> {
        let joined = sources
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join("|");
        Self::new(&format!("(?:{joined})"))
    }

    /// Leftmost guarded match starting at or after `start`.
    pub fn find_at(&self, text: &str, mut start: usize) -> Option<Range<usize>> {
        while start <= text.len() {
            let caps = self.re.captures_at(text, start)?;
            let m = caps.get(1)?;
            if m.start() < m.end() && !preceded_by_word_char(text, m.start()) {
                return Some(m.range());
            }
            if m.start() >= text.len() {
                return None;
            }
            start = next_char_boundary(text, m.start());
        }
        None
    }

    /// The first guarded match in `text`, as the literal substring.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.find_at(text, 0).map(|r| &text[r])
    }

    /// All non-overlapping guarded matches, left to right.
    pub fn find_all(&self, text: &str) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut start = 0;
        while let Some(range) = self.find_at(text, start) {
            start = range.end;
            out.push(range);
        }
        out
    }

    /// Replaces every guarded match with the output of `replace`.
    pub fn replace_all<F>(&self, text: &str, mut replace: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for range in self.find_all(text) {
            out.push_str(&text[last..range.start]);
            out.push_str(&replace(&text[range.clone()]));
            last = range.end;
        }
        out.push_str(&text[last..]);
        out
    }
}

/// A compiled variant of a term.
#[derive(Debug, Clone)]
pub struct TermPattern {
    pub variant: Variant,
    pub pattern: GuardedPattern,
}

/// Compiles one guarded pattern per variant of `term`, in variant order.
#[allow(dead_code)]
pub fn compile(term: &str) -> Vec<TermPattern> {
    compile_with_aliases(term, &[])
}

/// Like [`compile`], with externally supplied aliases merged into the variant set.
pub fn compile_with_aliases(term: &str, aliases: &[String]) -> Vec<TermPattern> {
    variants_with_aliases(term, aliases)
        .into_iter()
        .filter_map(|variant| match GuardedPattern::new(&variant.regex_source()) {
            Ok(pattern) => Some(TermPattern { variant, pattern }),
            Err(e) => {
                warn!("Skipping variant {:?} of '{term}': {e}", variant.as_str());
                None
            }
        })
        .collect()
}

/// First surface string matched by any pattern, trying patterns in order.
pub fn first_surface<'t>(text: &'t str, patterns: &[TermPattern]) -> Option<&'t str> {
    patterns.iter().find_map(|p| p.pattern.find(text))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn preceded_by_word_char(text: &str, pos: usize) -> bool {
    text[..pos].chars().next_back().is_some_and(is_word_char)
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    pos + text[pos..].chars().next().map_or(1, char::len_utf8)
}
