//! Term normalization: the canonical form every comparison goes through.

/// Trims and lower-cases a raw keyword. An empty result means "no term".
pub fn canonical(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Canonicalizes a list of raw keywords, dropping empties while keeping first-seen order.
pub fn canonical_terms<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for raw in terms {
        let term = canonical(raw.as_ref());
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}
