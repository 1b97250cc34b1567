//! Mandatory custom terms ("custom morphemes").

use seoblog_core::TermCheck;

/// Split a space-delimited term list, dropping empties and repeats.
pub fn parse_terms(terms: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in terms.unwrap_or_default().split_whitespace() {
        if !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

/// Case-insensitive substring check of every term against the whole content.
pub fn check_terms(content: &str, terms: Option<&str>) -> TermCheck {
    let hay = content.to_lowercase();
    let mut check = TermCheck::default();
    for term in parse_terms(terms) {
        if hay.contains(&term.to_lowercase()) {
            check.used.push(term);
        } else {
            check.missing.push(term);
        }
    }
    check
}
