//! Company identity normalisation and fuzzy matching
//!
//! Names are compared on a canonical key: lowercase, punctuation folded to spaces, trailing
//! legal-form suffixes ("Ltd.", "Limited", "Inc", "Corp", ...) removed. Similarity between two
//! keys is a Jaro-Winkler score scaled to 0..=100, taking the better of the raw and the
//! token-sorted comparison so word order does not matter.
//!
//! Everything here is a pure function over its inputs, so a single [`CompanyMatcher`] can be
//! shared by concurrent source queries without locking.

use crate::types::{CompanyIdentity, CompanyMatch};

/// Legal-form tokens stripped from the end of a canonical key
const LEGAL_SUFFIXES: &[&str] = &[
    "ltd",
    "limited",
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "plc",
    "llc",
    "pvt",
    "private",
    "ag",
    "sa",
    "nv",
    "kk",
];

/// Canonical comparison key for a company name
///
/// `"Reliance Industries Ltd."` and `"RELIANCE INDUSTRIES LIMITED"` both become
/// `"reliance industries"`. A name consisting only of suffix words keeps its first word.
pub fn canonical_key(name: &str) -> String {
    let folded: String = name
        .chars()
        .flat_map(|c| {
            let mapped = if c.is_alphanumeric() || c == '&' { c } else { ' ' };
            mapped.to_lowercase()
        })
        .collect();
    let mut tokens: Vec<&str> = folded.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| LEGAL_SUFFIXES.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}

/// Display-preserving normalisation used when sending a name to a source's search
///
/// Trims whitespace and strips trailing legal suffixes but keeps the original case.
pub fn normalize_company_name(name: &str) -> String {
    let mut words: Vec<&str> = name.split_whitespace().collect();
    while words.len() > 1 {
        let Some(last) = words.last() else { break };
        let bare: String = last
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if LEGAL_SUFFIXES.contains(&bare.as_str()) {
            words.pop();
        } else {
            break;
        }
    }
    words.join(" ")
}

/// Split a multi-company query on `delimiter`, dropping empty or whitespace-only tokens
///
/// Input order is preserved.
pub fn split_query(query: &str, delimiter: char) -> Vec<String> {
    query
        .split(delimiter)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Similarity between two names on a 0..=100 scale
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = canonical_key(a);
    let b = canonical_key(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 100.0;
    }
    let direct = strsim::jaro_winkler(&a, &b);
    let sorted = strsim::jaro_winkler(&sorted_tokens(&a), &sorted_tokens(&b));
    (direct.max(sorted) * 100.0).clamp(0.0, 100.0)
}

fn sorted_tokens(key: &str) -> String {
    let mut tokens: Vec<&str> = key.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Decides whether a source's company is the one a query asked for
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompanyMatcher {
    threshold: f64,
}

impl Default for CompanyMatcher {
    fn default() -> Self {
        Self::new(80.0)
    }
}

impl CompanyMatcher {
    /// Matcher accepting scores at or above `threshold` (clamped to 0..=100)
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 100.0),
        }
    }

    /// Acceptance threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a query against a company identity
    ///
    /// An exact (case-insensitive) ticker hit scores 100.
    pub fn score(&self, query: &str, company: &CompanyIdentity) -> f64 {
        let query = query.trim();
        if company
            .ticker
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(query))
        {
            return 100.0;
        }
        similarity(query, &company.name)
    }

    /// Whether a score clears the threshold
    pub fn accepts(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Highest-scoring candidate above the threshold; earlier candidates win ties
    pub fn best_match<'a>(
        &self,
        query: &str,
        candidates: &'a [CompanyMatch],
    ) -> Option<(&'a CompanyMatch, f64)> {
        let mut best: Option<(&'a CompanyMatch, f64)> = None;
        for candidate in candidates {
            let score = self.score(query, &candidate.identity);
            if !self.accepts(score) {
                continue;
            }
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((candidate, score));
            }
        }
        best
    }

    /// All candidates above the threshold, best first (stable for equal scores)
    pub fn rank(&self, query: &str, candidates: Vec<CompanyMatch>) -> Vec<(CompanyMatch, f64)> {
        let mut scored: Vec<(CompanyMatch, f64)> = candidates
            .into_iter()
            .map(|c| {
                let score = self.score(query, &c.identity);
                (c, score)
            })
            .filter(|(_, score)| self.accepts(*score))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}
