//! Similarity scoring between lost and found report text
//!
//! The scorer is a strategy interface so the keyword heuristic can later be
//! replaced by an embedding-based model without touching the scan control
//! flow. Any implementation must be deterministic, commutative, and bounded
//! to [0, 1].

use std::collections::HashSet;

/// Contract: `score(a, b) == score(b, a)`, output in [0, 1], identical text
/// with at least one significant token scores 1.0, and the score is monotonic
/// in the number of shared significant tokens.
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Filler words that carry no signal for item identity. Every lost-item post
/// says "lost" and "help"; matching on those would pair everything with
/// everything.
static STOP_WORDS: phf::Set<&'static str> = phf::phf_set! {
    "the", "and", "for", "with", "near", "from", "this", "that", "was",
    "were", "have", "has", "had", "his", "her", "its", "our", "your",
    "their", "are", "but", "not", "you", "all", "any", "can", "will",
    "just", "about", "very", "some", "one", "out", "into", "been",
    "there", "here", "where", "when", "what", "who", "how", "did",
    "does", "please", "help", "lost", "found", "item", "left", "missing",
    "anyone", "somebody", "someone", "around", "yesterday", "today",
};

/// Lowercased alphanumeric tokens, minus stop words and tokens of one or two
/// characters.
pub fn significant_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Keyword overlap scorer: Jaccard index over significant token sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordScorer;

impl SimilarityScorer for KeywordScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        let tokens_a = significant_tokens(a);
        let tokens_b = significant_tokens(b);

        if tokens_a.is_empty() || tokens_b.is_empty() {
            return 0.0;
        }

        let shared = tokens_a.intersection(&tokens_b).count();
        let union = tokens_a.len() + tokens_b.len() - shared;

        shared as f64 / union as f64
    }
}
