//! Relevance scoring and topic fingerprints.
//!
//! Relevance is importance (0-100) scaled by a recency factor. Fingerprints
//! are keyword-token sets: lower-cased ASCII words of two or more
//! characters with stop-words removed. Tokens containing non-ASCII
//! characters are dropped, so non-ASCII text has no topic overlap with
//! anything.

use chrono::{DateTime, Utc};
use memwindow_config::ScoringConfig;
use memwindow_core::{CandidateItem, TopicFingerprint};
use sha2::{Digest, Sha256};

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const MIN_TOKEN_LEN: usize = 2;

/// Sorted for binary search.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
    "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have", "having",
    "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "i", "if",
    "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my",
    "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "user", "users",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours",
];

/// Everything the scorer derives from one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemScore {
    /// Recency-decayed importance, 0-100.
    pub relevance: f64,
    pub fingerprint: TopicFingerprint,
    /// Hex SHA-256 of the normalized token sequence.
    pub signature: String,
    /// Content length in Unicode scalar values.
    pub char_count: usize,
}

/// Score one candidate against the reference time `now`.
pub fn score_item(item: &CandidateItem, scoring: &ScoringConfig, now: DateTime<Utc>) -> ItemScore {
    let tokens = tokenize(&item.content);
    let age = item
        .reference_timestamp()
        .map(|ts| now.signed_duration_since(ts).num_milliseconds());

    ItemScore {
        relevance: relevance(item.importance, age, scoring),
        signature: signature(&tokens),
        fingerprint: tokens.into_iter().collect(),
        char_count: item.content.chars().count(),
    }
}

/// Importance clamped to 0-100 times the recency factor for `age_millis`.
///
/// Non-finite importance counts as 0. A missing age gets the full penalty.
pub fn relevance(importance: f64, age_millis: Option<i64>, scoring: &ScoringConfig) -> f64 {
    let importance = if importance.is_finite() {
        importance.clamp(0.0, 100.0)
    } else {
        0.0
    };
    importance * recency_factor(age_millis, scoring)
}

/// Multiplier in `[0, 1]` that strictly decreases with age.
///
/// Inside the horizon it falls linearly from 1.0 to `1 - in_horizon_decay`;
/// past the horizon it halves every `decay_half_life_days`. Future
/// timestamps count as age 0, a missing timestamp as infinitely old.
pub fn recency_factor(age_millis: Option<i64>, scoring: &ScoringConfig) -> f64 {
    let Some(age_millis) = age_millis else {
        return 0.0;
    };
    let age_days = age_millis.max(0) as f64 / MILLIS_PER_DAY;
    let horizon = scoring.recency_horizon_days;
    let at_horizon = 1.0 - scoring.in_horizon_decay;

    if age_days <= horizon {
        1.0 - scoring.in_horizon_decay * (age_days / horizon)
    } else {
        let past = age_days - horizon;
        at_horizon * 0.5f64.powf(past / scoring.decay_half_life_days)
    }
}

/// Split text into normalized keyword tokens, in content order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && t.is_ascii())
        .map(str::to_ascii_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// The sorted keyword set of `text`.
pub fn fingerprint(text: &str) -> TopicFingerprint {
    tokenize(text).into_iter().collect()
}

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

fn signature(tokens: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tokens.join(" ").as_bytes());
    format!("{:x}", hasher.finalize())
}
