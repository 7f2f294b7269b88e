//! Candidate and context items.
//!
//! A [`CandidateItem`] is what the memory store supplies. A [`ContextItem`]
//! is the scored, classified form the selector builds for one call; it is
//! never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Normalized keyword tokens of an item's content, in sorted order.
pub type TopicFingerprint = BTreeSet<String>;

/// A memory record offered for inclusion in the context window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Unique ID of the memory record
    pub id: String,

    /// Category key (open set, e.g. "personal", "health")
    pub category: String,

    /// Textual content
    #[serde(default)]
    pub content: String,

    /// Opaque structured payload, passed through untouched
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,

    /// Externally supplied importance on a 0-100 scale
    #[serde(default)]
    pub importance: f64,

    /// When the remembered event happened
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub occurred_at: Option<DateTime<Utc>>,

    /// When the record was written
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    /// Per-item confidence (0-100). Overrides the call-level quality score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CandidateItem {
    /// Create a candidate with no payload, zero importance and no timestamps.
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            content: content.into(),
            payload: serde_json::Value::Null,
            importance: 0.0,
            occurred_at: None,
            created_at: None,
            confidence: None,
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    /// Set both `occurred_at` and `created_at`.
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.occurred_at = Some(when);
        self.created_at = Some(when);
        self
    }

    pub fn with_occurred_at(mut self, when: DateTime<Utc>) -> Self {
        self.occurred_at = Some(when);
        self
    }

    pub fn with_created_at(mut self, when: DateTime<Utc>) -> Self {
        self.created_at = Some(when);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// The timestamp recency is measured from: `occurred_at`, else `created_at`.
    pub fn reference_timestamp(&self) -> Option<DateTime<Utc>> {
        self.occurred_at.or(self.created_at)
    }
}

/// A candidate after scoring and classification, owned by one selection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// The original record.
    pub candidate: CandidateItem,
    /// Budget profile key the item was charged against.
    pub domain: String,
    /// Recency-decayed importance (0-100).
    pub relevance: f64,
    /// Confidence checked against the domain minimum (0-100).
    pub confidence: f64,
    /// Content length in Unicode scalar values.
    pub char_count: usize,
    /// Keyword tokens used for redundancy and topic checks.
    pub fingerprint: TopicFingerprint,
    /// Hex SHA-256 of the normalized token sequence.
    pub signature: String,
    /// Index of the candidate in the caller's input list.
    pub position: usize,
}

impl ContextItem {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }
}

/// Accept RFC 3339 strings or epoch milliseconds; anything else is `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}
