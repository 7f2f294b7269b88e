//! Selection outputs: exclusion records, metrics and the per-call result.

use crate::item::ContextItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Exclusions ────────────────────────────────────────────────────────────

/// Why a candidate was left out of the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Relevance below the domain's minimum.
    BelowRelevanceThreshold,
    /// Confidence below the domain's minimum.
    BelowConfidenceThreshold,
    /// Near-duplicate of an already-selected item.
    RedundantContent,
    /// A shared topic already reached the repetition limit.
    TopicSaturation,
    /// The domain's item cap is full.
    DomainItemCapExceeded,
    /// The item would overflow the domain's character cap.
    DomainCharCapExceeded,
    /// The global item limit is full.
    TotalItemLimitExceeded,
    /// The item would overflow the global character budget.
    TotalCharBudgetExceeded,
}

impl ExclusionReason {
    /// Every reason, in check order.
    pub const ALL: [ExclusionReason; 8] = [
        Self::BelowRelevanceThreshold,
        Self::BelowConfidenceThreshold,
        Self::RedundantContent,
        Self::TopicSaturation,
        Self::DomainItemCapExceeded,
        Self::DomainCharCapExceeded,
        Self::TotalItemLimitExceeded,
        Self::TotalCharBudgetExceeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelowRelevanceThreshold => "below_relevance_threshold",
            Self::BelowConfidenceThreshold => "below_confidence_threshold",
            Self::RedundantContent => "redundant_content",
            Self::TopicSaturation => "topic_saturation",
            Self::DomainItemCapExceeded => "domain_item_cap_exceeded",
            Self::DomainCharCapExceeded => "domain_char_cap_exceeded",
            Self::TotalItemLimitExceeded => "total_item_limit_exceeded",
            Self::TotalCharBudgetExceeded => "total_char_budget_exceeded",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One excluded candidate and the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub item_id: String,
    pub reason: ExclusionReason,
    /// Human-readable explanation for operators.
    pub explanation: String,
    /// The selected item this one duplicated (redundancy only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts_with: Option<String>,
}

impl ExclusionRecord {
    pub fn new(
        item_id: impl Into<String>,
        reason: ExclusionReason,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            reason,
            explanation: explanation.into(),
            conflicts_with: None,
        }
    }

    pub fn conflicting_with(mut self, other_id: impl Into<String>) -> Self {
        self.conflicts_with = Some(other_id.into());
        self
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────

/// Usage of a single domain's budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainUsage {
    pub items: usize,
    pub chars: usize,
}

/// Aggregate statistics of one selection. Recomputed every call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_chars: usize,
    pub total_items: usize,
    /// Usage keyed by budget domain.
    pub per_domain: BTreeMap<String, DomainUsage>,
    /// Topical spread of the included items (0.0-1.0).
    pub diversity_score: f64,
    /// Characters used / global character budget.
    pub budget_utilization: f64,
    /// Items used / global item limit.
    pub item_utilization: f64,
    pub excluded_count: usize,
    pub avg_relevance: f64,
    pub avg_confidence: f64,
    /// Wall-clock time spent selecting, in microseconds.
    pub processing_time_us: u64,
}

// ── Result ────────────────────────────────────────────────────────────────

/// Caller-supplied context of a selection call. Used for logging only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetadata {
    /// Effective call-level quality score (0-100).
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Clock value recency was measured against.
    pub reference_time: DateTime<Utc>,
}

/// The outcome of one context selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selection_id: String,
    /// Included items, highest priority first.
    pub included: Vec<ContextItem>,
    pub excluded: Vec<ExclusionRecord>,
    pub metrics: Metrics,
    /// Always `true`: identical input yields identical output.
    pub deterministic: bool,
    pub timestamp: DateTime<Utc>,
    pub metadata: CallMetadata,
}

impl SelectionResult {
    /// IDs of the included items in priority order.
    pub fn included_ids(&self) -> Vec<&str> {
        self.included.iter().map(|i| i.id()).collect()
    }

    pub fn is_included(&self, item_id: &str) -> bool {
        self.included.iter().any(|i| i.id() == item_id)
    }

    /// The exclusion record for an item, if it was excluded.
    pub fn exclusion_for(&self, item_id: &str) -> Option<&ExclusionRecord> {
        self.excluded.iter().find(|e| e.item_id == item_id)
    }
}
