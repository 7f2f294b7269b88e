//! Threshold filtering and greedy budget packing.
//!
//! Candidates are scored, filtered against their domain's minimum relevance
//! and confidence, stably sorted by relevance, then accepted one at a time.
//! Each candidate is checked in a fixed order and the first failing check
//! names its exclusion reason:
//!
//! 1. **Redundancy**: too similar to an accepted item
//! 2. **Topic saturation**: one of its topics is already at the limit
//! 3. **Domain item cap**
//! 4. **Domain char cap**
//! 5. **Global item cap**
//! 6. **Global char cap**
//!
//! # Determinism
//!
//! Output depends only on the candidates, the quality score, the config and
//! the reference time. Ties in relevance keep input order.

use crate::classifier::resolve_domain;
use crate::redundancy::RedundancyDetector;
use crate::scorer::score_item;
use chrono::{DateTime, Utc};
use memwindow_config::{BudgetConfig, DomainBudget};
use memwindow_core::{
    CandidateItem, ContextItem, DomainUsage, ExclusionReason, ExclusionRecord,
};
use std::collections::BTreeMap;

/// Quality score used when the caller supplies none (or a non-finite one).
pub const DEFAULT_QUALITY_SCORE: f64 = 50.0;

// ── Types ─────────────────────────────────────────────────────────────────

/// Outcome of one packing pass.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Accepted items, in acceptance order.
    pub included: Vec<ContextItem>,
    /// One record per rejected item, in decision order.
    pub excluded: Vec<ExclusionRecord>,
    /// Candidates whose category had no profile of its own.
    pub fallback_count: usize,
}

/// Greedy packing state for one call.
struct Packer<'c> {
    config: &'c BudgetConfig,
    detector: RedundancyDetector,
    included: Vec<ContextItem>,
    per_domain: BTreeMap<String, DomainUsage>,
    total_chars: usize,
}

// ── Public API ────────────────────────────────────────────────────────────

/// Clamp a caller-supplied quality score to 0-100, defaulting non-finite
/// values.
pub fn normalize_quality(score: Option<f64>) -> f64 {
    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 100.0),
        _ => DEFAULT_QUALITY_SCORE,
    }
}

/// Select candidates into a budgeted context window.
///
/// Every candidate ends up in exactly one of `included` or `excluded`.
pub fn select(
    items: &[CandidateItem],
    quality_score: f64,
    config: &BudgetConfig,
    now: DateTime<Utc>,
) -> Selection {
    let mut excluded = Vec::new();
    let mut fallback_count = 0;
    let mut survivors: Vec<(ContextItem, DomainBudget)> = Vec::with_capacity(items.len());

    for (position, candidate) in items.iter().enumerate() {
        let domain = resolve_domain(config, &candidate.category);
        if domain.is_fallback {
            fallback_count += 1;
        }
        let score = score_item(candidate, &config.scoring, now);
        let item = ContextItem {
            candidate: candidate.clone(),
            domain: domain.key,
            relevance: score.relevance,
            confidence: item_confidence(candidate.confidence, quality_score),
            char_count: score.char_count,
            fingerprint: score.fingerprint,
            signature: score.signature,
            position,
        };

        match threshold_exclusion(&item, &domain.budget) {
            Some(record) => excluded.push(record),
            None => survivors.push((item, domain.budget)),
        }
    }

    // Stable: equal relevance keeps input order.
    survivors.sort_by(|(a, _), (b, _)| b.relevance.total_cmp(&a.relevance));

    let mut packer = Packer::new(config);
    // No early exit: full caps still leave each candidate its first failing check.
    for (item, budget) in survivors {
        match packer.check(&item, &budget) {
            Ok(()) => packer.accept(item),
            Err(record) => excluded.push(record),
        }
    }

    Selection {
        included: packer.included,
        excluded,
        fallback_count,
    }
}

// ── Private helpers ───────────────────────────────────────────────────────

fn item_confidence(own: Option<f64>, quality_score: f64) -> f64 {
    match own {
        Some(c) if c.is_finite() => c.clamp(0.0, 100.0),
        _ => quality_score,
    }
}

fn threshold_exclusion(item: &ContextItem, budget: &DomainBudget) -> Option<ExclusionRecord> {
    if item.relevance < budget.min_relevance {
        return Some(ExclusionRecord::new(
            item.id(),
            ExclusionReason::BelowRelevanceThreshold,
            format!(
                "relevance {:.2} below minimum {:.2} for domain '{}'",
                item.relevance, budget.min_relevance, item.domain
            ),
        ));
    }
    if item.confidence < budget.min_confidence {
        return Some(ExclusionRecord::new(
            item.id(),
            ExclusionReason::BelowConfidenceThreshold,
            format!(
                "confidence {:.2} below minimum {:.2} for domain '{}'",
                item.confidence, budget.min_confidence, item.domain
            ),
        ));
    }
    None
}

impl<'c> Packer<'c> {
    fn new(config: &'c BudgetConfig) -> Self {
        Self {
            config,
            detector: RedundancyDetector::new(
                config.redundancy_threshold,
                config.topic_repetition_limit,
            ),
            included: Vec::new(),
            per_domain: BTreeMap::new(),
            total_chars: 0,
        }
    }

    fn items_exhausted(&self) -> bool {
        self.included.len() >= self.config.total_item_limit
    }

    fn check(&self, item: &ContextItem, budget: &DomainBudget) -> Result<(), ExclusionRecord> {
        if let Some((prior, similarity)) = self.detector.find_redundant(item, &self.included) {
            return Err(ExclusionRecord::new(
                item.id(),
                ExclusionReason::RedundantContent,
                format!(
                    "{:.0}% token overlap with already-selected item '{}'",
                    similarity * 100.0,
                    prior.id()
                ),
            )
            .conflicting_with(prior.id()));
        }

        if let Some((topic, count)) = self.detector.saturated_topic(&item.fingerprint) {
            return Err(ExclusionRecord::new(
                item.id(),
                ExclusionReason::TopicSaturation,
                format!(
                    "topic '{}' already appears in {} selected items (limit {})",
                    topic,
                    count,
                    self.detector.topic_limit()
                ),
            ));
        }

        let used = self.per_domain.get(&item.domain).copied().unwrap_or_default();
        if used.items >= budget.max_items {
            return Err(ExclusionRecord::new(
                item.id(),
                ExclusionReason::DomainItemCapExceeded,
                format!(
                    "domain '{}' already holds {} of {} items",
                    item.domain, used.items, budget.max_items
                ),
            ));
        }
        if used.chars + item.char_count > budget.max_chars {
            return Err(ExclusionRecord::new(
                item.id(),
                ExclusionReason::DomainCharCapExceeded,
                format!(
                    "{} chars would exceed domain '{}' budget ({} of {} used)",
                    item.char_count, item.domain, used.chars, budget.max_chars
                ),
            ));
        }

        if self.items_exhausted() {
            return Err(ExclusionRecord::new(
                item.id(),
                ExclusionReason::TotalItemLimitExceeded,
                format!("global item limit of {} reached", self.config.total_item_limit),
            ));
        }
        if self.total_chars + item.char_count > self.config.total_char_limit {
            return Err(ExclusionRecord::new(
                item.id(),
                ExclusionReason::TotalCharBudgetExceeded,
                format!(
                    "{} chars would exceed global budget ({} of {} used)",
                    item.char_count, self.total_chars, self.config.total_char_limit
                ),
            ));
        }

        Ok(())
    }

    fn accept(&mut self, item: ContextItem) {
        self.detector.record(&item.fingerprint);
        let usage = self.per_domain.entry(item.domain.clone()).or_default();
        usage.items += 1;
        usage.chars += item.char_count;
        self.total_chars += item.char_count;
        self.included.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    // ── Helpers ────────────────────────────────────────────────────────

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    fn candidate(id: &str, category: &str, content: &str, importance: f64) -> CandidateItem {
        CandidateItem::new(id, category, content)
            .with_importance(importance)
            .at(now())
    }

    fn ids(items: &[ContextItem]) -> Vec<&str> {
        items.iter().map(ContextItem::id).collect()
    }

    fn reason_of(selection: &Selection, id: &str) -> ExclusionReason {
        selection
            .excluded
            .iter()
            .find(|r| r.item_id == id)
            .map(|r| r.reason)
            .unwrap_or_else(|| panic!("{id} was not excluded"))
    }

    // ── Tests ─────────────────────────────────────────────────────────

    #[test]
    fn empty_input_selects_nothing() {
        let selection = select(&[], 50.0, &BudgetConfig::default(), now());
        assert!(selection.included.is_empty());
        assert!(selection.excluded.is_empty());
    }

    #[test]
    fn sorted_by_relevance_ties_keep_input_order() {
        let items = vec![
            candidate("low", "personal", "lives near harbour", 40.0),
            candidate("tie_a", "personal", "speaks fluent portuguese", 70.0),
            candidate("high", "personal", "birthday falls march", 90.0),
            candidate("tie_b", "personal", "owns vintage bicycle", 70.0),
        ];
        let selection = select(&items, 50.0, &BudgetConfig::default(), now());
        assert_eq!(ids(&selection.included), vec!["high", "tie_a", "tie_b", "low"]);
        assert_eq!(selection.included[1].position, 1);
    }

    #[test]
    fn relevance_threshold_checked_before_confidence() {
        let items = vec![
            candidate("weak", "health", "sprained ankle", 10.0),
            candidate("unsure", "health", "possibly lactose intolerant", 90.0).with_confidence(20.0),
            candidate("ok", "health", "takes vitamin supplements", 90.0),
        ];
        let selection = select(&items, 60.0, &BudgetConfig::default(), now());
        assert_eq!(ids(&selection.included), vec!["ok"]);
        assert_eq!(reason_of(&selection, "weak"), ExclusionReason::BelowRelevanceThreshold);
        assert_eq!(reason_of(&selection, "unsure"), ExclusionReason::BelowConfidenceThreshold);
        assert_eq!(
            selection.excluded[0].explanation,
            "relevance 10.00 below minimum 30.00 for domain 'health'"
        );
    }

    #[test]
    fn call_quality_applies_without_item_confidence() {
        let items = vec![candidate("m1", "health", "runs marathons", 90.0)];
        let low = select(&items, 40.0, &BudgetConfig::default(), now());
        assert_eq!(reason_of(&low, "m1"), ExclusionReason::BelowConfidenceThreshold);

        let high = select(&items, 80.0, &BudgetConfig::default(), now());
        assert_eq!(ids(&high.included), vec!["m1"]);
        assert_eq!(high.included[0].confidence, 80.0);
    }

    #[test]
    fn stale_items_fall_below_threshold() {
        let old = CandidateItem::new("old", "tasks", "renew passport")
            .with_importance(60.0)
            .at(now() - Duration::days(400));
        let undated = CandidateItem::new("undated", "tasks", "file taxes").with_importance(60.0);
        let selection = select(&[old, undated], 50.0, &BudgetConfig::default(), now());
        assert!(selection.included.is_empty());
        assert_eq!(reason_of(&selection, "old"), ExclusionReason::BelowRelevanceThreshold);
        assert_eq!(reason_of(&selection, "undated"), ExclusionReason::BelowRelevanceThreshold);
    }

    #[test]
    fn redundancy_names_conflicting_item() {
        let items = vec![
            candidate("second", "preferences", "prefers oat milk coffee", 60.0),
            candidate("first", "preferences", "Prefers oat-milk coffee!", 85.0),
        ];
        let selection = select(&items, 50.0, &BudgetConfig::default(), now());
        assert_eq!(ids(&selection.included), vec!["first"]);
        let record = &selection.excluded[0];
        assert_eq!(record.reason, ExclusionReason::RedundantContent);
        assert_eq!(record.conflicts_with.as_deref(), Some("first"));
        assert!(record.explanation.contains("100% token overlap"));
    }

    #[test]
    fn redundancy_wins_over_domain_cap() {
        let mut config = BudgetConfig::default();
        config.domains.get_mut("goals").unwrap().max_items = 1;
        let items = vec![
            candidate("g1", "goals", "learn japanese", 90.0),
            candidate("g2", "goals", "learn japanese", 80.0),
            candidate("g3", "goals", "climb kilimanjaro", 70.0),
        ];
        let selection = select(&items, 50.0, &config, now());
        assert_eq!(reason_of(&selection, "g2"), ExclusionReason::RedundantContent);
        assert_eq!(reason_of(&selection, "g3"), ExclusionReason::DomainItemCapExceeded);
    }

    #[test]
    fn unknown_categories_share_fallback_counters() {
        let mut config = BudgetConfig::default();
        config.domains.get_mut("general").unwrap().max_items = 2;
        let items = vec![
            candidate("a", "hobbies", "knits scarves", 90.0),
            candidate("b", "travel", "visited iceland", 80.0),
            candidate("c", "general", "drives hybrid", 70.0),
        ];
        let selection = select(&items, 50.0, &config, now());
        assert_eq!(ids(&selection.included), vec!["a", "b"]);
        assert_eq!(selection.included[0].domain, "general");
        assert_eq!(reason_of(&selection, "c"), ExclusionReason::DomainItemCapExceeded);
        // "general" has its own profile; only the first two fell back.
        assert_eq!(selection.fallback_count, 2);
    }

    #[test]
    fn domain_char_cap_skips_to_smaller_items() {
        let mut config = BudgetConfig::default();
        config.domains.get_mut("tasks").unwrap().max_chars = 30;
        let items = vec![
            candidate("big", "tasks", "schedule dentist appointment tuesday", 90.0),
            candidate("small", "tasks", "buy stamps", 80.0),
        ];
        let selection = select(&items, 50.0, &config, now());
        assert_eq!(ids(&selection.included), vec!["small"]);
        let record = &selection.excluded[0];
        assert_eq!(record.reason, ExclusionReason::DomainCharCapExceeded);
        assert_eq!(
            record.explanation,
            "36 chars would exceed domain 'tasks' budget (0 of 30 used)"
        );
    }

    #[test]
    fn global_char_budget_enforced() {
        let mut config = BudgetConfig::default();
        config.total_char_limit = 25;
        let items = vec![
            candidate("a", "personal", "grew up in lisbon", 90.0),
            candidate("b", "goals", "run half marathon", 80.0),
            candidate("c", "tasks", "call mom", 70.0),
        ];
        let selection = select(&items, 50.0, &config, now());
        assert_eq!(ids(&selection.included), vec!["a", "c"]);
        assert_eq!(reason_of(&selection, "b"), ExclusionReason::TotalCharBudgetExceeded);
    }

    #[test]
    fn full_item_limit_still_reports_redundancy_first() {
        let mut config = BudgetConfig::default();
        config.total_item_limit = 1;
        let items = vec![
            candidate("a", "personal", "collects vinyl records", 90.0),
            candidate("b", "personal", "collects vinyl records", 80.0),
            candidate("c", "health", "x", 5.0),
            candidate("d", "goals", "learn welsh", 70.0),
        ];
        let selection = select(&items, 50.0, &config, now());
        assert_eq!(ids(&selection.included), vec!["a"]);
        // "c" fails the threshold filter before packing starts.
        assert_eq!(reason_of(&selection, "c"), ExclusionReason::BelowRelevanceThreshold);
        assert_eq!(reason_of(&selection, "b"), ExclusionReason::RedundantContent);
        assert_eq!(selection.excluded[1].conflicts_with.as_deref(), Some("a"));
        assert_eq!(reason_of(&selection, "d"), ExclusionReason::TotalItemLimitExceeded);
        assert_eq!(
            selection.excluded.iter().map(|r| r.item_id.as_str()).collect::<Vec<_>>(),
            vec!["c", "b", "d"]
        );
    }

    struct PrecedenceCase {
        name: &'static str,
        configure: fn(&mut BudgetConfig),
        /// (category, content) for the accepted item, then the rejected one.
        accepted: (&'static str, &'static str),
        rejected: (&'static str, &'static str),
        expected: ExclusionReason,
    }

    #[test]
    fn higher_priority_check_decides_reason() {
        let cases = [
            PrecedenceCase {
                name: "redundancy before topic saturation",
                configure: |c| c.topic_repetition_limit = 1,
                accepted: ("goals", "learn japanese"),
                rejected: ("goals", "learn japanese"),
                expected: ExclusionReason::RedundantContent,
            },
            PrecedenceCase {
                name: "redundancy before global item cap",
                configure: |c| c.total_item_limit = 1,
                accepted: ("personal", "collects vinyl records"),
                rejected: ("personal", "collects vinyl records"),
                expected: ExclusionReason::RedundantContent,
            },
            PrecedenceCase {
                name: "topic saturation before domain item cap",
                configure: |c| {
                    c.topic_repetition_limit = 1;
                    c.domains.get_mut("goals").unwrap().max_items = 1;
                },
                accepted: ("goals", "coffee beans"),
                rejected: ("goals", "coffee grinder"),
                expected: ExclusionReason::TopicSaturation,
            },
            PrecedenceCase {
                name: "topic saturation before global item cap",
                configure: |c| {
                    c.topic_repetition_limit = 1;
                    c.total_item_limit = 1;
                },
                accepted: ("goals", "coffee beans"),
                rejected: ("tasks", "coffee grinder"),
                expected: ExclusionReason::TopicSaturation,
            },
            PrecedenceCase {
                name: "domain item cap before global item cap",
                configure: |c| {
                    c.domains.get_mut("goals").unwrap().max_items = 1;
                    c.total_item_limit = 1;
                },
                accepted: ("goals", "learn japanese"),
                rejected: ("goals", "climb kilimanjaro"),
                expected: ExclusionReason::DomainItemCapExceeded,
            },
            PrecedenceCase {
                name: "domain char cap before global char cap",
                configure: |c| {
                    c.domains.get_mut("tasks").unwrap().max_chars = 20;
                    c.total_char_limit = 20;
                },
                accepted: ("tasks", "buy stamps"),
                rejected: ("tasks", "schedule dentist visit"),
                expected: ExclusionReason::DomainCharCapExceeded,
            },
            PrecedenceCase {
                name: "global item cap before global char cap",
                configure: |c| {
                    c.total_item_limit = 1;
                    c.total_char_limit = 15;
                },
                accepted: ("personal", "buy stamps"),
                rejected: ("goals", "renew library card"),
                expected: ExclusionReason::TotalItemLimitExceeded,
            },
        ];

        for case in cases {
            let mut config = BudgetConfig::default();
            (case.configure)(&mut config);
            let items = vec![
                candidate("first", case.accepted.0, case.accepted.1, 90.0),
                candidate("second", case.rejected.0, case.rejected.1, 80.0),
            ];
            let selection = select(&items, 50.0, &config, now());
            assert_eq!(ids(&selection.included), vec!["first"], "{}", case.name);
            assert_eq!(reason_of(&selection, "second"), case.expected, "{}", case.name);
        }
    }

    #[test]
    fn zero_item_limit_excludes_everything() {
        let mut config = BudgetConfig::default();
        config.total_item_limit = 0;
        let items = vec![candidate("a", "personal", "likes jazz", 90.0)];
        let selection = select(&items, 50.0, &config, now());
        assert!(selection.included.is_empty());
        assert_eq!(reason_of(&selection, "a"), ExclusionReason::TotalItemLimitExceeded);
    }

    #[test]
    fn quality_normalization() {
        assert_eq!(normalize_quality(None), DEFAULT_QUALITY_SCORE);
        assert_eq!(normalize_quality(Some(f64::NAN)), DEFAULT_QUALITY_SCORE);
        assert_eq!(normalize_quality(Some(140.0)), 100.0);
        assert_eq!(normalize_quality(Some(-3.0)), 0.0);
        assert_eq!(normalize_quality(Some(72.5)), 72.5);
    }

    #[test]
    fn item_confidence_is_clamped_or_falls_back() {
        assert_eq!(item_confidence(Some(120.0), 50.0), 100.0);
        assert_eq!(item_confidence(Some(f64::INFINITY), 65.0), 65.0);
        assert_eq!(item_confidence(None, 65.0), 65.0);
    }
}
