//! Usage, utilization and diversity of a selection.

use memwindow_config::BudgetConfig;
use memwindow_core::{ContextItem, Metrics, TopicFingerprint};
use std::collections::BTreeSet;

/// Summarize `included` against the budgets in `config`.
///
/// `processing_time_us` is left at 0; the engine fills it in.
pub fn compute_metrics(included: &[ContextItem], excluded_count: usize, config: &BudgetConfig) -> Metrics {
    let mut metrics = Metrics {
        excluded_count,
        ..Metrics::default()
    };

    for item in included {
        let usage = metrics.per_domain.entry(item.domain.clone()).or_default();
        usage.items += 1;
        usage.chars += item.char_count;
        metrics.total_chars += item.char_count;
    }
    metrics.total_items = included.len();
    metrics.diversity_score = diversity_score(included);
    metrics.budget_utilization = ratio(metrics.total_chars, config.total_char_limit);
    metrics.item_utilization = ratio(metrics.total_items, config.total_item_limit);

    if !included.is_empty() {
        let n = included.len() as f64;
        metrics.avg_relevance = included.iter().map(|i| i.relevance).sum::<f64>() / n;
        metrics.avg_confidence = included.iter().map(|i| i.confidence).sum::<f64>() / n;
    }

    metrics
}

/// Share of distinct topics across the selection, in `[0, 1]`.
///
/// 1.0 means no two items share a token. When no item has any tokens the
/// score falls back to distinct domains per item.
pub fn diversity_score(included: &[ContextItem]) -> f64 {
    if included.is_empty() {
        return 0.0;
    }

    let total: usize = included.iter().map(|i| i.fingerprint.len()).sum();
    let score = if total == 0 {
        let domains: BTreeSet<&str> = included.iter().map(|i| i.domain.as_str()).collect();
        domains.len() as f64 / included.len() as f64
    } else {
        distinct_topics(included.iter().map(|i| &i.fingerprint)) as f64 / total as f64
    };
    score.clamp(0.0, 1.0)
}

fn ratio(used: usize, limit: usize) -> f64 {
    if limit == 0 {
        0.0
    } else {
        used as f64 / limit as f64
    }
}

/// Count of distinct topics across `fingerprints`.
pub fn distinct_topics<'a>(fingerprints: impl IntoIterator<Item = &'a TopicFingerprint>) -> usize {
    fingerprints
        .into_iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .len()
}
