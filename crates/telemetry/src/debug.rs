//! Human-readable rendering of selection results.
//!
//! Output is for operators reading logs; nothing parses it.

use memwindow_core::{ExclusionReason, ExclusionRecord, SelectionResult};
use std::collections::BTreeMap;

/// Count exclusions per reason. Reasons with no exclusions are omitted.
pub fn exclusion_summary(exclusions: &[ExclusionRecord]) -> BTreeMap<ExclusionReason, usize> {
    let mut summary = BTreeMap::new();
    for record in exclusions {
        *summary.entry(record.reason).or_insert(0) += 1;
    }
    summary
}

/// Render a selection as a multi-line trace.
pub fn format_selection_debug(result: &SelectionResult) -> String {
    let metrics = &result.metrics;
    let meta = &result.metadata;
    let mut out = String::new();

    out.push_str(&format!(
        "Context selection {} (turn: {}, user: {}, tenant: {})\n",
        result.selection_id,
        meta.turn_id.as_deref().unwrap_or("-"),
        meta.user_id.as_deref().unwrap_or("-"),
        meta.tenant_id.as_deref().unwrap_or("-"),
    ));
    out.push_str(&format!(
        "  included: {} items, {} chars ({:.1}% of char budget, {:.1}% of item limit)\n",
        metrics.total_items,
        metrics.total_chars,
        metrics.budget_utilization * 100.0,
        metrics.item_utilization * 100.0,
    ));
    out.push_str(&format!("  excluded: {} items\n", metrics.excluded_count));
    for (reason, count) in exclusion_summary(&result.excluded) {
        out.push_str(&format!("    {reason}: {count}\n"));
    }

    if !metrics.per_domain.is_empty() {
        out.push_str("  domains:\n");
        for (domain, usage) in &metrics.per_domain {
            out.push_str(&format!(
                "    {domain}: {} items, {} chars\n",
                usage.items, usage.chars
            ));
        }
    }

    out.push_str(&format!("  diversity: {:.2}\n", metrics.diversity_score));
    out.push_str(&format!(
        "  avg relevance: {:.2}, avg confidence: {:.2}, quality: {:.1}\n",
        metrics.avg_relevance, metrics.avg_confidence, meta.quality_score,
    ));
    out.push_str(&format!("  processing: {}us\n", metrics.processing_time_us));

    if !result.included.is_empty() {
        out.push_str("  included items:\n");
        for (rank, item) in result.included.iter().enumerate() {
            out.push_str(&format!(
                "    {}. [{}] {} (relevance {:.2}, {} chars)\n",
                rank + 1,
                item.domain,
                item.id(),
                item.relevance,
                item.char_count,
            ));
        }
    }

    if !result.excluded.is_empty() {
        out.push_str("  excluded items:\n");
        for record in &result.excluded {
            out.push_str(&format!(
                "    - {}: {} ({})\n",
                record.item_id, record.reason, record.explanation
            ));
        }
    }

    out
}
