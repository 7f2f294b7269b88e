//! Deterministic, budget-aware selection of memory items for a language
//! model's context window.
//!
//! Candidates are scored by importance and recency, filtered by per-domain
//! thresholds, then greedily packed under per-domain and global item and
//! character budgets. Near-duplicates and over-repeated topics are skipped.
//! Every candidate is either included or excluded with a reason.
//!
//! [`SelectionEngine`] owns the active config and a session log. The free
//! functions in this module operate on one process-wide engine; callers
//! that need isolation construct their own.

pub mod classifier;
pub mod engine;
pub mod metrics;
pub mod redundancy;
pub mod scorer;
pub mod selector;

pub use classifier::{ResolvedDomain, resolve_domain};
pub use engine::{SelectionEngine, SelectionRequest};
pub use metrics::{compute_metrics, diversity_score};
pub use redundancy::{RedundancyDetector, jaccard};
pub use scorer::{ItemScore, fingerprint, score_item, tokenize};
pub use selector::{DEFAULT_QUALITY_SCORE, Selection, select};

pub use memwindow_config::{BudgetConfig, BudgetConfigPatch, ConfigError, DomainBudget};
pub use memwindow_core::{
    CandidateItem, ContextItem, ExclusionReason, ExclusionRecord, Metrics, SelectionResult,
};

use std::collections::BTreeMap;
use std::sync::OnceLock;

static GLOBAL_ENGINE: OnceLock<SelectionEngine> = OnceLock::new();

/// The process-wide engine, created with default config on first use.
pub fn global() -> &'static SelectionEngine {
    GLOBAL_ENGINE.get_or_init(SelectionEngine::default)
}

/// Select context on the process-wide engine.
pub fn select_context(items: &[CandidateItem], request: SelectionRequest) -> SelectionResult {
    global().select_context(items, request)
}

pub fn get_config() -> BudgetConfig {
    global().config()
}

pub fn update_config(patch: &BudgetConfigPatch) -> Result<BudgetConfig, ConfigError> {
    global().update_config(patch)
}

pub fn replace_config(config: BudgetConfig) -> Result<(), ConfigError> {
    global().replace_config(config)
}

/// Restore defaults and clear the log of the process-wide engine.
pub fn reset_instance() {
    global().reset();
}

/// Up to `count` recent results, most recent first.
pub fn get_logs(count: usize) -> Vec<SelectionResult> {
    global().logs(count)
}

/// Count exclusions per reason.
pub fn get_exclusion_summary(exclusions: &[ExclusionRecord]) -> BTreeMap<ExclusionReason, usize> {
    memwindow_telemetry::exclusion_summary(exclusions)
}

/// Render a selection result as a multi-line trace for logs.
pub fn format_selection_debug(result: &SelectionResult) -> String {
    memwindow_telemetry::format_selection_debug(result)
}
