//! The process-wide engine behind the free functions.
//!
//! Tests share one global, so each takes `GLOBAL_LOCK` and resets first.

use chrono::Utc;
use memwindow_selector::{
    BudgetConfig, BudgetConfigPatch, CandidateItem, ExclusionReason, SelectionRequest, get_config,
    get_exclusion_summary, get_logs, global, replace_config, reset_instance, select_context,
    update_config,
};
use std::sync::{Mutex, MutexGuard};

static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

fn exclusive() -> MutexGuard<'static, ()> {
    let guard = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset_instance();
    guard
}

fn items() -> Vec<CandidateItem> {
    let now = Utc::now();
    vec![
        CandidateItem::new("a", "goals", "Learn to play cello")
            .with_importance(90.0)
            .at(now),
        CandidateItem::new("b", "goals", "Visit Kyoto in autumn")
            .with_importance(70.0)
            .at(now),
        CandidateItem::new("c", "goals", "Learn to play cello")
            .with_importance(60.0)
            .at(now),
    ]
}

#[test]
fn free_functions_share_one_engine() {
    let _guard = exclusive();
    let result = select_context(&items(), SelectionRequest::new().for_user("u1"));
    assert_eq!(result.included_ids(), vec!["a", "b"]);

    let logs = get_logs(5);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].selection_id, result.selection_id);
    assert_eq!(global().logs(5)[0].selection_id, result.selection_id);

    let summary = get_exclusion_summary(&result.excluded);
    assert_eq!(summary.get(&ExclusionReason::RedundantContent), Some(&1));
}

#[test]
fn update_and_reset_global_config() {
    let _guard = exclusive();
    let patch = BudgetConfigPatch {
        total_item_limit: Some(1),
        ..Default::default()
    };
    let updated = update_config(&patch).unwrap();
    assert_eq!(updated.total_item_limit, 1);
    assert_eq!(get_config().total_item_limit, 1);

    let result = select_context(&items(), SelectionRequest::new());
    assert_eq!(result.included_ids(), vec!["a"]);

    reset_instance();
    assert_eq!(get_config(), BudgetConfig::default());
    assert!(get_logs(10).is_empty());
}

#[test]
fn invalid_replacement_is_rejected() {
    let _guard = exclusive();
    let mut config = BudgetConfig::default();
    config.domains.get_mut("goals").unwrap().min_relevance = 140.0;
    assert!(replace_config(config).is_err());
    assert_eq!(get_config(), BudgetConfig::default());

    let mut config = BudgetConfig::default();
    config.total_char_limit = 10;
    replace_config(config).unwrap();
    let result = select_context(&items(), SelectionRequest::new());
    assert!(result.included.is_empty());
    assert_eq!(
        result.exclusion_for("a").map(|r| r.reason),
        Some(ExclusionReason::TotalCharBudgetExceeded)
    );
}
