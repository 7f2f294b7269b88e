//! Category to budget-profile resolution.

use memwindow_config::{BudgetConfig, DomainBudget};
use tracing::debug;

/// The budget profile an item is counted against.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDomain {
    /// Key the item's usage is counted under.
    pub key: String,
    pub budget: DomainBudget,
    /// True when the category had no profile of its own.
    pub is_fallback: bool,
}

/// Resolve a category key to its budget profile.
///
/// Keys are trimmed and lower-cased before lookup. Unknown categories share
/// the fallback profile (and its counters). Never fails.
pub fn resolve_domain(config: &BudgetConfig, category: &str) -> ResolvedDomain {
    let normalized = category.trim().to_lowercase();

    if let Some(budget) = config.domains.get(&normalized) {
        return ResolvedDomain {
            key: normalized,
            budget: *budget,
            is_fallback: false,
        };
    }

    debug!(
        category = %category,
        fallback = %config.fallback_domain,
        "Unknown category, using fallback budget"
    );
    ResolvedDomain {
        key: config.fallback_domain.clone(),
        budget: config.fallback_budget(),
        is_fallback: true,
    }
}
