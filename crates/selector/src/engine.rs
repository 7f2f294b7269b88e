//! Thread-safe selection engine: active budget config plus session log.

use crate::metrics::compute_metrics;
use crate::selector::{normalize_quality, select};
use chrono::{DateTime, Utc};
use memwindow_config::{BudgetConfig, BudgetConfigPatch, ConfigError};
use memwindow_core::{CallMetadata, CandidateItem, SelectionResult};
use memwindow_telemetry::{SessionLog, TelemetryError};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info};

/// Per-call options for [`SelectionEngine::select_context`].
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    /// Caller's confidence in the memory set, 0-100. Defaults to 50.
    pub quality_score: Option<f64>,
    pub turn_id: Option<String>,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    /// Clock used for recency scoring. Defaults to now.
    pub reference_time: Option<DateTime<Utc>>,
}

impl SelectionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }

    pub fn for_turn(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = Some(turn_id.into());
        self
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Pin the reference time, making the selection reproducible.
    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.reference_time = Some(when);
        self
    }
}

/// Config and log share one lock so a config change and the log resize
/// that follows it are observed together.
#[derive(Debug)]
struct EngineState {
    config: Arc<BudgetConfig>,
    log: SessionLog,
}

impl EngineState {
    fn new(config: BudgetConfig) -> Self {
        let log = SessionLog::with_capacity(config.session_log_capacity);
        Self {
            config: Arc::new(config),
            log,
        }
    }

    fn install(&mut self, config: BudgetConfig) {
        self.log.set_capacity(config.session_log_capacity);
        self.config = Arc::new(config);
    }
}

/// The selection engine.
///
/// Thread-safe via `RwLock`. Selection itself runs on a config snapshot
/// without holding the lock; only appending to the session log takes the
/// write lock.
#[derive(Debug)]
pub struct SelectionEngine {
    state: RwLock<EngineState>,
}

impl SelectionEngine {
    /// Create an engine with a validated config.
    pub fn new(config: BudgetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: RwLock::new(EngineState::new(config)),
        })
    }

    /// Select which candidates go into the context window.
    ///
    /// Never fails: every candidate is either included or excluded with a
    /// reason. The result is appended to the session log.
    pub fn select_context(&self, items: &[CandidateItem], request: SelectionRequest) -> SelectionResult {
        let started = Instant::now();
        let config = Arc::clone(&self.read().config);
        let reference_time = request.reference_time.unwrap_or_else(Utc::now);
        let quality_score = normalize_quality(request.quality_score);

        let selection = select(items, quality_score, &config, reference_time);
        let fallbacks = selection.fallback_count;
        let mut metrics = compute_metrics(&selection.included, selection.excluded.len(), &config);
        metrics.processing_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        let result = SelectionResult {
            selection_id: uuid::Uuid::new_v4().to_string(),
            included: selection.included,
            excluded: selection.excluded,
            metrics,
            deterministic: true,
            timestamp: Utc::now(),
            metadata: CallMetadata {
                quality_score,
                turn_id: request.turn_id,
                user_id: request.user_id,
                tenant_id: request.tenant_id,
                reference_time,
            },
        };

        debug!(
            selection_id = %result.selection_id,
            candidates = items.len(),
            included = result.metrics.total_items,
            excluded = result.metrics.excluded_count,
            chars = result.metrics.total_chars,
            diversity = result.metrics.diversity_score,
            fallbacks,
            turn_id = result.metadata.turn_id.as_deref().unwrap_or("-"),
            user_id = result.metadata.user_id.as_deref().unwrap_or("-"),
            tenant_id = result.metadata.tenant_id.as_deref().unwrap_or("-"),
            elapsed_us = result.metrics.processing_time_us,
            "Context selected"
        );

        self.write().log.record(result.clone());
        result
    }

    /// A copy of the active config.
    pub fn config(&self) -> BudgetConfig {
        BudgetConfig::clone(&self.read().config)
    }

    /// Merge `patch` into the active config. On error the active config is
    /// unchanged.
    pub fn update_config(&self, patch: &BudgetConfigPatch) -> Result<BudgetConfig, ConfigError> {
        let mut state = self.write();
        let next = state.config.merged(patch)?;
        state.install(next.clone());
        info!(
            total_item_limit = next.total_item_limit,
            total_char_limit = next.total_char_limit,
            domains = next.domains.len(),
            "Budget config updated"
        );
        Ok(next)
    }

    /// Replace the active config wholesale.
    pub fn replace_config(&self, config: BudgetConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let domains = config.domains.len();
        self.write().install(config);
        info!(domains, "Budget config replaced");
        Ok(())
    }

    /// Restore the default config and clear the session log.
    pub fn reset(&self) {
        let mut state = self.write();
        state.install(BudgetConfig::default());
        state.log.clear();
        info!("Selection engine reset to defaults");
    }

    /// Up to `count` recent results, most recent first.
    pub fn logs(&self, count: usize) -> Vec<SelectionResult> {
        self.read().log.recent(count)
    }

    /// Recent results as pretty JSON, most recent first.
    pub fn export_logs_json(&self, count: usize) -> Result<String, TelemetryError> {
        self.read().log.export_json(count)
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self {
            state: RwLock::new(EngineState::new(BudgetConfig::default())),
        }
    }
}
