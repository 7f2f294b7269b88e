//! Budget configuration loading, validation, and management for memwindow.
//!
//! Loads configuration from `~/.memwindow/config.toml` with environment
//! variable overrides. Every change goes through [`BudgetConfig::validate`]
//! so an invalid budget is rejected at the boundary instead of being
//! clamped into an inconsistent state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root budget configuration.
///
/// Maps directly to `~/.memwindow/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Maximum number of items in one context window
    #[serde(default = "default_total_item_limit")]
    pub total_item_limit: usize,

    /// Maximum total characters in one context window
    #[serde(default = "default_total_char_limit")]
    pub total_char_limit: usize,

    /// Maximum accepted items sharing any one topic token
    #[serde(default = "default_topic_repetition_limit")]
    pub topic_repetition_limit: usize,

    /// Jaccard similarity at or above which an item counts as redundant
    #[serde(default = "default_redundancy_threshold")]
    pub redundancy_threshold: f64,

    /// Number of selection results kept in the session log
    #[serde(default = "default_session_log_capacity")]
    pub session_log_capacity: usize,

    /// Domain used for categories with no profile of their own
    #[serde(default = "default_fallback_domain")]
    pub fallback_domain: String,

    /// Recency scoring parameters
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Per-category budget profiles (keys are lower-case)
    #[serde(default = "default_domains")]
    pub domains: BTreeMap<String, DomainBudget>,
}

fn default_total_item_limit() -> usize {
    50
}
fn default_total_char_limit() -> usize {
    12_000
}
fn default_topic_repetition_limit() -> usize {
    5
}
fn default_redundancy_threshold() -> f64 {
    0.8
}
fn default_session_log_capacity() -> usize {
    100
}
fn default_fallback_domain() -> String {
    "general".into()
}

/// Budget profile for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainBudget {
    /// Maximum items from this domain
    pub max_items: usize,

    /// Maximum total characters from this domain
    pub max_chars: usize,

    /// Minimum relevance score (0-100) to qualify
    #[serde(default)]
    pub min_relevance: f64,

    /// Minimum confidence score (0-100) to qualify
    #[serde(default)]
    pub min_confidence: f64,
}

impl DomainBudget {
    pub const fn new(max_items: usize, max_chars: usize, min_relevance: f64, min_confidence: f64) -> Self {
        Self {
            max_items,
            max_chars,
            min_relevance,
            min_confidence,
        }
    }

    /// Profile used when even the configured fallback domain is missing.
    pub const UNSTRUCTURED: DomainBudget = DomainBudget::new(10, 3000, 10.0, 20.0);
}

fn default_domains() -> BTreeMap<String, DomainBudget> {
    [
        ("personal", DomainBudget::new(10, 3000, 20.0, 30.0)),
        ("health", DomainBudget::new(8, 2500, 30.0, 50.0)),
        ("relationships", DomainBudget::new(8, 2500, 20.0, 30.0)),
        ("preferences", DomainBudget::new(10, 2000, 15.0, 30.0)),
        ("goals", DomainBudget::new(6, 2000, 20.0, 30.0)),
        ("tasks", DomainBudget::new(8, 2500, 25.0, 30.0)),
        ("conversation", DomainBudget::new(10, 3000, 10.0, 20.0)),
        ("general", DomainBudget::UNSTRUCTURED),
    ]
    .into_iter()
    .map(|(key, budget)| (key.to_string(), budget))
    .collect()
}

/// Recency decay parameters for relevance scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Age (days) up to which an item counts as fresh
    #[serde(default = "default_recency_horizon_days")]
    pub recency_horizon_days: f64,

    /// Half-life (days) of the decay applied past the horizon
    #[serde(default = "default_decay_half_life_days")]
    pub decay_half_life_days: f64,

    /// Fraction of the score lost linearly across the horizon (0.0-1.0, exclusive)
    #[serde(default = "default_in_horizon_decay")]
    pub in_horizon_decay: f64,
}

fn default_recency_horizon_days() -> f64 {
    7.0
}
fn default_decay_half_life_days() -> f64 {
    30.0
}
fn default_in_horizon_decay() -> f64 {
    0.05
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recency_horizon_days: default_recency_horizon_days(),
            decay_half_life_days: default_decay_half_life_days(),
            in_horizon_decay: default_in_horizon_decay(),
        }
    }
}

// ── Partial updates ───────────────────────────────────────────────────────

/// A partial configuration change. `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_item_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_char_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_repetition_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_log_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring: Option<ScoringConfig>,
    /// Per-domain changes. Unknown keys add a new domain.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domains: BTreeMap<String, DomainBudgetPatch>,
}

/// A partial change to one domain profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainBudgetPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl DomainBudgetPatch {
    fn apply_to(&self, base: DomainBudget) -> DomainBudget {
        DomainBudget {
            max_items: self.max_items.unwrap_or(base.max_items),
            max_chars: self.max_chars.unwrap_or(base.max_chars),
            min_relevance: self.min_relevance.unwrap_or(base.min_relevance),
            min_confidence: self.min_confidence.unwrap_or(base.min_confidence),
        }
    }
}

// ── Loading & validation ──────────────────────────────────────────────────

impl BudgetConfig {
    /// Load configuration from the default path (~/.memwindow/config.toml).
    ///
    /// Environment variables override file values:
    /// - `MEMWINDOW_TOTAL_ITEM_LIMIT`
    /// - `MEMWINDOW_TOTAL_CHAR_LIMIT`
    /// - `MEMWINDOW_TOPIC_REPETITION_LIMIT`
    /// - `MEMWINDOW_REDUNDANCY_THRESHOLD`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let config = Self::load_from(&config_path)?;
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::info!(
            domains = config.domains.len(),
            "Loaded budget config from {}",
            path.display()
        );
        Ok(config)
    }

    /// Apply overrides from an environment lookup, then re-validate.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, "MEMWINDOW_TOTAL_ITEM_LIMIT")? {
            self.total_item_limit = v;
        }
        if let Some(v) = parse_override(&lookup, "MEMWINDOW_TOTAL_CHAR_LIMIT")? {
            self.total_char_limit = v;
        }
        if let Some(v) = parse_override(&lookup, "MEMWINDOW_TOPIC_REPETITION_LIMIT")? {
            self.topic_repetition_limit = v;
        }
        if let Some(v) = parse_override(&lookup, "MEMWINDOW_REDUNDANCY_THRESHOLD")? {
            self.redundancy_threshold = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".memwindow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.redundancy_threshold > 0.0 && self.redundancy_threshold <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "redundancy_threshold must be in (0.0, 1.0], got {}",
                self.redundancy_threshold
            )));
        }

        if self.session_log_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "session_log_capacity must be at least 1".into(),
            ));
        }

        let scoring = &self.scoring;
        if !(scoring.recency_horizon_days.is_finite() && scoring.recency_horizon_days > 0.0) {
            return Err(ConfigError::ValidationError(
                "scoring.recency_horizon_days must be > 0".into(),
            ));
        }
        if !(scoring.decay_half_life_days.is_finite() && scoring.decay_half_life_days > 0.0) {
            return Err(ConfigError::ValidationError(
                "scoring.decay_half_life_days must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&scoring.in_horizon_decay) {
            return Err(ConfigError::ValidationError(
                "scoring.in_horizon_decay must be in [0.0, 1.0)".into(),
            ));
        }

        for (key, budget) in &self.domains {
            if key.is_empty() || key.trim() != key || key.to_lowercase() != *key {
                return Err(ConfigError::ValidationError(format!(
                    "domain key '{key}' must be non-empty, trimmed and lower-case"
                )));
            }
            check_percent(key, "min_relevance", budget.min_relevance)?;
            check_percent(key, "min_confidence", budget.min_confidence)?;
        }

        if !self.domains.contains_key(&self.fallback_domain) {
            return Err(ConfigError::ValidationError(format!(
                "fallback_domain '{}' has no entry in domains",
                self.fallback_domain
            )));
        }

        Ok(())
    }

    /// Return a copy with `patch` applied. The current config is untouched.
    ///
    /// New domains start from the fallback profile before the patch applies.
    pub fn merged(&self, patch: &BudgetConfigPatch) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(v) = patch.total_item_limit {
            next.total_item_limit = v;
        }
        if let Some(v) = patch.total_char_limit {
            next.total_char_limit = v;
        }
        if let Some(v) = patch.topic_repetition_limit {
            next.topic_repetition_limit = v;
        }
        if let Some(v) = patch.redundancy_threshold {
            next.redundancy_threshold = v;
        }
        if let Some(v) = patch.session_log_capacity {
            next.session_log_capacity = v;
        }
        if let Some(v) = &patch.fallback_domain {
            next.fallback_domain = v.clone();
        }
        if let Some(v) = patch.scoring {
            next.scoring = v;
        }

        let template = next.fallback_budget();
        for (key, domain_patch) in &patch.domains {
            let base = next.domains.get(key).copied().unwrap_or(template);
            next.domains.insert(key.clone(), domain_patch.apply_to(base));
        }

        next.validate()?;
        Ok(next)
    }

    /// The fallback profile, or [`DomainBudget::UNSTRUCTURED`] if it is missing.
    pub fn fallback_budget(&self) -> DomainBudget {
        self.domains
            .get(&self.fallback_domain)
            .copied()
            .unwrap_or(DomainBudget::UNSTRUCTURED)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_item_limit: default_total_item_limit(),
            total_char_limit: default_total_char_limit(),
            topic_repetition_limit: default_topic_repetition_limit(),
            redundancy_threshold: default_redundancy_threshold(),
            session_log_capacity: default_session_log_capacity(),
            fallback_domain: default_fallback_domain(),
            scoring: ScoringConfig::default(),
            domains: default_domains(),
        }
    }
}

fn check_percent(domain: &str, field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "domains.{domain}.{field} must be between 0 and 100, got {value}"
        )))
    }
}

fn parse_override<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse() {
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(ConfigError::InvalidOverride {
            var: var.to_string(),
            value: raw,
        }),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value {value:?} for {var}")]
    InvalidOverride { var: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
