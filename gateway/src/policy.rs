//! Retry policies per model category
//!
//! The builtin rows are tuned to how long each kind of hosted model takes to
//! come out of a cold start. Config may replace individual rows; the table is
//! immutable once built.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::ModelCategory;
use crate::config::error::{ConfigError, Result};

/// Retry budget for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Backoff before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound for computed backoff
    pub max_delay_ms: u64,
    /// Wall-clock budget for all attempts of one invocation
    pub total_timeout_ms: u64,
}

impl RetryPolicy {
    pub const fn new(
        max_retries: u32,
        initial_delay_ms: u64,
        max_delay_ms: u64,
        total_timeout_ms: u64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            max_delay_ms,
            total_timeout_ms,
        }
    }

    /// Policy for categories without a dedicated row
    pub const DEFAULT: RetryPolicy = RetryPolicy::new(5, 8_000, 30_000, 120_000);

    /// Builtin row for a category. Pure and total.
    pub const fn builtin(category: ModelCategory) -> Self {
        match category {
            ModelCategory::Image => RetryPolicy::new(8, 10_000, 60_000, 300_000),
            ModelCategory::Audio => RetryPolicy::new(6, 10_000, 45_000, 180_000),
            ModelCategory::Text => RetryPolicy::new(5, 8_000, 30_000, 120_000),
            ModelCategory::Vision => RetryPolicy::new(5, 5_000, 30_000, 120_000),
            ModelCategory::Multimodal => RetryPolicy::new(5, 8_000, 45_000, 180_000),
            ModelCategory::Video => RetryPolicy::new(10, 15_000, 120_000, 600_000),
            ModelCategory::Unknown => RetryPolicy::DEFAULT,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }

    /// Upper bound on transport calls for one invocation
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check the structural constraints every policy must satisfy
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "initial_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "max_delay_ms ({}) must be >= initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        if self.total_timeout_ms <= self.initial_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "total_timeout_ms ({}) must be > initial_delay_ms ({})",
                self.total_timeout_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::DEFAULT
    }
}

/// Partial policy from configuration.
///
/// Unset fields keep the value of the row being overridden, so a single
/// `MODELGATE_POLICIES__TEXT__MAX_RETRIES=2` only touches `max_retries`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_timeout_ms: Option<u64>,
}

impl PolicyOverride {
    /// Merge the set fields onto `base`
    pub fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            initial_delay_ms: self.initial_delay_ms.unwrap_or(base.initial_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            total_timeout_ms: self.total_timeout_ms.unwrap_or(base.total_timeout_ms),
        }
    }
}

impl From<RetryPolicy> for PolicyOverride {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_retries: Some(policy.max_retries),
            initial_delay_ms: Some(policy.initial_delay_ms),
            max_delay_ms: Some(policy.max_delay_ms),
            total_timeout_ms: Some(policy.total_timeout_ms),
        }
    }
}

/// Category → policy lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTable {
    rows: BTreeMap<ModelCategory, RetryPolicy>,
    default: RetryPolicy,
}

impl PolicyTable {
    /// Table with the builtin rows only
    pub fn builtin() -> Self {
        let rows = ModelCategory::known()
            .into_iter()
            .map(|category| (category, RetryPolicy::builtin(category)))
            .collect();
        Self {
            rows,
            default: RetryPolicy::DEFAULT,
        }
    }

    /// Build from configured overrides keyed by category name.
    ///
    /// The key `default` (or `unknown`) overrides the fallback row. Any other key
    /// must name a known category. Each override is merged onto the builtin row
    /// it replaces and the merged policy is validated.
    pub fn from_overrides(overrides: &BTreeMap<String, PolicyOverride>) -> Result<Self> {
        let mut table = Self::builtin();
        for (key, partial) in overrides {
            let key_norm = key.trim().to_ascii_lowercase();
            let category = if key_norm == "default" || key_norm == "unknown" {
                ModelCategory::Unknown
            } else {
                ModelCategory::parse_known(&key_norm).ok_or_else(|| {
                    ConfigError::ValidationError(format!("policies.{key}: unknown model category"))
                })?
            };

            let policy = partial.apply(RetryPolicy::builtin(category));
            policy
                .validate()
                .map_err(|err| ConfigError::ValidationError(format!("policies.{key}: {err}")))?;
            table = table.with_policy(category, policy);
        }
        Ok(table)
    }

    /// Replace a single row
    pub fn with_policy(mut self, category: ModelCategory, policy: RetryPolicy) -> Self {
        if category == ModelCategory::Unknown {
            self.default = policy;
        } else {
            self.rows.insert(category, policy);
        }
        self
    }

    /// Policy for a category, falling back to the default row
    pub fn get(&self, category: ModelCategory) -> RetryPolicy {
        self.rows.get(&category).copied().unwrap_or(self.default)
    }

    pub fn default_policy(&self) -> RetryPolicy {
        self.default
    }

    /// Rows in category order, default row last
    pub fn rows(&self) -> Vec<(ModelCategory, RetryPolicy)> {
        let mut rows: Vec<_> = self.rows.iter().map(|(c, p)| (*c, *p)).collect();
        rows.push((ModelCategory::Unknown, self.default));
        rows
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::builtin()
    }
}
