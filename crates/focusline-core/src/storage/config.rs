//! TOML-based engine configuration.
//!
//! Stores tunables including:
//! - Lifecycle thresholds (logjam, park, grace period, sweep interval)
//! - Store retry policy
//! - Role-fit score weights and thresholds
//! - Suggestion rule thresholds and the workday window
//! - Per-role Peacetime baseline overrides
//!
//! Configuration is stored at `~/.config/focusline/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::attention::{AttentionModel, BaselineOverride, Role, Zone};
use crate::error::ConfigError;

/// Lifecycle thresholds and sweep cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_logjam_threshold")]
    pub logjam_threshold_minutes: u32,
    #[serde(default = "default_park_threshold")]
    pub park_threshold_minutes: u32,
    /// Window after an unpark during which the sweep leaves the item alone
    #[serde(default = "default_unpark_grace")]
    pub unpark_grace_minutes: u32,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_mutation_timeout")]
    pub mutation_timeout_ms: u64,
    #[serde(default = "default_min_completion")]
    pub min_completion_minutes: i64,
    #[serde(default = "default_max_completion")]
    pub max_completion_minutes: i64,
}

/// Bounded retry for transient store failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

/// Relative weights of the four role-fit sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_weight")]
    pub time_allocation: f64,
    #[serde(default = "default_weight")]
    pub attention_balance: f64,
    #[serde(default = "default_weight")]
    pub context_switching: f64,
    #[serde(default = "default_weight")]
    pub energy_alignment: f64,
}

impl ScoreWeights {
    /// Default balanced weights
    pub fn balanced() -> Self {
        Self {
            time_allocation: 0.25,
            attention_balance: 0.25,
            context_switching: 0.25,
            energy_alignment: 0.25,
        }
    }

    pub fn sum(&self) -> f64 {
        self.time_allocation + self.attention_balance + self.context_switching + self.energy_alignment
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Role-fit scoring thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,
    /// Sub-scores below this emit a warning
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: u8,
    /// Sub-scores below this emit a recommendation
    #[serde(default = "default_recommend_below")]
    pub recommend_below: u8,
    /// Transition rate at which context switching scores 0
    #[serde(default = "default_max_transitions_per_hour")]
    pub max_transitions_per_hour: f64,
}

/// Suggestion rule thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_min_useful_block")]
    pub min_useful_block_minutes: u32,
    #[serde(default = "default_split_threshold")]
    pub split_threshold_minutes: u32,
    #[serde(default = "default_focus_gap_tolerance")]
    pub focus_gap_tolerance_minutes: i64,
    #[serde(default = "default_batch_adjacency")]
    pub batch_adjacency_minutes: i64,
    #[serde(default = "default_merge_adjacency")]
    pub merge_adjacency_minutes: i64,
}

/// Working hours (UTC) bounding slot search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkdayConfig {
    #[serde(default = "default_workday_start")]
    pub start_hour: u8,
    #[serde(default = "default_workday_end")]
    pub end_hour: u8,
}

/// Role/zone used when a caller does not name one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_zone")]
    pub zone: Zone,
}

/// `[roles.<role>]` Peacetime baseline overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maker: Option<BaselineOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<BaselineOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<BaselineOverride>,
}

impl RolesConfig {
    pub fn overrides(&self) -> BTreeMap<Role, BaselineOverride> {
        let mut map = BTreeMap::new();
        for (role, patch) in [
            (Role::Maker, &self.maker),
            (Role::Marker, &self.marker),
            (Role::Multiplier, &self.multiplier),
        ] {
            if let Some(patch) = patch {
                map.insert(role, patch.clone());
            }
        }
        map
    }
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/focusline/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub workday: WorkdayConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub roles: RolesConfig,
}

// Default functions
fn default_logjam_threshold() -> u32 {
    60
}
fn default_park_threshold() -> u32 {
    8 * 60
}
fn default_unpark_grace() -> u32 {
    60
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_mutation_timeout() -> u64 {
    5_000
}
fn default_min_completion() -> i64 {
    1
}
fn default_max_completion() -> i64 {
    720
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    25
}
fn default_weight() -> f64 {
    0.25
}
fn default_low_water_mark() -> u8 {
    40
}
fn default_recommend_below() -> u8 {
    70
}
fn default_max_transitions_per_hour() -> f64 {
    4.0
}
fn default_min_useful_block() -> u32 {
    25
}
fn default_split_threshold() -> u32 {
    150
}
fn default_focus_gap_tolerance() -> i64 {
    5
}
fn default_batch_adjacency() -> i64 {
    15
}
fn default_merge_adjacency() -> i64 {
    10
}
fn default_workday_start() -> u8 {
    8
}
fn default_workday_end() -> u8 {
    18
}
fn default_role() -> Role {
    Role::Maker
}
fn default_zone() -> Zone {
    Zone::Peacetime
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            logjam_threshold_minutes: default_logjam_threshold(),
            park_threshold_minutes: default_park_threshold(),
            unpark_grace_minutes: default_unpark_grace(),
            sweep_interval_secs: default_sweep_interval(),
            mutation_timeout_ms: default_mutation_timeout(),
            min_completion_minutes: default_min_completion(),
            max_completion_minutes: default_max_completion(),
        }
    }
}

impl LifecycleConfig {
    pub fn logjam_threshold(&self) -> Duration {
        Duration::minutes(self.logjam_threshold_minutes as i64)
    }

    pub fn park_threshold(&self) -> Duration {
        Duration::minutes(self.park_threshold_minutes as i64)
    }

    pub fn unpark_grace(&self) -> Duration {
        Duration::minutes(self.unpark_grace_minutes as i64)
    }

    pub fn mutation_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.mutation_timeout_ms)
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::balanced(),
            low_water_mark: default_low_water_mark(),
            recommend_below: default_recommend_below(),
            max_transitions_per_hour: default_max_transitions_per_hour(),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            min_useful_block_minutes: default_min_useful_block(),
            split_threshold_minutes: default_split_threshold(),
            focus_gap_tolerance_minutes: default_focus_gap_tolerance(),
            batch_adjacency_minutes: default_batch_adjacency(),
            merge_adjacency_minutes: default_merge_adjacency(),
        }
    }
}

impl Default for WorkdayConfig {
    fn default() -> Self {
        Self {
            start_hour: default_workday_start(),
            end_hour: default_workday_end(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            zone: default_zone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            retry: RetryConfig::default(),
            scoring: ScoringConfig::default(),
            suggest: SuggestConfig::default(),
            workday: WorkdayConfig::default(),
            defaults: DefaultsConfig::default(),
            roles: RolesConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                // Role overrides are optional tables; accept JSON for a new one
                let new_value = match obj.get(part) {
                    Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    Some(serde_json::Value::Number(_)) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    Some(serde_json::Value::String(_)) => serde_json::Value::String(value.into()),
                    Some(_) | None if key.starts_with("roles.") => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    Some(_) => serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?,
                    None => return Err(unknown()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            if key.starts_with("roles.") && obj.get(part).map_or(true, |v| v.is_null()) {
                obj.insert(part.to_string(), serde_json::json!({}));
            }
            current = obj.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from disk, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. The result is re-validated as a whole.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        let lifecycle = &self.lifecycle;
        if lifecycle.logjam_threshold_minutes >= lifecycle.park_threshold_minutes {
            return Err(invalid(
                "lifecycle.logjam_threshold_minutes",
                "must be below lifecycle.park_threshold_minutes",
            ));
        }
        if lifecycle.min_completion_minutes > lifecycle.max_completion_minutes {
            return Err(invalid(
                "lifecycle.min_completion_minutes",
                "must not exceed lifecycle.max_completion_minutes",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        let weights = &self.scoring.weights;
        let all = [
            weights.time_allocation,
            weights.attention_balance,
            weights.context_switching,
            weights.energy_alignment,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.sum() <= 0.0 {
            return Err(invalid(
                "scoring.weights",
                "weights must be non-negative with a positive sum",
            ));
        }
        if !(self.scoring.max_transitions_per_hour > 0.0) {
            return Err(invalid("scoring.max_transitions_per_hour", "must be positive"));
        }
        if self.workday.start_hour >= self.workday.end_hour || self.workday.end_hour > 24 {
            return Err(invalid("workday", "start_hour < end_hour <= 24 is required"));
        }
        self.attention_model()?;
        Ok(())
    }

    /// Attention model with this config's role overrides.
    pub fn attention_model(&self) -> Result<AttentionModel, ConfigError> {
        AttentionModel::with_overrides(&self.roles.overrides()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "roles".into(),
                message: e.to_string(),
            }
        })
    }
}
