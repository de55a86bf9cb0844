//! Service configuration loaded from `animator.toml`.
//!
//! Missing keys fall back to defaults. `STORAGE_SERVICE_URL` and `REDIS_URL`
//! take precedence over the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AnimatorError;
use crate::pipeline::{Tier, default_tiers};
use crate::storage::DEFAULT_STORAGE_URL;

pub const DEFAULT_CONFIG_FILE: &str = "animator.toml";

/// Top-level settings loaded from `animator.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimatorConfig {
    /// Base URL of the storage service.
    #[serde(default = "default_storage_url")]
    pub storage_url: String,

    /// Redis instance holding job records and the task queue.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Redis list consumed by `animator consume`.
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Jobs allowed to run their pipelines at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit for a single tier run.
    #[serde(default = "default_tier_timeout_secs")]
    pub tier_timeout_secs: u64,

    /// Refuse `create_job_with_id` for ids that already have a record.
    #[serde(default)]
    pub reject_duplicate_ids: bool,

    /// Fallback chain, highest priority first.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,
}

// Default storage service address: `http://storage-service:3002`.
fn default_storage_url() -> String {
    DEFAULT_STORAGE_URL.to_string()
}

// Default Redis instance: local, default port.
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

// Default queue list: `animation_tasks`.
fn default_queue_key() -> String {
    "animation_tasks".to_string()
}

// Default worker slots: 2.
fn default_max_concurrent_jobs() -> usize {
    2
}

// Default per-tier limit: 10 minutes.
fn default_tier_timeout_secs() -> u64 {
    600
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            storage_url: default_storage_url(),
            redis_url: default_redis_url(),
            queue_key: default_queue_key(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            tier_timeout_secs: default_tier_timeout_secs(),
            reject_duplicate_ids: false,
            tiers: default_tiers(),
        }
    }
}

impl AnimatorConfig {
    /// Load from `path`, or `animator.toml` in the working directory.
    /// Uses defaults if the default file does not exist; an explicit path
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, AnimatorError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, AnimatorError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<AnimatorConfig>(&contents)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("STORAGE_SERVICE_URL")
            && !url.is_empty()
        {
            self.storage_url = url;
        }
        if let Some(url) = lookup("REDIS_URL")
            && !url.is_empty()
        {
            self.redis_url = url;
        }
    }

    /// Reject settings the manager cannot run with.
    pub fn validate(&self) -> Result<(), AnimatorError> {
        if self.tiers.is_empty() {
            return Err(AnimatorError::Config(
                "at least one fallback tier is required".into(),
            ));
        }
        if let Some(tier) = self
            .tiers
            .iter()
            .find(|t| t.name.trim().is_empty() || t.program.trim().is_empty())
        {
            return Err(AnimatorError::Config(format!(
                "tier {:?} needs a name and a program",
                tier.name
            )));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(AnimatorError::Config(
                "max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if self.tier_timeout_secs == 0 {
            return Err(AnimatorError::Config(
                "tier_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn tier_timeout(&self) -> Duration {
        Duration::from_secs(self.tier_timeout_secs)
    }
}
