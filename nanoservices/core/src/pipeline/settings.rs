use std::path::PathBuf;
use std::time::Duration;

use crate::config::loader::{parse_duration, ConfigError};
use crate::config::types::AppConfig;
use crate::pipeline::Stage;

/// Hard limit for each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub resolve_config: Duration,
    pub preflight: Duration,
    pub fetch: Duration,
    pub transform: Duration,
    pub publish: Duration,
}

impl StageTimeouts {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::ResolveConfig => self.resolve_config,
            Stage::Preflight => self.preflight,
            Stage::Fetch => self.fetch,
            Stage::Transform => self.transform,
            Stage::Publish => self.publish,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            resolve_config: Duration::from_secs(60),
            preflight: Duration::from_secs(120),
            fetch: Duration::from_secs(900),
            transform: Duration::from_secs(600),
            publish: Duration::from_secs(600),
        }
    }
}

/// Parsed, ready-to-use execution settings shared by every run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub staging_root: PathBuf,
    pub chunk_size: usize,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from("./local/tmp"),
            chunk_size: 1024,
            retry_attempts: 5,
            retry_delay: Duration::from_secs(2),
            timeouts: StageTimeouts::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let t = &config.timeouts;
        Ok(Self {
            staging_root: PathBuf::from(&config.staging.root),
            chunk_size: config.staging.chunk_size.max(1),
            retry_attempts: config.retry.max_attempts.max(1),
            retry_delay: parse_duration(&config.retry.delay)?,
            timeouts: StageTimeouts {
                resolve_config: parse_duration(&t.resolve_config)?,
                preflight: parse_duration(&t.preflight)?,
                fetch: parse_duration(&t.fetch)?,
                transform: parse_duration(&t.transform)?,
                publish: parse_duration(&t.publish)?,
            },
        })
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }
}
