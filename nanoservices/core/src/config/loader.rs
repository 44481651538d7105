use std::path::Path;
use std::time::Duration;
use crate::config::types::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid duration '{0}': expected a number followed by ms, s, m or h")]
    Duration(String),
}

/// Load the application config from a YAML file.
pub fn load_app_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_app_config(&content)
}

/// Parse the application config from a YAML string. Missing sections take defaults.
pub fn parse_app_config(yaml: &str) -> Result<AppConfig, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Parse durations such as `"500ms"`, `"2s"`, `"15m"` or `"1h"`. A bare number is seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| ConfigError::Duration(value.to_string()))?;
    match unit.trim() {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        "h" => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(ConfigError::Duration(value.to_string())),
    }
}
