use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),
}

pub fn load_config(path: &Path) -> Result<WatchConfig, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse and validate a watch config from YAML text.
pub fn parse_config(yaml: &str) -> Result<WatchConfig, ConfigError> {
    let config: WatchConfig = serde_yaml::from_str(yaml)?;
    validate_config(&config)?;
    Ok(config)
}

/// Collects every problem so the user can fix the file in one pass.
fn validate_config(config: &WatchConfig) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.window_minutes <= 0 {
        errors.push(format!(
            "window_minutes must be a positive integer, got {}",
            config.window_minutes
        ));
    } else if config.checked_window().is_none() {
        errors.push(format!(
            "window_minutes is too large, got {}",
            config.window_minutes
        ));
    }

    if config.poll_interval.is_zero() {
        errors.push("poll_interval must be greater than zero".to_string());
    }

    if config.max_missed_polls == 0 {
        errors.push("max_missed_polls must be at least 1".to_string());
    }

    let mut names = HashSet::new();
    for (i, alert) in config.alerts.iter().enumerate() {
        let prefix = if alert.name.is_empty() {
            format!("alerts[{}]", i)
        } else {
            format!("alert '{}'", alert.name)
        };

        if alert.name.trim().is_empty() {
            errors.push(format!("{}: name cannot be empty", prefix));
        } else if !names.insert(alert.name.as_str()) {
            errors.push(format!("{}: duplicate alert name", prefix));
        }

        if !alert.threshold.is_finite() {
            errors.push(format!("{}: threshold must be a finite number", prefix));
        } else if alert.threshold < 0.0 {
            errors.push(format!(
                "{}: threshold must not be negative, got {}",
                prefix, alert.threshold
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
