//! Platform YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::types::PlatformConfig;
use super::validator::validate_config;
use crate::errors::ConfigError;

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex")
});

/// Substitutes `${VAR_NAME}` patterns with environment variable values.
///
/// Full-line `#` comments are left untouched, so a commented-out reference
/// to an unset variable does not fail the load. Trailing comments after a
/// value are substituted like the rest of the line.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    let mut missing: Vec<String> = Vec::new();
    let mut result = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            continue;
        }
        let replaced = ENV_VAR_RE.replace_all(line, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            lookup(name).unwrap_or_else(|| {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            })
        });
        result.push_str(&replaced);
    }

    if !missing.is_empty() {
        return Err(ConfigError::new(format!(
            "Missing environment variable(s): {}",
            missing.join(", ")
        )));
    }

    Ok(result)
}

/// Parses and validates a platform YAML string.
///
/// # Errors
///
/// Returns an error if substitution fails, the YAML is invalid, or
/// validation finds problems.
pub fn parse_config_str(yaml: &str) -> Result<PlatformConfig, ConfigError> {
    let substituted = substitute_env_vars(yaml)?;
    let config: PlatformConfig = serde_yaml::from_str(&substituted)
        .map_err(|e| ConfigError::new(format!("Failed to parse platform YAML: {e}")))?;
    validate_config(&config)?;
    Ok(config)
}

/// Loads a platform YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails to parse.
pub fn load_config(path: &Path) -> Result<PlatformConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::new(format!("Failed to read config file {}: {e}", path.display())))?;
    parse_config_str(&content)
}
