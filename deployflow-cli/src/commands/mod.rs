pub mod check;
pub mod deploy;
pub mod render;
pub mod validate;
pub mod versions;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use deployflow::config::{load_config, PlatformConfig};
use deployflow::events::EventSink;
use deployflow::health::HealthChecker;
use deployflow::pipeline::StageRegistry;
use deployflow::stages::BasePlatformStages;

use crate::progress::ProgressPrinter;

/// File name for the stage output map saved by `deploy`.
pub const OUTPUTS_FILE: &str = "stage_outputs.json";

/// Loads and validates the platform configuration.
pub fn load(config_path: &Path) -> Result<PlatformConfig> {
    load_config(config_path).with_context(|| format!("Failed to load config: {}", config_path.display()))
}

/// Registers the base platform stages.
pub fn base_registry() -> Result<StageRegistry> {
    StageRegistry::from_providers(&[&BasePlatformStages]).context("Failed to register platform stages")
}

/// A health checker using the configured policy that prints each attempt.
pub fn health_checker(config: &PlatformConfig) -> Result<HealthChecker> {
    let printer: Arc<dyn EventSink> = Arc::new(ProgressPrinter);
    Ok(HealthChecker::http()
        .context("Failed to build HTTP client")?
        .with_policy(config.health_check)
        .with_event_sink(printer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_reports_path_on_error() {
        let err = load(Path::new("/nonexistent/nebari-config.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/nebari-config.yaml"));
    }

    #[test]
    fn test_load_and_register() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "project_name: demo\nprovider: local\ndomain: demo.example.com").unwrap();

        let config = load(file.path()).unwrap();
        let registry = base_registry().unwrap();

        assert_eq!(config.project_name, "demo");
        assert_eq!(registry.len(), 4);
        assert!(registry.unresolved_dependencies().is_empty());
    }
}
