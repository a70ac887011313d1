//! Writing stage directories without applying them.

use super::StageRegistry;
use crate::config::PlatformConfig;
use crate::errors::DeployflowError;
use crate::stages::{terraform_document, ResourceDeclaration};
use std::path::{Path, PathBuf};
use tracing::info;

/// File holding a stage's Terraform JSON document.
pub const TERRAFORM_FILE: &str = "_deployflow.tf.json";

/// Directory of `stage` under `output_dir`.
#[must_use]
pub fn stage_directory(output_dir: &Path, stage: &str) -> PathBuf {
    output_dir.join("stages").join(stage)
}

/// Writes one stage's Terraform document and returns the directory.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub async fn write_stage(
    output_dir: &Path,
    stage: &str,
    resources: &[ResourceDeclaration],
    variables: &[&str],
) -> Result<PathBuf, DeployflowError> {
    let dir = stage_directory(output_dir, stage);
    tokio::fs::create_dir_all(&dir).await?;
    let document = terraform_document(resources, variables);
    tokio::fs::write(dir.join(TERRAFORM_FILE), serde_json::to_vec_pretty(&document)?).await?;
    Ok(dir)
}

/// Writes `stages/<name>/_deployflow.tf.json` for every ordered stage.
///
/// Variable blocks are declared from each stage's input schema.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
pub async fn render_stages(
    registry: &StageRegistry,
    config: &PlatformConfig,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, DeployflowError> {
    let mut written = Vec::with_capacity(registry.len());
    for stage in registry.ordered_stages() {
        let schema = stage.input_schema();
        let variables: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        let dir = write_stage(output_dir, stage.name(), &stage.resources(config), &variables).await?;
        info!(stage = stage.name(), dir = %dir.display(), "rendered stage");
        written.push(dir);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::BasePlatformStages;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_render_writes_every_stage_directory() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StageRegistry::from_providers(&[&BasePlatformStages]).unwrap();
        let config = PlatformConfig::new("demo");

        render_stages(&registry, &config, dir.path()).await.unwrap();

        let mut stages: Vec<String> = std::fs::read_dir(dir.path().join("stages"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        stages.sort();
        assert_eq!(
            stages,
            vec![
                "02-infrastructure",
                "04-kubernetes-ingress",
                "06-kubernetes-keycloak-configuration",
                "07-kubernetes-services",
            ]
        );
    }

    #[tokio::test]
    async fn test_rendered_document_declares_backend_and_variables() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StageRegistry::from_providers(&[&BasePlatformStages]).unwrap();
        render_stages(&registry, &PlatformConfig::new("demo"), dir.path()).await.unwrap();

        let path = stage_directory(dir.path(), "07-kubernetes-services").join(TERRAFORM_FILE);
        let document: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();

        assert_eq!(
            document["terraform"]["backend"]["kubernetes"]["secret_suffix"],
            "demo-dev-07-kubernetes-services"
        );
        assert!(document["variable"].get("jupyterhub-logout-redirect-url").is_some());
        assert_eq!(
            document["module"]["kubernetes-services"]["realm_id"],
            "${var.realm_id}"
        );
    }
}
