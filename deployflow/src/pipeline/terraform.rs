//! An [`ApplyEngine`] driving the `terraform` CLI.

use super::render::write_stage;
use super::ApplyEngine;
use crate::context::{InputVariableSet, StageOutputs};
use crate::errors::ApplyError;
use crate::stages::ResourceDeclaration;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Variables file written next to each stage's document.
pub const VAR_FILE: &str = "deployflow.tfvars.json";

/// Runs `terraform init`, `apply` and `output -json` per stage.
#[derive(Debug, Clone)]
pub struct TerraformApplyEngine {
    binary: PathBuf,
    output_dir: PathBuf,
}

impl TerraformApplyEngine {
    /// Creates an engine writing stage directories under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from("terraform"),
            output_dir: output_dir.into(),
        }
    }

    /// Uses a specific `terraform` executable.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn terraform(&self, stage: &str, dir: &Path, args: &[&str]) -> Result<Vec<u8>, ApplyError> {
        debug!(stage, ?args, "running terraform");
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .env("TF_IN_AUTOMATION", "1")
            .output()
            .await
            .map_err(|e| ApplyError::new(stage, format!("failed to run {}: {e}", self.binary.display())))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ApplyError::new(
                stage,
                format!("terraform {} exited with {}: {}", args.join(" "), output.status, stderr.trim()),
            ))
        }
    }
}

/// Flattens `terraform output -json` (`{name: {value, ...}}`) to `{name: value}`.
///
/// # Errors
///
/// Returns an error if the document is not a JSON object.
pub fn flatten_outputs(stage: &str, raw: &[u8]) -> Result<StageOutputs, ApplyError> {
    let document: Value = serde_json::from_slice(raw)
        .map_err(|e| ApplyError::new(stage, format!("unreadable terraform output: {e}")))?;
    let Value::Object(entries) = document else {
        return Err(ApplyError::new(stage, "terraform output is not an object"));
    };
    Ok(entries
        .into_iter()
        .map(|(name, entry)| match entry {
            Value::Object(mut fields) if fields.contains_key("value") => {
                (name, fields.remove("value").unwrap_or(Value::Null))
            }
            other => (name, other),
        })
        .collect())
}

#[async_trait]
impl ApplyEngine for TerraformApplyEngine {
    async fn apply(
        &self,
        stage: &str,
        resources: &[ResourceDeclaration],
        variables: &InputVariableSet,
    ) -> Result<StageOutputs, ApplyError> {
        let names: Vec<&str> = variables.as_map().keys().map(String::as_str).collect();
        let dir = write_stage(&self.output_dir, stage, resources, &names)
            .await
            .map_err(|e| ApplyError::new(stage, e.to_string()))?;
        let var_file = serde_json::to_vec_pretty(variables.as_map())
            .map_err(|e| ApplyError::new(stage, e.to_string()))?;
        tokio::fs::write(dir.join(VAR_FILE), var_file)
            .await
            .map_err(|e| ApplyError::new(stage, e.to_string()))?;

        self.terraform(stage, &dir, &["init", "-input=false"]).await?;
        let var_file_arg = format!("-var-file={VAR_FILE}");
        self.terraform(stage, &dir, &["apply", "-auto-approve", "-input=false", &var_file_arg])
            .await?;
        let raw = self.terraform(stage, &dir, &["output", "-json"]).await?;

        let outputs = flatten_outputs(stage, &raw)?;
        info!(stage, outputs = outputs.len(), "terraform apply finished");
        Ok(outputs)
    }
}
