use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use deployflow::context::StageOutputMap;
use deployflow::pipeline::{ApplyEngine, PipelineExecutor, TerraformApplyEngine};

/// Execute the `check` command: re-run stage checks against saved outputs.
pub async fn execute(config_path: &Path, outputs_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let registry = super::base_registry()?;
    let health = super::health_checker(&config)?;

    let raw = tokio::fs::read_to_string(outputs_path)
        .await
        .with_context(|| format!("Failed to read outputs: {}", outputs_path.display()))?;
    let outputs: StageOutputMap = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse outputs: {}", outputs_path.display()))?;

    let engine: Arc<dyn ApplyEngine> = Arc::new(TerraformApplyEngine::new("."));
    let executor = PipelineExecutor::new(registry, engine, health);
    let checked = executor.check_only(&outputs).await.context("Checks failed")?;

    println!("\nAll checks passed for {} stage(s).", checked.len());
    Ok(())
}
