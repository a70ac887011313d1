use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use deployflow::pipeline::{ExecutorOptions, PipelineExecutor, TerraformApplyEngine};
use tracing::info;

use crate::progress::ProgressPrinter;

/// Execute the `deploy` command: apply every stage, then save the outputs.
pub async fn execute(config_path: &Path, output_dir: &Path, disable_checks: bool) -> Result<()> {
    let config = super::load(config_path)?;
    let registry = super::base_registry()?;
    info!(project = %config.project_name, provider = %config.provider, stages = registry.len(), "starting deployment");
    let health = super::health_checker(&config)?;

    let engine = Arc::new(TerraformApplyEngine::new(output_dir));
    let executor = PipelineExecutor::new(registry, engine, health)
        .with_event_sink(Arc::new(ProgressPrinter))
        .with_options(ExecutorOptions::default().with_skip_checks(disable_checks));

    let report = executor.run(&config).await.context("Deployment failed")?;

    let outputs_path = output_dir.join(super::OUTPUTS_FILE);
    let json = serde_json::to_string_pretty(&report.outputs.to_json())?;
    tokio::fs::write(&outputs_path, json)
        .await
        .with_context(|| format!("Failed to write {}", outputs_path.display()))?;

    println!(
        "\nDeployed {} stage(s) in {:.1}s; outputs saved to {}",
        report.stages.len(),
        report.duration_ms / 1000.0,
        outputs_path.display()
    );
    if disable_checks {
        println!("Checks were skipped.");
    }
    Ok(())
}
