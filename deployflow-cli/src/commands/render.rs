use std::path::Path;

use anyhow::{Context, Result};
use deployflow::pipeline::render_stages;

/// Execute the `render` command: write each stage directory without applying.
pub async fn execute(config_path: &Path, output_dir: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    let registry = super::base_registry()?;

    let written = render_stages(&registry, &config, output_dir)
        .await
        .with_context(|| format!("Failed to render stages into {}", output_dir.display()))?;

    for path in &written {
        println!("{}", path.display());
    }
    println!("\nRendered {} stage(s).", written.len());
    Ok(())
}
