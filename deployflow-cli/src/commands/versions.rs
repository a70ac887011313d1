use anyhow::{Context, Result};
use deployflow::config::CloudProvider;
use deployflow::versions::VersionResolver;
use futures::future::try_join_all;

/// Execute the `versions` command: print supported Kubernetes versions per region.
pub async fn execute(provider: CloudProvider, regions: &[String]) -> Result<()> {
    let resolver = VersionResolver::with_default_sources();

    let lookups = regions.iter().map(|region| {
        let resolver = &resolver;
        async move {
            resolver
                .supported_versions(provider, region)
                .await
                .with_context(|| format!("Failed to list {provider} versions in {region}"))
        }
    });
    let results = try_join_all(lookups).await?;

    for (region, versions) in regions.iter().zip(results) {
        println!("{provider} {region}:");
        if versions.is_empty() {
            println!("  (no supported versions)");
        }
        for version in versions {
            println!("  {version}");
        }
    }
    Ok(())
}
