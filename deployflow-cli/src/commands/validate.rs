use std::path::Path;

use anyhow::Result;
use deployflow::pipeline::StageRegistry;

/// Execute the `validate` command: check the configuration and stage ordering.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = super::load(config_path)?;
    println!("Configuration:     OK ({} on {})", config.project_name, config.provider);

    let registry = super::base_registry()?;
    let problems = unresolved_report(&registry);
    if !problems.is_empty() {
        for line in &problems {
            println!("{line}");
        }
        anyhow::bail!("{} unresolved stage dependencies", registry.unresolved_dependencies().len());
    }

    println!("Stage ordering:    OK");
    for line in stage_table(&registry) {
        println!("{line}");
    }
    Ok(())
}

/// One line per unresolved dependency, with its code and fix hint.
fn unresolved_report(registry: &StageRegistry) -> Vec<String> {
    registry
        .unresolved_dependencies()
        .iter()
        .map(|(stage, dependency)| {
            let info = StageRegistry::unresolved_info(stage, dependency);
            match info.fix_hint {
                Some(hint) => format!("  [{}] {}\n      {hint}", info.code, info.summary),
                None => format!("  [{}] {}", info.code, info.summary),
            }
        })
        .collect()
}

/// The ordered stages with their dependencies and contract sizes.
fn stage_table(registry: &StageRegistry) -> Vec<String> {
    registry
        .descriptors()
        .into_iter()
        .map(|d| {
            let needs = if d.dependencies.is_empty() {
                String::from("-")
            } else {
                d.dependencies.join(", ")
            };
            format!(
                "  {:>4}  {:<40} inputs={:<3} outputs={:<3} after: {needs}",
                d.priority,
                d.name,
                d.input_schema.fields().len(),
                d.output_schema.fields().len(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployflow::testing::ScriptedStage;
    use std::sync::Arc;

    #[test]
    fn test_stage_table_lists_base_stages_in_order() {
        let registry = super::super::base_registry().unwrap();
        let table = stage_table(&registry);

        assert_eq!(table.len(), 4);
        assert!(table[0].contains("02-infrastructure"));
        assert!(table[0].ends_with("after: -"));
        assert!(table[3].contains("07-kubernetes-services"));
        assert!(table[3].contains("04-kubernetes-ingress"));
    }

    #[test]
    fn test_unresolved_report_carries_hint() {
        let mut registry = StageRegistry::new();
        registry
            .register(Arc::new(ScriptedStage::new("08-extensions", 80).depends_on("07-kubernetes-services")))
            .unwrap();

        let report = unresolved_report(&registry);

        assert_eq!(report.len(), 1);
        assert!(report[0].contains("REGISTRY-UNRESOLVED"));
        assert!(report[0].contains("'08-extensions' depends on unregistered stage '07-kubernetes-services'"));
        assert!(report[0].contains("Register the provider"));
    }
}
