//! Stage registration and ordering.

use crate::errors::{ContractErrorInfo, DeployflowError, DuplicateStageError, PriorityInversionError};
use crate::stages::{Stage, StageDescriptor, StageProvider};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Every stage available to a run, in registration order.
///
/// Ordering is by priority, with registration order breaking ties.
/// Registration rejects duplicate names and any stage whose priority would
/// place it before one of its registered dependencies (or after a registered
/// dependent).
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Stage>>,
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every stage of `providers`.
    ///
    /// # Errors
    ///
    /// Returns the first registration error.
    pub fn from_providers(providers: &[&dyn StageProvider]) -> Result<Self, DeployflowError> {
        let mut registry = Self::new();
        for provider in providers {
            registry.register_provider(*provider)?;
        }
        Ok(registry)
    }

    /// Adds a stage.
    ///
    /// # Errors
    ///
    /// Returns [`DeployflowError::DuplicateStage`] if the name is taken, or
    /// [`DeployflowError::PriorityInversion`] if the stage's priority
    /// contradicts a dependency edge with an already-registered stage.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> Result<(), DeployflowError> {
        let name = stage.name();
        if self.contains(name) {
            return Err(DuplicateStageError::new(name).into());
        }

        let priority = stage.priority();
        for dependency in stage.dependencies() {
            if let Some(upstream) = self.get(&dependency) {
                // The upstream is registered earlier, so ties are fine.
                if upstream.priority() > priority {
                    return Err(PriorityInversionError::new(name, priority, dependency, upstream.priority()).into());
                }
            }
        }
        for dependent in &self.stages {
            if dependent.dependencies().iter().any(|d| d == name) && priority >= dependent.priority() {
                return Err(PriorityInversionError::new(dependent.name(), dependent.priority(), name, priority).into());
            }
        }

        debug!(stage = %name, priority, "registered stage");
        self.stages.push(stage);
        Ok(())
    }

    /// Registers every stage of a provider, in the provider's order.
    ///
    /// # Errors
    ///
    /// Returns the first registration error; earlier stages stay registered.
    pub fn register_provider(&mut self, provider: &dyn StageProvider) -> Result<usize, DeployflowError> {
        let stages = provider.provides_stages();
        let count = stages.len();
        for stage in stages {
            self.register(stage)?;
        }
        Ok(count)
    }

    /// Returns the stage with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Stage>> {
        self.stages.iter().find(|s| s.name() == name)
    }

    /// Returns whether a stage with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages ascending by priority, stable for equal priorities.
    ///
    /// Recomputed from the current registration set on every call.
    pub fn ordered_stages(&self) -> impl Iterator<Item = &Arc<dyn Stage>> + '_ {
        let mut order: Vec<usize> = (0..self.stages.len()).collect();
        order.sort_by_key(|&i| self.stages[i].priority());
        order.into_iter().map(move |i| &self.stages[i])
    }

    /// Descriptors of the ordered stages.
    #[must_use]
    pub fn descriptors(&self) -> Vec<StageDescriptor> {
        self.ordered_stages().map(|s| s.descriptor()).collect()
    }

    /// Dependencies naming stages that are not registered, as
    /// `(stage, dependency)` pairs. Running such a stage fails with a
    /// missing dependency.
    #[must_use]
    pub fn unresolved_dependencies(&self) -> Vec<(String, String)> {
        self.ordered_stages()
            .flat_map(|stage| {
                stage
                    .dependencies()
                    .into_iter()
                    .filter(|d| !self.contains(d))
                    .map(|d| (stage.name().to_string(), d))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Diagnostic for an unresolved dependency.
    #[must_use]
    pub fn unresolved_info(stage: &str, dependency: &str) -> ContractErrorInfo {
        ContractErrorInfo::new(
            "REGISTRY-UNRESOLVED",
            format!("Stage '{stage}' depends on unregistered stage '{dependency}'"),
        )
        .with_fix_hint("Register the provider that contributes the dependency, or remove it.")
        .with_context_entry("stage", stage)
        .with_context_entry("dependency", dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStage;
    use pretty_assertions::assert_eq;

    fn stage(name: &str, priority: i32) -> Arc<dyn Stage> {
        Arc::new(ScriptedStage::new(name, priority))
    }

    fn names(registry: &StageRegistry) -> Vec<&str> {
        registry.ordered_stages().map(|s| s.name()).collect()
    }

    #[test]
    fn test_ordered_by_priority() {
        let mut registry = StageRegistry::new();
        registry.register(stage("c", 30)).unwrap();
        registry.register(stage("a", 10)).unwrap();
        registry.register(stage("b", 20)).unwrap();
        assert_eq!(names(&registry), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let mut registry = StageRegistry::new();
        registry.register(stage("second", 10)).unwrap();
        registry.register(stage("first", 5)).unwrap();
        registry.register(stage("third", 10)).unwrap();
        registry.register(stage("fourth", 10)).unwrap();
        assert_eq!(names(&registry), vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_ordering_is_restartable() {
        let mut registry = StageRegistry::new();
        registry.register(stage("a", 1)).unwrap();
        assert_eq!(names(&registry), names(&registry));
        registry.register(stage("b", 0)).unwrap();
        assert_eq!(names(&registry), vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = StageRegistry::new();
        registry.register(stage("a", 1)).unwrap();
        let err = registry.register(stage("a", 2)).unwrap_err();
        assert!(matches!(err, DeployflowError::DuplicateStage(ref e) if e.name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dependency_with_higher_priority_rejected() {
        let mut registry = StageRegistry::new();
        registry.register(stage("a", 20)).unwrap();
        let err = registry
            .register(Arc::new(ScriptedStage::new("b", 10).depends_on("a")))
            .unwrap_err();
        let DeployflowError::PriorityInversion(e) = err else {
            panic!("expected priority inversion, got {err}");
        };
        assert_eq!((e.stage.as_str(), e.dependency.as_str()), ("b", "a"));
    }

    #[test]
    fn test_dependent_registered_first_rejected_on_tie() {
        let mut registry = StageRegistry::new();
        registry
            .register(Arc::new(ScriptedStage::new("b", 10).depends_on("a")))
            .unwrap();
        let err = registry.register(stage("a", 10)).unwrap_err();
        assert!(matches!(err, DeployflowError::PriorityInversion(_)));
        registry.register(stage("a", 5)).unwrap();
        assert_eq!(names(&registry), vec!["a", "b"]);
    }

    #[test]
    fn test_tie_with_earlier_dependency_allowed() {
        let mut registry = StageRegistry::new();
        registry.register(stage("a", 10)).unwrap();
        registry
            .register(Arc::new(ScriptedStage::new("b", 10).depends_on("a")))
            .unwrap();
        assert_eq!(names(&registry), vec!["a", "b"]);
    }

    #[test]
    fn test_unresolved_dependencies() {
        let mut registry = StageRegistry::new();
        registry
            .register(Arc::new(ScriptedStage::new("b", 10).depends_on("ghost")))
            .unwrap();
        assert_eq!(
            registry.unresolved_dependencies(),
            vec![("b".to_string(), "ghost".to_string())]
        );
    }

    #[test]
    fn test_descriptors_follow_run_order() {
        let mut registry = StageRegistry::new();
        registry.register(stage("b", 20)).unwrap();
        registry
            .register(Arc::new(ScriptedStage::new("c", 30).depends_on("b")))
            .unwrap();
        registry.register(stage("a", 10)).unwrap();

        let descriptors = registry.descriptors();
        let order: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(descriptors[2].dependencies, vec!["b".to_string()]);
    }

    #[test]
    fn test_unresolved_info_names_both_stages() {
        let info = StageRegistry::unresolved_info("b", "ghost");
        assert_eq!(info.code, "REGISTRY-UNRESOLVED");
        assert_eq!(info.context.get("dependency"), Some(&"ghost".to_string()));
        assert!(info.summary.contains("'b' depends on unregistered stage 'ghost'"));
    }

    #[test]
    fn test_from_providers() {
        let registry = StageRegistry::from_providers(&[&crate::stages::BasePlatformStages]).unwrap();
        assert_eq!(registry.len(), 4);
        assert!(registry.unresolved_dependencies().is_empty());
    }
}
