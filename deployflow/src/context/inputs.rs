//! Stage inputs with strictness enforcement.

use super::{StageOutputMap, StageOutputs};
use crate::errors::{DeployflowError, MissingDependencyError, UndeclaredDependencyError};
use serde::de::DeserializeOwned;

/// Read-only view of prior stage outputs, limited to declared dependencies.
///
/// Reading a stage outside the declared set fails with
/// `UndeclaredDependencyError`; reading a key the upstream stage never
/// produced fails with `MissingDependencyError`. Missing keys are never
/// silently defaulted.
#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    outputs: &'a StageOutputMap,
    declared_dependencies: &'a [String],
    stage_name: &'a str,
}

impl<'a> StageInputs<'a> {
    /// Creates new stage inputs.
    #[must_use]
    pub const fn new(outputs: &'a StageOutputMap, declared_dependencies: &'a [String], stage_name: &'a str) -> Self {
        Self {
            outputs,
            declared_dependencies,
            stage_name,
        }
    }

    /// Name of the stage reading these inputs.
    #[must_use]
    pub const fn stage_name(&self) -> &str {
        self.stage_name
    }

    /// Gets all outputs of an upstream stage.
    ///
    /// # Errors
    ///
    /// Fails if the upstream stage is undeclared or has not produced outputs.
    pub fn stage(&self, upstream: &str) -> Result<&'a StageOutputs, DeployflowError> {
        if !self.declared_dependencies.iter().any(|d| d == upstream) {
            return Err(UndeclaredDependencyError::new(self.stage_name, upstream).into());
        }
        self.outputs
            .get(upstream)
            .ok_or_else(|| MissingDependencyError::new(self.stage_name, upstream, "*").into())
    }

    /// Gets a value at a dotted path within an upstream stage's outputs.
    ///
    /// # Errors
    ///
    /// Fails if the upstream stage is undeclared, absent, or lacks the path.
    pub fn require(&self, upstream: &str, path: &str) -> Result<&'a serde_json::Value, DeployflowError> {
        let outputs = self.stage_or_missing(upstream, path)?;
        lookup(outputs, path).ok_or_else(|| MissingDependencyError::new(self.stage_name, upstream, path).into())
    }

    /// Gets a value at a dotted path, allowing the key to be absent.
    ///
    /// The upstream stage itself must still have run. A JSON `null` is
    /// reported as absent.
    ///
    /// # Errors
    ///
    /// Fails if the upstream stage is undeclared or absent.
    pub fn optional(&self, upstream: &str, path: &str) -> Result<Option<&'a serde_json::Value>, DeployflowError> {
        let outputs = self.stage_or_missing(upstream, path)?;
        Ok(lookup(outputs, path).filter(|v| !v.is_null()))
    }

    /// Gets a string value at a dotted path.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::require`], or if the value is not a string.
    pub fn require_str(&self, upstream: &str, path: &str) -> Result<&'a str, DeployflowError> {
        self.require(upstream, path)?.as_str().ok_or_else(|| {
            MissingDependencyError::new(self.stage_name, upstream, format!("{path} (as string)")).into()
        })
    }

    /// Deserializes the value at a dotted path.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::require`], or if deserialization fails.
    pub fn require_as<T: DeserializeOwned>(&self, upstream: &str, path: &str) -> Result<T, DeployflowError> {
        let value = self.require(upstream, path)?;
        serde_json::from_value(value.clone()).map_err(|e| {
            DeployflowError::Serialization(format!("{upstream}.{path} in '{}': {e}", self.stage_name))
        })
    }

    /// Returns the declared dependencies.
    #[must_use]
    pub const fn declared_dependencies(&self) -> &[String] {
        self.declared_dependencies
    }

    fn stage_or_missing(&self, upstream: &str, path: &str) -> Result<&'a StageOutputs, DeployflowError> {
        if !self.declared_dependencies.iter().any(|d| d == upstream) {
            return Err(UndeclaredDependencyError::new(self.stage_name, upstream).into());
        }
        self.outputs
            .get(upstream)
            .ok_or_else(|| MissingDependencyError::new(self.stage_name, upstream, path).into())
    }
}

fn lookup<'a>(outputs: &'a StageOutputs, path: &str) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = outputs.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_outputs() -> StageOutputMap {
        let mut map = StageOutputMap::new();
        map.record(
            "02-infrastructure",
            json!({"node_selectors": {"general": {"key": "pool", "value": "general"}}, "nfs_endpoint": null})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        map.record("04-kubernetes-ingress", json!({"domain": "example.com"}).as_object().cloned().unwrap())
            .unwrap();
        map
    }

    fn deps() -> Vec<String> {
        vec!["02-infrastructure".to_string(), "04-kubernetes-ingress".to_string()]
    }

    #[test]
    fn test_require_reads_declared_value() {
        let outputs = sample_outputs();
        let deps = deps();
        let inputs = StageInputs::new(&outputs, &deps, "07-kubernetes-services");

        assert_eq!(inputs.require_str("04-kubernetes-ingress", "domain").unwrap(), "example.com");
        assert_eq!(
            inputs.require("02-infrastructure", "node_selectors.general.value").unwrap(),
            &json!("general")
        );
    }

    #[test]
    fn test_missing_key_is_missing_dependency() {
        let outputs = sample_outputs();
        let deps = deps();
        let inputs = StageInputs::new(&outputs, &deps, "07-kubernetes-services");

        let err = inputs.require("04-kubernetes-ingress", "load_balancer_address").unwrap_err();
        match err {
            DeployflowError::MissingDependency(e) => {
                assert_eq!(e.upstream, "04-kubernetes-ingress");
                assert_eq!(e.key, "load_balancer_address");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_absent_stage_is_missing_dependency() {
        let outputs = StageOutputMap::new();
        let deps = deps();
        let inputs = StageInputs::new(&outputs, &deps, "07-kubernetes-services");

        assert!(matches!(
            inputs.require("04-kubernetes-ingress", "domain"),
            Err(DeployflowError::MissingDependency(_))
        ));
        assert!(matches!(
            inputs.optional("02-infrastructure", "nfs_endpoint"),
            Err(DeployflowError::MissingDependency(_))
        ));
    }

    #[test]
    fn test_undeclared_stage_is_rejected() {
        let outputs = sample_outputs();
        let deps = vec!["02-infrastructure".to_string()];
        let inputs = StageInputs::new(&outputs, &deps, "07-kubernetes-services");

        assert!(matches!(
            inputs.require("04-kubernetes-ingress", "domain"),
            Err(DeployflowError::UndeclaredDependency(_))
        ));
    }

    #[test]
    fn test_optional_treats_null_as_absent() {
        let outputs = sample_outputs();
        let deps = deps();
        let inputs = StageInputs::new(&outputs, &deps, "07-kubernetes-services");

        assert_eq!(inputs.optional("02-infrastructure", "nfs_endpoint").unwrap(), None);
        assert_eq!(inputs.optional("02-infrastructure", "efs_id").unwrap(), None);
    }
}
