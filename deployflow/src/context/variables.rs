//! Input variable sets handed to the apply engine.

use crate::errors::DeployflowError;
use serde::{Deserialize, Serialize};

/// Variables for one stage's apply, keyed by their external names.
///
/// Built fresh per run from configuration and upstream outputs; immutable
/// once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputVariableSet {
    vars: serde_json::Map<String, serde_json::Value>,
}

impl InputVariableSet {
    /// Starts building a variable set.
    #[must_use]
    pub fn builder() -> InputVariableSetBuilder {
        InputVariableSetBuilder::default()
    }

    /// Builds a set from a serializable struct whose fields (or serde
    /// renames) are the variable names.
    ///
    /// # Errors
    ///
    /// Fails if the value does not serialize to a JSON object.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, DeployflowError> {
        Ok(Self::builder().extend(value)?.build())
    }

    /// Gets a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.vars.get(name)
    }

    /// Returns true if the variable is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if there are no variables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Borrows the variables as a JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.vars
    }

    /// Returns the variables as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.vars.clone())
    }
}

/// Builder merging several variable groups into one set.
///
/// Later groups overwrite earlier ones on key collision.
#[derive(Debug, Default)]
pub struct InputVariableSetBuilder {
    vars: serde_json::Map<String, serde_json::Value>,
}

impl InputVariableSetBuilder {
    /// Merges a serializable group of variables.
    ///
    /// # Errors
    ///
    /// Fails if the value does not serialize to a JSON object.
    pub fn extend<T: Serialize>(mut self, group: &T) -> Result<Self, DeployflowError> {
        match serde_json::to_value(group)? {
            serde_json::Value::Object(map) => {
                self.vars.extend(map);
                Ok(self)
            }
            other => Err(DeployflowError::Serialization(format!(
                "variable group must serialize to an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Sets a single variable.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// Finishes the set.
    #[must_use]
    pub fn build(self) -> InputVariableSet {
        InputVariableSet { vars: self.vars }
    }
}

pub(crate) const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Shared {
        name: String,
        #[serde(rename = "cloud-provider")]
        cloud_provider: String,
    }

    #[derive(Serialize)]
    struct Dask {
        #[serde(rename = "cloud-provider")]
        cloud_provider: String,
        #[serde(rename = "dask-worker-image")]
        image: String,
    }

    #[test]
    fn test_from_serializable_uses_renamed_keys() {
        let vars = InputVariableSet::from_serializable(&Shared {
            name: "demo".into(),
            cloud_provider: "azure".into(),
        })
        .unwrap();

        assert_eq!(vars.get("cloud-provider"), Some(&json!("azure")));
        assert!(!vars.contains("cloud_provider"));
    }

    #[test]
    fn test_builder_merges_groups_last_wins() {
        let vars = InputVariableSet::builder()
            .extend(&Shared {
                name: "demo".into(),
                cloud_provider: "local".into(),
            })
            .unwrap()
            .extend(&Dask {
                cloud_provider: "azure".into(),
                image: "worker:1".into(),
            })
            .unwrap()
            .var("extra", json!(true))
            .build();

        assert_eq!(vars.len(), 4);
        assert_eq!(vars.get("cloud-provider"), Some(&json!("azure")));
        assert_eq!(vars.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn test_non_object_group_is_rejected() {
        let result = InputVariableSet::builder().extend(&vec![1, 2, 3]);
        assert!(matches!(result, Err(DeployflowError::Serialization(_))));
    }
}
