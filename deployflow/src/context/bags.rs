//! The run-scoped map of stage outputs.

use crate::errors::OutputConflictError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named values produced by one stage's apply step.
pub type StageOutputs = serde_json::Map<String, serde_json::Value>;

/// Every stage's outputs for one pipeline run, keyed by stage name.
///
/// Entries are append-only: a stage's outputs are written exactly once,
/// after its apply succeeds, and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageOutputMap {
    outputs: BTreeMap<String, StageOutputs>,
}

impl StageOutputMap {
    /// Creates a new empty output map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records outputs for a stage.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the stage already has outputs.
    pub fn record(&mut self, stage: impl Into<String>, outputs: StageOutputs) -> Result<(), OutputConflictError> {
        let stage = stage.into();
        if self.outputs.contains_key(&stage) {
            return Err(OutputConflictError::new(stage));
        }
        self.outputs.insert(stage, outputs);
        Ok(())
    }

    /// Gets outputs for a stage.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&StageOutputs> {
        self.outputs.get(stage)
    }

    /// Checks if outputs exist for a stage.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.outputs.contains_key(stage)
    }

    /// Returns the names of stages with recorded outputs.
    #[must_use]
    pub fn stages(&self) -> Vec<&str> {
        self.outputs.keys().map(String::as_str).collect()
    }

    /// Returns the number of recorded stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Converts the whole map to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.outputs
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::Object(v.clone())))
                .collect(),
        )
    }
}
