//! A scripted apply engine.

use crate::context::{InputVariableSet, StageOutputs};
use crate::errors::ApplyError;
use crate::pipeline::ApplyEngine;
use crate::stages::ResourceDeclaration;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

type Handler = dyn Fn(&InputVariableSet) -> Result<StageOutputs, ApplyError> + Send + Sync;

/// An [`ApplyEngine`] returning canned outputs per stage.
///
/// Stages without a script apply successfully with no outputs. Clones share
/// the call log.
#[derive(Clone, Default)]
pub struct ScriptedApplyEngine {
    handlers: HashMap<String, Arc<Handler>>,
    calls: Arc<Mutex<Vec<(String, InputVariableSet)>>>,
}

impl std::fmt::Debug for ScriptedApplyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedApplyEngine")
            .field("scripted", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ScriptedApplyEngine {
    /// Creates an engine with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `outputs` (a JSON object) for `stage`.
    #[must_use]
    pub fn with_outputs(self, stage: impl Into<String>, outputs: Value) -> Self {
        let outputs = match outputs {
            Value::Object(map) => map,
            _ => StageOutputs::new(),
        };
        self.with_handler(stage, move |_| Ok(outputs.clone()))
    }

    /// Computes `stage`'s outputs from its variables.
    #[must_use]
    pub fn with_handler<F>(mut self, stage: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&InputVariableSet) -> Result<StageOutputs, ApplyError> + Send + Sync + 'static,
    {
        self.handlers.insert(stage.into(), Arc::new(handler));
        self
    }

    /// Fails `stage` with `message`.
    #[must_use]
    pub fn with_failure(self, stage: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        let message = message.into();
        let name = stage.clone();
        self.with_handler(stage, move |_| Err(ApplyError::new(&name, &message)))
    }

    /// Stages applied so far, in call order.
    #[must_use]
    pub fn applied(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(stage, _)| stage.clone()).collect()
    }

    /// Variables the last apply of `stage` received.
    #[must_use]
    pub fn variables_for(&self, stage: &str) -> Option<InputVariableSet> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|(name, _)| name == stage)
            .map(|(_, vars)| vars.clone())
    }
}

#[async_trait]
impl ApplyEngine for ScriptedApplyEngine {
    async fn apply(
        &self,
        stage: &str,
        _resources: &[ResourceDeclaration],
        variables: &InputVariableSet,
    ) -> Result<StageOutputs, ApplyError> {
        self.calls.lock().push((stage.to_string(), variables.clone()));
        match self.handlers.get(stage) {
            Some(handler) => handler(variables),
            None => Ok(StageOutputs::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_failure_script() {
        let engine = ScriptedApplyEngine::new().with_failure("a", "no quota");
        let err = engine.apply("a", &[], &InputVariableSet::default()).await.unwrap_err();
        assert_eq!(err.message, "no quota");
        assert_eq!(engine.applied(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let engine = ScriptedApplyEngine::new().with_outputs("a", json!({"k": "v"}));
        let observer = engine.clone();
        let outputs = engine.apply("a", &[], &InputVariableSet::default()).await.unwrap();
        assert_eq!(outputs.get("k"), Some(&json!("v")));
        assert_eq!(observer.applied(), vec!["a".to_string()]);
    }
}
