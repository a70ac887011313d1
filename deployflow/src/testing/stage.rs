//! A scripted stage.

use crate::config::PlatformConfig;
use crate::context::{InputVariableSet, StageInputs, StageOutputMap};
use crate::contracts::Schema;
use crate::errors::{CheckFailedError, DeployflowError};
use crate::health::HealthChecker;
use crate::stages::Stage;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type InputVarsFn =
    dyn Fn(&PlatformConfig, StageInputs<'_>) -> Result<InputVariableSet, DeployflowError> + Send + Sync;

/// A stage with a configurable contract, variable derivation and check.
///
/// By default it produces no variables, accepts any outputs and passes its check.
pub struct ScriptedStage {
    name: String,
    priority: i32,
    dependencies: Vec<String>,
    input_schema: Schema,
    output_schema: Schema,
    input_vars: Option<Arc<InputVarsFn>>,
    check_failure: Option<String>,
    checks: Arc<AtomicUsize>,
}

impl fmt::Debug for ScriptedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedStage")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl ScriptedStage {
    /// Creates a stage with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            dependencies: Vec::new(),
            input_schema: Schema::new(),
            output_schema: Schema::new(),
            input_vars: None,
            check_failure: None,
            checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declares a dependency on `upstream`.
    #[must_use]
    pub fn depends_on(mut self, upstream: impl Into<String>) -> Self {
        self.dependencies.push(upstream.into());
        self
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = schema;
        self
    }

    /// Sets the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = schema;
        self
    }

    /// Sets the variable derivation.
    #[must_use]
    pub fn with_input_vars<F>(mut self, f: F) -> Self
    where
        F: Fn(&PlatformConfig, StageInputs<'_>) -> Result<InputVariableSet, DeployflowError> + Send + Sync + 'static,
    {
        self.input_vars = Some(Arc::new(f));
        self
    }

    /// Makes the check fail with `message`.
    #[must_use]
    pub fn failing_check(mut self, message: impl Into<String>) -> Self {
        self.check_failure = Some(message.into());
        self
    }

    /// Shared counter of check invocations.
    #[must_use]
    pub fn check_counter(&self) -> Arc<AtomicUsize> {
        self.checks.clone()
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    fn input_schema(&self) -> Schema {
        self.input_schema.clone()
    }

    fn output_schema(&self) -> Schema {
        self.output_schema.clone()
    }

    fn input_vars(
        &self,
        config: &PlatformConfig,
        inputs: StageInputs<'_>,
    ) -> Result<InputVariableSet, DeployflowError> {
        match &self.input_vars {
            Some(f) => f(config, inputs),
            None => Ok(InputVariableSet::default()),
        }
    }

    async fn check(&self, _outputs: &StageOutputMap, _health: &HealthChecker) -> Result<(), DeployflowError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match &self.check_failure {
            Some(message) => Err(CheckFailedError::new(&self.name, message).into()),
            None => Ok(()),
        }
    }
}
