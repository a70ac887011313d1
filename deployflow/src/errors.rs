//! Error types for the deployflow pipeline.
//!
//! Every failure a pipeline run can report has a dedicated struct carrying
//! the identifying detail an operator needs (stage, field path, variable
//! name or URL) plus a [`ContractErrorInfo`] with a code and a fix hint.

use crate::core::PipelineState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for deployflow operations.
#[derive(Debug, Error)]
pub enum DeployflowError {
    /// A stage with the same name is already registered.
    #[error("{0}")]
    DuplicateStage(#[from] DuplicateStageError),

    /// A registration would run a stage before one of its dependencies.
    #[error("{0}")]
    PriorityInversion(#[from] PriorityInversionError),

    /// An upstream output a stage needs is absent.
    #[error("{0}")]
    MissingDependency(#[from] MissingDependencyError),

    /// A stage read outputs of a stage it did not declare.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// An input variable set violated the stage's input schema.
    #[error("{0}")]
    SchemaValidation(#[from] SchemaValidationError),

    /// Apply outputs violated the stage's output schema.
    #[error("{0}")]
    OutputContract(#[from] OutputContractError),

    /// The apply engine reported a failure.
    #[error("{0}")]
    Apply(#[from] ApplyError),

    /// Cloud credentials are missing from the environment.
    #[error("{0}")]
    CredentialsMissing(#[from] CredentialsMissingError),

    /// A health-check target never came up.
    #[error("{0}")]
    HealthCheckTimeout(#[from] HealthCheckTimeoutError),

    /// A stage check failed for a reason other than a health timeout.
    #[error("{0}")]
    CheckFailed(#[from] CheckFailedError),

    /// The platform configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage output was written twice during one run.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// An HTTP request failed outside of health checking.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployflowError {
    /// Returns the contract info attached to this error.
    ///
    /// Pass-through variants (`Http`, `Serialization`, `Internal`, `Io`)
    /// carry none.
    #[must_use]
    pub fn error_info(&self) -> Option<&ContractErrorInfo> {
        match self {
            Self::DuplicateStage(e) => Some(&e.error_info),
            Self::PriorityInversion(e) => Some(&e.error_info),
            Self::MissingDependency(e) => Some(&e.error_info),
            Self::UndeclaredDependency(e) => Some(&e.error_info),
            Self::SchemaValidation(e) => Some(&e.error_info),
            Self::OutputContract(e) => Some(&e.error_info),
            Self::CredentialsMissing(e) => Some(&e.error_info),
            Self::HealthCheckTimeout(e) => Some(&e.error_info),
            Self::Apply(e) => Some(&e.error_info),
            Self::CheckFailed(e) => Some(&e.error_info),
            Self::Config(e) => Some(&e.error_info),
            Self::OutputConflict(e) => Some(&e.error_info),
            Self::Http(_) | Self::Serialization(_) | Self::Internal(_) | Self::Io(_) => None,
        }
    }

    /// Returns whether the pipeline may retry this failure on its own.
    ///
    /// Always false: only the health checker retries, and it does so
    /// internally before surfacing [`HealthCheckTimeoutError`].
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for DeployflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-001-MISSING_DEP").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// URL to documentation.
    pub doc_url: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            doc_url: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Sets the documentation URL.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when registering a stage name twice.
#[derive(Debug, Clone, Error)]
#[error("Stage '{name}' is already registered")]
pub struct DuplicateStageError {
    /// The duplicated stage name.
    pub name: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl DuplicateStageError {
    /// Creates a new duplicate stage error.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let info = ContractErrorInfo::new(
            "CONTRACT-001-DUPLICATE",
            format!("Stage '{name}' was contributed by more than one provider"),
        )
        .with_fix_hint("Stage names double as state identifiers and must be unique.");
        Self {
            name,
            error_info: info,
        }
    }
}

/// Error raised when a stage's priority would place it before a dependency.
#[derive(Debug, Clone, Error)]
#[error(
    "Stage '{stage}' (priority {stage_priority}) depends on '{dependency}' \
     (priority {dependency_priority}) which would run after it"
)]
pub struct PriorityInversionError {
    /// The dependent stage.
    pub stage: String,
    /// The upstream stage.
    pub dependency: String,
    /// Priority of the dependent stage.
    pub stage_priority: i32,
    /// Priority of the upstream stage.
    pub dependency_priority: i32,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl PriorityInversionError {
    /// Creates a new priority inversion error.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        stage_priority: i32,
        dependency: impl Into<String>,
        dependency_priority: i32,
    ) -> Self {
        let stage = stage.into();
        let dependency = dependency.into();
        let info = ContractErrorInfo::new(
            "CONTRACT-002-PRIORITY",
            format!("'{stage}' is ordered before its dependency '{dependency}'"),
        )
        .with_fix_hint("Give the dependent stage a strictly greater priority than its dependency.");
        Self {
            stage,
            dependency,
            stage_priority,
            dependency_priority,
            error_info: info,
        }
    }
}

/// Error raised when a required upstream output is absent.
///
/// This points at a registry ordering bug and is never retried.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' requires '{key}' from '{upstream}' but it is missing")]
pub struct MissingDependencyError {
    /// The stage resolving its inputs.
    pub stage: String,
    /// The upstream stage expected to produce the key.
    pub upstream: String,
    /// The missing key path.
    pub key: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl MissingDependencyError {
    /// Creates a new missing dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, upstream: impl Into<String>, key: impl Into<String>) -> Self {
        let stage = stage.into();
        let upstream = upstream.into();
        let key = key.into();
        let info = ContractErrorInfo::new(
            "CONTRACT-003-MISSING_DEP",
            format!("Output '{upstream}.{key}' was not produced before '{stage}' ran"),
        )
        .with_fix_hint(
            "Check that the upstream stage is registered, has a lower priority, \
             and declares the key in its output schema.",
        );
        Self {
            stage,
            upstream,
            key,
            error_info: info,
        }
    }
}

/// Error raised when accessing an undeclared dependency.
#[derive(Debug, Clone, Error)]
#[error(
    "Undeclared dependency: stage '{stage}' attempted to read outputs of '{upstream}' \
     which was not declared as a dependency"
)]
pub struct UndeclaredDependencyError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared upstream stage.
    pub upstream: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, upstream: impl Into<String>) -> Self {
        let stage = stage.into();
        let upstream = upstream.into();
        let info = ContractErrorInfo::new(
            "CONTRACT-004-UNDECLARED",
            format!("'{stage}' read '{upstream}' without declaring it"),
        )
        .with_fix_hint("Add the upstream stage to the stage's dependency list.");
        Self {
            stage,
            upstream,
            error_info: info,
        }
    }
}

/// Error raised when an input variable set violates its schema.
#[derive(Debug, Clone, Error)]
#[error("Input schema violation in stage '{stage}' at '{path}': {message}")]
pub struct SchemaValidationError {
    /// The stage whose inputs failed validation.
    pub stage: String,
    /// Dotted path of the offending field.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl SchemaValidationError {
    /// Creates a new schema validation error.
    #[must_use]
    pub fn new(stage: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        let path = path.into();
        let info = ContractErrorInfo::new("CONTRACT-005-INPUT_SCHEMA", format!("Invalid input '{path}'"))
            .with_fix_hint("Fix the configuration value feeding this variable.")
            .with_context_entry("stage", stage.clone());
        Self {
            stage,
            path,
            message: message.into(),
            error_info: info,
        }
    }
}

/// Error raised when apply outputs violate the output schema.
#[derive(Debug, Clone, Error)]
#[error("Output contract violation in stage '{stage}' at '{path}': {message}")]
pub struct OutputContractError {
    /// The stage whose outputs failed validation.
    pub stage: String,
    /// Dotted path of the offending field.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl OutputContractError {
    /// Creates a new output contract error.
    #[must_use]
    pub fn new(stage: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        let path = path.into();
        let info = ContractErrorInfo::new("CONTRACT-006-OUTPUT_SCHEMA", format!("Invalid output '{path}'"))
            .with_fix_hint("The stage's infrastructure code no longer emits what its contract promises.")
            .with_context_entry("stage", stage.clone());
        Self {
            stage,
            path,
            message: message.into(),
            error_info: info,
        }
    }
}

/// Error reported by the external apply engine.
#[derive(Debug, Clone, Error)]
#[error("Apply failed for stage '{stage}': {message}")]
pub struct ApplyError {
    /// The stage being applied.
    pub stage: String,
    /// Diagnostic message from the engine.
    pub message: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl ApplyError {
    /// Creates a new apply error.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        let info = ContractErrorInfo::new("APPLY-001-ENGINE", format!("Infrastructure apply failed for '{stage}'"))
            .with_fix_hint("Read the engine output above; the stage can be re-run once the cause is fixed.")
            .with_context_entry("stage", stage.clone());
        Self {
            stage,
            message: message.into(),
            error_info: info,
        }
    }
}

/// Error raised when cloud credentials are absent.
#[derive(Debug, Clone, Error)]
#[error(
    "Missing the following required environment variable(s) for {provider}: {}\n\
     Please see the documentation for more information: {doc_url}",
    .missing.join(", ")
)]
pub struct CredentialsMissingError {
    /// The cloud provider.
    pub provider: String,
    /// Names of every missing variable, sorted.
    pub missing: Vec<String>,
    /// Where the operator can read about setting them.
    pub doc_url: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CredentialsMissingError {
    /// Creates a new credentials missing error.
    #[must_use]
    pub fn new(provider: impl Into<String>, mut missing: Vec<String>, doc_url: impl Into<String>) -> Self {
        missing.sort();
        let provider = provider.into();
        let doc_url = doc_url.into();
        let info = ContractErrorInfo::new(
            "ENV-001-CREDENTIALS",
            format!("{} credential variable(s) not set", missing.len()),
        )
        .with_fix_hint("Export every listed variable, then run the command again.")
        .with_doc_url(doc_url.clone());
        Self {
            provider,
            missing,
            doc_url,
            error_info: info,
        }
    }
}

/// Error raised when a health-check target exhausts its attempt budget.
#[derive(Debug, Clone, Error)]
#[error("Service {service} DOWN when checking url={url} after {attempts} attempt(s)")]
pub struct HealthCheckTimeoutError {
    /// The sub-service name.
    pub service: String,
    /// The URL that never answered below 400.
    pub url: String,
    /// Attempts made.
    pub attempts: u32,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl HealthCheckTimeoutError {
    /// Creates a new health check timeout error.
    #[must_use]
    pub fn new(service: impl Into<String>, url: impl Into<String>, attempts: u32) -> Self {
        let service = service.into();
        let url = url.into();
        let info = ContractErrorInfo::new("HEALTH-001-TIMEOUT", format!("{service} did not become reachable"))
            .with_fix_hint("Inspect the service's pods and ingress; the rollout may still be in progress.")
            .with_context_entry("url", url.clone());
        Self {
            service,
            url,
            attempts,
            error_info: info,
        }
    }
}

/// Error raised by a stage check that is not a health timeout.
#[derive(Debug, Clone, Error)]
#[error("Check failed for stage '{stage}': {message}")]
pub struct CheckFailedError {
    /// The stage being checked.
    pub stage: String,
    /// Reason.
    pub message: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CheckFailedError {
    /// Creates a new check failure.
    #[must_use]
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        let stage = stage.into();
        let info = ContractErrorInfo::new("CHECK-001-FAILED", format!("Post-apply check of '{stage}' failed"))
            .with_fix_hint("Confirm the stage's outputs describe what was deployed.")
            .with_context_entry("stage", stage.clone());
        Self {
            stage,
            message: message.into(),
            error_info: info,
        }
    }
}

/// Error raised when the platform configuration fails to load or validate.
#[derive(Debug, Clone, Error)]
#[error("Invalid configuration:\n  - {}", .messages.join("\n  - "))]
pub struct ConfigError {
    /// Every problem found.
    pub messages: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl ConfigError {
    /// Creates a config error with a single message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_messages(vec![message.into()])
    }

    /// Creates a config error from collected messages.
    #[must_use]
    pub fn from_messages(messages: Vec<String>) -> Self {
        let info = ContractErrorInfo::new("CONFIG-001-INVALID", format!("{} configuration problem(s)", messages.len()))
            .with_fix_hint("Edit the platform configuration file and load it again.");
        Self {
            messages,
            error_info: info,
        }
    }
}

/// Error raised when writing to an existing output in the output map.
#[derive(Debug, Clone, Error)]
#[error("Output conflict for stage '{stage}': outputs were already recorded")]
pub struct OutputConflictError {
    /// The stage name.
    pub stage: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        let info = ContractErrorInfo::new("CONTRACT-007-OUTPUT_CONFLICT", format!("'{stage}' recorded outputs twice"))
            .with_fix_hint("Stage names must be unique within a run.");
        Self {
            stage,
            error_info: info,
        }
    }
}

/// A pipeline run that reached the `FAILED` state.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed while {state}: {error}")]
pub struct PipelineFailure {
    /// The stage that failed.
    pub stage: String,
    /// The state the stage was in when it failed.
    pub state: PipelineState,
    /// The causing condition.
    #[source]
    pub error: DeployflowError,
    /// Stages that completed before the failure, in run order.
    pub completed: Vec<String>,
}

impl PipelineFailure {
    /// Creates a new pipeline failure.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        state: PipelineState,
        error: DeployflowError,
        completed: Vec<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            state,
            error,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "my_stage");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.summary, "Test error");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"my_stage".to_string()));
    }

    #[test]
    fn test_missing_dependency_names_key() {
        let err = MissingDependencyError::new("07-kubernetes-services", "04-kubernetes-ingress", "domain");
        let msg = err.to_string();
        assert!(msg.contains("07-kubernetes-services"));
        assert!(msg.contains("04-kubernetes-ingress"));
        assert!(msg.contains("domain"));
        assert_eq!(err.error_info.code, "CONTRACT-003-MISSING_DEP");
    }

    #[test]
    fn test_credentials_missing_lists_sorted_names() {
        let err = CredentialsMissingError::new(
            "azure",
            vec!["ARM_TENANT_ID".to_string(), "ARM_CLIENT_ID".to_string()],
            "https://example.com/docs",
        );
        assert_eq!(err.missing, vec!["ARM_CLIENT_ID", "ARM_TENANT_ID"]);
        let msg = err.to_string();
        assert!(msg.contains("ARM_CLIENT_ID, ARM_TENANT_ID"));
        assert!(msg.contains("https://example.com/docs"));
    }

    #[test]
    fn test_health_timeout_message_has_url() {
        let err = HealthCheckTimeoutError::new("jupyterhub", "https://example.com/hub/health", 10);
        assert_eq!(
            err.to_string(),
            "Service jupyterhub DOWN when checking url=https://example.com/hub/health after 10 attempt(s)"
        );
    }

    #[test]
    fn test_pipeline_failure_display() {
        let failure = PipelineFailure::new(
            "B",
            PipelineState::ResolvingInputs,
            MissingDependencyError::new("B", "A", "x").into(),
            vec![],
        );
        let msg = failure.to_string();
        assert!(msg.starts_with("Stage 'B' failed while resolving_inputs"));
        assert!(msg.contains("requires 'x' from 'A'"));
    }

    #[test]
    fn test_config_error_lists_all_messages() {
        let err = ConfigError::from_messages(vec!["first".into(), "second".into()]);
        let msg = err.to_string();
        assert!(msg.contains("- first"));
        assert!(msg.contains("- second"));
    }

    #[test]
    fn test_nothing_is_retryable() {
        let err: DeployflowError = ApplyError::new("s", "boom").into();
        assert!(!err.is_retryable());
        assert!(!DeployflowError::Internal("x".into()).is_retryable());
    }

    #[test]
    fn test_every_taxonomy_error_carries_info() {
        let errors: Vec<DeployflowError> = vec![
            DuplicateStageError::new("a").into(),
            PriorityInversionError::new("b", 10, "a", 20).into(),
            MissingDependencyError::new("b", "a", "x").into(),
            UndeclaredDependencyError::new("b", "c").into(),
            SchemaValidationError::new("b", "region", "field required").into(),
            OutputContractError::new("b", "domain", "field required").into(),
            ApplyError::new("b", "boom").into(),
            CredentialsMissingError::new("azure", vec!["ARM_TENANT_ID".into()], "https://docs").into(),
            HealthCheckTimeoutError::new("hub", "https://d/hub/api/", 3).into(),
            CheckFailedError::new("b", "no urls").into(),
            ConfigError::new("project_name is empty").into(),
            OutputConflictError::new("b").into(),
        ];
        for err in &errors {
            let info = err.error_info().unwrap_or_else(|| panic!("no info for {err}"));
            assert!(!info.code.is_empty());
            assert!(info.fix_hint.is_some());
        }

        assert_eq!(
            ApplyError::new("07-kubernetes-services", "exit 1").error_info.context.get("stage"),
            Some(&"07-kubernetes-services".to_string())
        );
        assert!(DeployflowError::Http("refused".into()).error_info().is_none());
    }
}
