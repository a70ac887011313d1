//! Stage contracts and stage discovery.
//!
//! A stage is one unit of provisioning. It declares a name, a priority, the
//! upstream stages whose outputs it reads, and a schema for both its input
//! variables and its outputs. The executor drives the rest.

mod platform;
mod resources;

pub use platform::{
    BasePlatformStages, InfrastructureStage, IngressStage, KeycloakConfigurationStage, KubernetesServicesStage,
};
pub use resources::{terraform_document, ResourceDeclaration};

use crate::config::PlatformConfig;
use crate::context::{InputVariableSet, StageInputs, StageOutputMap};
use crate::contracts::Schema;
use crate::errors::DeployflowError;
use crate::health::HealthChecker;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// A pipeline stage and its boundary contract.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Unique name; also the stage's directory and state identifier.
    fn name(&self) -> &str;

    /// Ordering key. Lower runs first.
    fn priority(&self) -> i32;

    /// Stages whose outputs `input_vars` reads.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Contract for the variables produced by `input_vars`.
    fn input_schema(&self) -> Schema {
        Schema::new()
    }

    /// Contract for the outputs returned by the apply engine.
    fn output_schema(&self) -> Schema {
        Schema::new()
    }

    /// Infrastructure objects handed to the apply engine.
    fn resources(&self, _config: &PlatformConfig) -> Vec<ResourceDeclaration> {
        Vec::new()
    }

    /// Derives this stage's variables from the configuration and upstream
    /// outputs. Must not have side effects.
    ///
    /// # Errors
    ///
    /// Returns [`DeployflowError::MissingDependency`] when an upstream key is
    /// absent. Missing keys are never defaulted.
    fn input_vars(&self, config: &PlatformConfig, inputs: StageInputs<'_>) -> Result<InputVariableSet, DeployflowError>;

    /// Post-apply verification. `outputs` already contains this stage's entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the deployed stage is not healthy.
    async fn check(&self, _outputs: &StageOutputMap, _health: &HealthChecker) -> Result<(), DeployflowError> {
        Ok(())
    }

    /// Snapshot of the stage's identity and contract.
    fn descriptor(&self) -> StageDescriptor {
        StageDescriptor {
            name: self.name().to_string(),
            priority: self.priority(),
            dependencies: self.dependencies(),
            input_schema: self.input_schema(),
            output_schema: self.output_schema(),
        }
    }
}

/// Identity and contract of a stage, detached from its behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDescriptor {
    /// Unique name.
    pub name: String,
    /// Ordering key.
    pub priority: i32,
    /// Upstream stages read by `input_vars`.
    pub dependencies: Vec<String>,
    /// Input contract.
    pub input_schema: Schema,
    /// Output contract.
    pub output_schema: Schema,
}

/// A unit that contributes stages, such as an add-on package.
pub trait StageProvider: Send + Sync {
    /// Returns the stages this unit contributes.
    fn provides_stages(&self) -> Vec<Arc<dyn Stage>>;
}
