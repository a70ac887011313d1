//! The apply engine boundary.

use crate::context::{InputVariableSet, StageOutputs};
use crate::errors::ApplyError;
use crate::stages::ResourceDeclaration;
use async_trait::async_trait;

/// Turns a stage's declarations and variables into real infrastructure.
///
/// A call is all-or-nothing: it returns the stage's flat output map, or an
/// error with a diagnostic. The executor never retries it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplyEngine: Send + Sync {
    /// Applies one stage.
    async fn apply(
        &self,
        stage: &str,
        resources: &[ResourceDeclaration],
        variables: &InputVariableSet,
    ) -> Result<StageOutputs, ApplyError>;
}
