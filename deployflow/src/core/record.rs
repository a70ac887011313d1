//! Per-stage run records.

use super::PipelineState;
use crate::context::StageOutputMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one stage during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub name: String,
    /// Stage priority.
    pub priority: i32,
    /// Last state the stage reached.
    pub state: PipelineState,
    /// When the stage left `Pending`.
    pub started_at: DateTime<Utc>,
    /// Wall time spent on the stage in milliseconds.
    pub duration_ms: f64,
    /// Whether the post-apply check ran.
    pub checked: bool,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Identifier of the run.
    pub run_id: uuid::Uuid,
    /// Every stage's outputs.
    pub outputs: StageOutputMap,
    /// Per-stage records in run order.
    pub stages: Vec<StageRecord>,
    /// Total run time in milliseconds.
    pub duration_ms: f64,
}

impl PipelineReport {
    /// Names of the stages that ran, in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}
