//! Lifecycle events emitted by the pipeline and the health checker.
//!
//! Sinks are passed explicitly to the executor and checker; there is no
//! process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names.
pub mod types {
    /// A pipeline run started.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// A pipeline run finished with every stage done.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A pipeline run moved to `FAILED`.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A stage moved between states.
    pub const STAGE_STATE: &str = "stage.state";
    /// A stage passed its check.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// One health-check attempt finished.
    pub const HEALTH_ATTEMPT: &str = "health.attempt";
    /// A health-check target exhausted its attempts.
    pub const HEALTH_DOWN: &str = "health.down";
}
