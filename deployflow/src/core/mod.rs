//! Core domain model types for deployflow.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - The per-stage state machine and its legal transitions
//! - Per-stage run records

mod record;
mod status;

pub use record::{PipelineReport, StageRecord};
pub use status::{PipelineState, StageTransition};
