//! Stage registration and execution.
//!
//! This module provides:
//! - The stage registry and its priority ordering
//! - The apply engine boundary and a Terraform implementation
//! - The executor state machine
//! - Rendering stage directories without applying

mod apply;
mod executor;
mod registry;
mod render;
mod terraform;


pub use apply::ApplyEngine;
#[cfg(test)]
pub use apply::MockApplyEngine;
pub use executor::{ExecutorOptions, PipelineExecutor};
pub use registry::StageRegistry;
pub use render::{render_stages, stage_directory, write_stage, TERRAFORM_FILE};
pub use terraform::{flatten_outputs, TerraformApplyEngine, VAR_FILE};
