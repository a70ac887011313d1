//! Data flowing between stages during one run.
//!
//! This module provides:
//! - The write-once map of every stage's outputs
//! - A read view restricted to a stage's declared dependencies
//! - The immutable input variable set handed to the apply engine

mod bags;
mod inputs;
mod variables;

pub use bags::{StageOutputMap, StageOutputs};
pub use inputs::StageInputs;
pub use variables::{InputVariableSet, InputVariableSetBuilder};
pub(crate) use variables::json_type_name;
