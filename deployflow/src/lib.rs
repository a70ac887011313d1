//! # Deployflow
//!
//! Staged deployment of a multi-tenant data-science platform onto managed
//! Kubernetes.
//!
//! A deployment is an ordered series of stages. Each stage declares the
//! infrastructure it applies, the input variables it derives from the
//! platform configuration and from earlier stages' outputs, and an optional
//! post-apply check. The pipeline provides:
//!
//! - **Ordered registration**: stages run by ascending priority, and a stage
//!   may only depend on stages that run before it
//! - **Typed contracts**: input and output schemas are validated around each apply
//! - **Health checks**: bounded retries against service URLs after a stage applies
//! - **Version resolution**: cached lookups of the Kubernetes versions a
//!   provider offers in a region
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deployflow::prelude::*;
//!
//! let mut registry = StageRegistry::new();
//! registry.register_provider(&BasePlatformStages)?;
//!
//! let engine = Arc::new(TerraformApplyEngine::new("./deploy"));
//! let executor = PipelineExecutor::new(registry, engine, HealthChecker::http()?);
//!
//! let config = load_config(Path::new("nebari-config.yaml"))?;
//! let report = executor.run(&config).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod health;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod versions;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{load_config, parse_config_str, CloudProvider, PlatformConfig};
    pub use crate::context::{InputVariableSet, StageInputs, StageOutputMap, StageOutputs};
    pub use crate::contracts::{FieldKind, Schema};
    pub use crate::core::{PipelineReport, PipelineState, StageRecord};
    pub use crate::errors::{ContractErrorInfo, DeployflowError, PipelineFailure};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::health::{HealthCheckPolicy, HealthChecker};
    pub use crate::pipeline::{ApplyEngine, PipelineExecutor, StageRegistry, TerraformApplyEngine};
    pub use crate::stages::{BasePlatformStages, ResourceDeclaration, Stage, StageProvider};
    pub use crate::versions::{SupportPolicy, VersionResolver};
}
