//! Platform configuration.
//!
//! The configuration is loaded once, validated once, and then handed
//! read-only to every stage's `input_vars`.

mod parser;
mod types;
mod validator;

pub use parser::{load_config, parse_config_str, substitute_env_vars};
pub use types::{
    AccessLevel, ArgoWorkflows, Certificate, CertificateKind, CloudProvider, CondaStore, DaskWorkerProfile,
    DefaultImages, IdleCuller, JHubApps, JupyterHub, JupyterLab, JupyterLabPioneer, JupyterLabProfile,
    KubeSpawner, Monitoring, MonitoringOverrides, PlatformConfig, Profiles, Storage, Telemetry, TerraformExtension,
    Theme, WorkflowController, DEFAULT_IMAGE_TAG,
};
pub use validator::validate_config;
