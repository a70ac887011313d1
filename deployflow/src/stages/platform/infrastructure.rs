//! Cluster provisioning.

use super::{state_backend, LOCAL_KUBECONFIG};
use crate::config::{CloudProvider, PlatformConfig};
use crate::context::{InputVariableSet, StageInputs};
use crate::contracts::{FieldKind, Schema};
use crate::errors::DeployflowError;
use crate::stages::{ResourceDeclaration, Stage};
use async_trait::async_trait;
use serde::Serialize;

/// Creates the Kubernetes cluster and reports its node selectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfrastructureStage;

impl InfrastructureStage {
    /// Stage name.
    pub const NAME: &'static str = "02-infrastructure";
}

#[derive(Serialize)]
struct InfrastructureInputVars<'a> {
    name: &'a str,
    environment: &'a str,
    cloud_provider: String,
    region: Option<&'a str>,
    kubernetes_version: Option<&'a str>,
    kubeconfig_filename: String,
}

#[async_trait]
impl Stage for InfrastructureStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        20
    }

    fn input_schema(&self) -> Schema {
        Schema::new()
            .required("name", FieldKind::String)
            .required("environment", FieldKind::String)
            .required("cloud_provider", FieldKind::String)
            .optional("region", FieldKind::String)
            .optional("kubernetes_version", FieldKind::String)
            .required("kubeconfig_filename", FieldKind::String)
    }

    fn output_schema(&self) -> Schema {
        Schema::new()
            .required("kubeconfig_filename", FieldKind::String)
            .required("node_selectors", FieldKind::map_of(FieldKind::map_of(FieldKind::String)))
            .optional("nfs_endpoint", FieldKind::String)
    }

    fn resources(&self, config: &PlatformConfig) -> Vec<ResourceDeclaration> {
        vec![
            state_backend(Self::NAME, config),
            ResourceDeclaration::module("infrastructure", format!("./modules/infrastructure/{}", config.provider)),
        ]
    }

    fn input_vars(
        &self,
        config: &PlatformConfig,
        _inputs: StageInputs<'_>,
    ) -> Result<InputVariableSet, DeployflowError> {
        let kubeconfig_filename = match config.provider {
            CloudProvider::Local | CloudProvider::Existing => LOCAL_KUBECONFIG.to_string(),
            _ => format!("{}-{}-kubeconfig", config.project_name, config.namespace),
        };
        InputVariableSet::from_serializable(&InfrastructureInputVars {
            name: &config.project_name,
            environment: &config.namespace,
            cloud_provider: config.provider.to_string(),
            region: config.region.as_deref(),
            kubernetes_version: config.kubernetes_version.as_deref(),
            kubeconfig_filename,
        })
    }
}
