//! Ingress controller and certificates.

use super::{cluster_providers, state_backend, InfrastructureStage};
use crate::config::{CertificateKind, PlatformConfig};
use crate::context::{InputVariableSet, StageInputs};
use crate::contracts::{FieldKind, Schema};
use crate::errors::DeployflowError;
use crate::stages::{ResourceDeclaration, Stage};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Deploys the ingress controller and publishes the platform domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngressStage;

impl IngressStage {
    /// Stage name.
    pub const NAME: &'static str = "04-kubernetes-ingress";
}

#[derive(Serialize)]
struct IngressInputVars<'a> {
    name: &'a str,
    environment: &'a str,
    node_groups: &'a Value,
    domain: Option<&'a str>,
    #[serde(rename = "certificate-service")]
    certificate_service: CertificateKind,
    #[serde(rename = "acme-email")]
    acme_email: Option<&'a str>,
    #[serde(rename = "certificate-secret-name")]
    certificate_secret_name: Option<&'a str>,
}

#[async_trait]
impl Stage for IngressStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        40
    }

    fn dependencies(&self) -> Vec<String> {
        vec![InfrastructureStage::NAME.to_string()]
    }

    fn input_schema(&self) -> Schema {
        Schema::new()
            .required("name", FieldKind::String)
            .required("environment", FieldKind::String)
            .required("node_groups", FieldKind::map_of(FieldKind::map_of(FieldKind::String)))
            .optional("domain", FieldKind::String)
            .required("certificate-service", FieldKind::String)
            .optional("acme-email", FieldKind::String)
            .optional("certificate-secret-name", FieldKind::String)
    }

    fn output_schema(&self) -> Schema {
        Schema::new()
            .required("domain", FieldKind::String)
            .optional("load_balancer_address", FieldKind::Any)
    }

    fn resources(&self, config: &PlatformConfig) -> Vec<ResourceDeclaration> {
        let mut resources = vec![state_backend(Self::NAME, config)];
        resources.extend(cluster_providers(config));
        resources.push(ResourceDeclaration::module("kubernetes-ingress", "./modules/kubernetes/ingress"));
        resources
    }

    fn input_vars(
        &self,
        config: &PlatformConfig,
        inputs: StageInputs<'_>,
    ) -> Result<InputVariableSet, DeployflowError> {
        let node_groups = inputs.require(InfrastructureStage::NAME, "node_selectors")?;
        let certificate = &config.certificate;
        InputVariableSet::from_serializable(&IngressInputVars {
            name: &config.project_name,
            environment: &config.namespace,
            node_groups,
            domain: config.domain.as_deref(),
            certificate_service: certificate.kind,
            acme_email: certificate.acme_email.as_deref(),
            certificate_secret_name: match certificate.kind {
                CertificateKind::Existing => certificate.secret_name.as_deref(),
                _ => None,
            },
        })
    }
}
