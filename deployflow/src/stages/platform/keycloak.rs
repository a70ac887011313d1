//! Keycloak realm configuration.

use super::{cluster_providers, state_backend, IngressStage};
use crate::config::PlatformConfig;
use crate::context::{InputVariableSet, StageInputs};
use crate::contracts::{FieldKind, Schema};
use crate::errors::DeployflowError;
use crate::stages::{ResourceDeclaration, Stage};
use async_trait::async_trait;
use serde::Serialize;

const REALM: &str = "nebari";
const GROUPS: [&str; 4] = ["superadmin", "admin", "developer", "analyst"];
const DEFAULT_GROUPS: [&str; 1] = ["analyst"];

/// Creates the platform realm, its groups and a read-only service user.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeycloakConfigurationStage;

impl KeycloakConfigurationStage {
    /// Stage name.
    pub const NAME: &'static str = "06-kubernetes-keycloak-configuration";
}

#[derive(Serialize)]
struct KeycloakInputVars<'a> {
    realm: &'a str,
    realm_display_name: &'a str,
    endpoint: &'a str,
    keycloak_groups: &'a [&'a str],
    default_groups: &'a [&'a str],
}

#[async_trait]
impl Stage for KeycloakConfigurationStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        60
    }

    fn dependencies(&self) -> Vec<String> {
        vec![IngressStage::NAME.to_string()]
    }

    fn input_schema(&self) -> Schema {
        Schema::new()
            .required("realm", FieldKind::String)
            .required("realm_display_name", FieldKind::String)
            .required("endpoint", FieldKind::String)
            .required("keycloak_groups", FieldKind::list_of(FieldKind::String))
            .required("default_groups", FieldKind::list_of(FieldKind::String))
    }

    fn output_schema(&self) -> Schema {
        Schema::new().required("realm_id", FieldKind::String).required(
            "keycloak-read-only-user-credentials",
            FieldKind::Object(
                Schema::new()
                    .required("username", FieldKind::String)
                    .required("password", FieldKind::String)
                    .required("client_id", FieldKind::String)
                    .required("realm", FieldKind::String),
            ),
        )
    }

    fn resources(&self, config: &PlatformConfig) -> Vec<ResourceDeclaration> {
        let mut resources = vec![state_backend(Self::NAME, config)];
        resources.extend(cluster_providers(config));
        resources.push(ResourceDeclaration::module(
            "kubernetes-keycloak-configuration",
            "./modules/kubernetes/keycloak-configuration",
        ));
        resources
    }

    fn input_vars(
        &self,
        config: &PlatformConfig,
        inputs: StageInputs<'_>,
    ) -> Result<InputVariableSet, DeployflowError> {
        let endpoint = inputs.require_str(IngressStage::NAME, "domain")?;
        InputVariableSet::from_serializable(&KeycloakInputVars {
            realm: REALM,
            realm_display_name: &config.project_name,
            endpoint,
            keycloak_groups: &GROUPS,
            default_groups: &DEFAULT_GROUPS,
        })
    }
}
