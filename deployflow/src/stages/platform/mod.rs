//! The base platform stages.

mod infrastructure;
mod ingress;
mod keycloak;
mod services;

pub use infrastructure::InfrastructureStage;
pub use ingress::IngressStage;
pub use keycloak::KeycloakConfigurationStage;
pub use services::KubernetesServicesStage;

use super::{ResourceDeclaration, Stage, StageProvider};
use crate::config::{CloudProvider, PlatformConfig};
use serde_json::json;
use std::sync::Arc;

/// Path of the kubeconfig used by local and existing clusters.
pub(crate) const LOCAL_KUBECONFIG: &str = "~/.kube/config";

/// Contributes the four stages every deployment runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasePlatformStages;

impl StageProvider for BasePlatformStages {
    fn provides_stages(&self) -> Vec<Arc<dyn Stage>> {
        vec![
            Arc::new(InfrastructureStage),
            Arc::new(IngressStage),
            Arc::new(KeycloakConfigurationStage),
            Arc::new(KubernetesServicesStage),
        ]
    }
}

/// Remote state location for `stage`, keyed by project and namespace.
pub(crate) fn state_backend(stage: &str, config: &PlatformConfig) -> ResourceDeclaration {
    let prefix = format!("{}-{}", config.project_name, config.namespace);
    match config.provider {
        CloudProvider::Local | CloudProvider::Existing => ResourceDeclaration::backend(
            "kubernetes",
            json!({
                "secret_suffix": format!("{prefix}-{stage}"),
                "load_config_file": true,
                "config_path": LOCAL_KUBECONFIG,
            }),
        ),
        CloudProvider::Aws => ResourceDeclaration::backend(
            "s3",
            json!({
                "bucket": format!("{prefix}-terraform-state"),
                "key": format!("terraform/{prefix}/{stage}.tfstate"),
                "region": config.region,
                "encrypt": true,
                "dynamodb_table": format!("{prefix}-terraform-state-lock"),
            }),
        ),
        CloudProvider::Gcp => ResourceDeclaration::backend(
            "gcs",
            json!({
                "bucket": format!("{prefix}-terraform-state"),
                "prefix": format!("terraform/{prefix}/{stage}"),
            }),
        ),
        CloudProvider::Azure => {
            let account: String = format!("{}{}", config.project_name, config.namespace)
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .take(24)
                .collect::<String>()
                .to_ascii_lowercase();
            ResourceDeclaration::backend(
                "azurerm",
                json!({
                    "resource_group_name": format!("{prefix}-state"),
                    "storage_account_name": account,
                    "container_name": format!("{prefix}-state"),
                    "key": format!("terraform/{prefix}/{stage}"),
                }),
            )
        }
    }
}

/// Kubernetes and Helm providers pointing at the platform cluster.
pub(crate) fn cluster_providers(config: &PlatformConfig) -> [ResourceDeclaration; 2] {
    let cluster = match config.provider {
        CloudProvider::Local | CloudProvider::Existing => json!({ "config_path": LOCAL_KUBECONFIG }),
        _ => json!({}),
    };
    [
        ResourceDeclaration::provider("kubernetes", cluster.clone()),
        ResourceDeclaration::provider("helm", json!({ "kubernetes": cluster })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_contributes_base_stages_in_priority_order() {
        let stages = BasePlatformStages.provides_stages();
        let names: Vec<_> = stages.iter().map(|s| (s.name().to_string(), s.priority())).collect();
        assert_eq!(
            names,
            vec![
                ("02-infrastructure".to_string(), 20),
                ("04-kubernetes-ingress".to_string(), 40),
                ("06-kubernetes-keycloak-configuration".to_string(), 60),
                ("07-kubernetes-services".to_string(), 70),
            ]
        );
    }

    #[test]
    fn test_state_backend_per_provider() {
        let mut config = PlatformConfig::new("demo");
        let ResourceDeclaration::Backend { backend, config: body } = state_backend("07-kubernetes-services", &config)
        else {
            panic!("expected backend");
        };
        assert_eq!(backend, "kubernetes");
        assert_eq!(body["secret_suffix"], "demo-dev-07-kubernetes-services");

        config.provider = CloudProvider::Azure;
        config.project_name = "My-Proj".into();
        let ResourceDeclaration::Backend { backend, config: body } = state_backend("02-infrastructure", &config) else {
            panic!("expected backend");
        };
        assert_eq!(backend, "azurerm");
        assert_eq!(body["storage_account_name"], "myprojdev");
    }
}
