//! Application services: JupyterHub, conda-store, Dask Gateway, monitoring,
//! Argo Workflows and telemetry.

use super::{cluster_providers, state_backend, InfrastructureStage, IngressStage, KeycloakConfigurationStage};
use crate::config::{CertificateKind, PlatformConfig};
use crate::context::{InputVariableSet, StageInputs, StageOutputMap};
use crate::contracts::{FieldKind, Schema};
use crate::errors::{CheckFailedError, DeployflowError};
use crate::health::HealthChecker;
use crate::stages::{ResourceDeclaration, Stage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::info;
use url::form_urlencoded;

const FORWARDAUTH_MIDDLEWARE_NAME: &str = "traefik-forward-auth";

/// Deploys the user-facing services and health-checks their endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct KubernetesServicesStage;

impl KubernetesServicesStage {
    /// Stage name.
    pub const NAME: &'static str = "07-kubernetes-services";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ImageNameTag {
    name: String,
    tag: String,
}

/// Splits `name:tag` at the last colon so registry ports survive.
fn split_image(image: &str) -> Result<ImageNameTag, DeployflowError> {
    image
        .rsplit_once(':')
        .map(|(name, tag)| ImageNameTag {
            name: name.to_string(),
            tag: tag.to_string(),
        })
        .ok_or_else(|| DeployflowError::Internal(format!("image '{image}' has no tag")))
}

/// A single-element list holding the JSON encoding of `value`.
fn json_override(value: &Map<String, Value>) -> Result<Vec<String>, DeployflowError> {
    Ok(vec![serde_json::to_string(value)?])
}

/// Chains every extension's logout endpoint in front of the hub login page.
///
/// The host and each extension's logout path are kept verbatim; only the
/// previous link is form-encoded into `redirect_uri`.
fn logout_redirect_url(domain: &str, config: &PlatformConfig) -> String {
    let mut uri = format!("https://{domain}/hub/login");
    for ext in config.tf_extensions.iter().filter(|ext| !ext.logout.is_empty()) {
        let encoded: String = form_urlencoded::byte_serialize(uri.as_bytes()).collect();
        uri = format!("https://{domain}/{}{}?redirect_uri={encoded}", ext.urlslug, ext.logout);
    }
    uri
}

fn token_scopes() -> Value {
    let viewer = json!({"primary_namespace": "", "role_bindings": {"*/*": ["viewer"]}});
    json!({
        "dask-gateway": viewer,
        "argo-workflows-jupyter-scheduler": viewer,
        "jhub-apps": viewer,
    })
}

#[derive(Serialize)]
struct SharedVars<'a> {
    name: &'a str,
    environment: &'a str,
    endpoint: &'a str,
    realm_id: &'a str,
    node_groups: &'a Value,
    #[serde(rename = "jupyterhub-logout-redirect-url")]
    jupyterhub_logout_redirect_url: String,
    forwardauth_middleware_name: &'static str,
    cert_secret_name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct CondaStoreVars<'a> {
    conda_store_environments: &'a BTreeMap<String, Value>,
    conda_store_default_namespace: &'a str,
    conda_store_filesystem_storage: &'a str,
    conda_store_object_storage: &'a str,
    conda_store_extra_settings: &'a Map<String, Value>,
    conda_store_extra_config: &'a str,
    conda_store_image: &'a str,
    conda_store_image_tag: &'a str,
    conda_store_service_token_scopes: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct JupyterHubVars<'a> {
    jupyterhub_theme: Map<String, Value>,
    jupyterlab_image: ImageNameTag,
    jupyterlab_default_settings: &'a Map<String, Value>,
    initial_repositories: String,
    jupyterhub_overrides: Vec<String>,
    jupyterhub_shared_storage: &'a str,
    jupyterhub_shared_endpoint: Option<&'a str>,
    jupyterlab_profiles: &'a [crate::config::JupyterLabProfile],
    jupyterhub_image: ImageNameTag,
    #[serde(rename = "jupyterhub-hub-extraEnv")]
    jupyterhub_hub_extra_env: String,
    idle_culler_settings: &'a crate::config::IdleCuller,
    argo_workflows_enabled: bool,
    jhub_apps_enabled: bool,
    cloud_provider: String,
    jupyterlab_preferred_dir: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct DaskGatewayVars<'a> {
    dask_worker_image: ImageNameTag,
    dask_gateway_profiles: &'a BTreeMap<String, crate::config::DaskWorkerProfile>,
    cloud_provider: String,
    #[serde(rename = "forwardauth_middleware_name")]
    forwardauth_middleware_name: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct MonitoringVars {
    monitoring_enabled: bool,
    minio_enabled: bool,
    grafana_loki_overrides: Vec<String>,
    grafana_promtail_overrides: Vec<String>,
    grafana_loki_minio_overrides: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ArgoWorkflowsVars<'a> {
    argo_workflows_enabled: bool,
    argo_workflows_overrides: Vec<String>,
    nebari_workflow_controller: bool,
    workflow_controller_image_tag: &'a str,
    keycloak_read_only_user_credentials: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct TelemetryVars<'a> {
    jupyterlab_pioneer_enabled: bool,
    jupyterlab_pioneer_log_format: Option<&'a str>,
}

/// One entry of the stage's `service_urls` output.
#[derive(Debug, Deserialize)]
struct ServiceUrl {
    #[serde(default)]
    health_url: Option<String>,
}

fn jupyterhub_theme(config: &PlatformConfig) -> Map<String, Value> {
    let mut theme = config.theme.jupyterhub.clone();
    let display_version = match theme.get("display_version") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        _ => false,
    };
    let has_version = theme
        .get("version")
        .is_some_and(|v| v.as_str().map_or(!v.is_null(), |s| !s.is_empty()));
    if display_version && !has_version {
        theme.insert("version".into(), Value::from(format!("v{}", config.nebari_version)));
    }
    theme
}

#[async_trait]
impl Stage for KubernetesServicesStage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        70
    }

    fn dependencies(&self) -> Vec<String> {
        vec![
            InfrastructureStage::NAME.to_string(),
            IngressStage::NAME.to_string(),
            KeycloakConfigurationStage::NAME.to_string(),
        ]
    }

    fn input_schema(&self) -> Schema {
        let image = || {
            FieldKind::Object(
                Schema::new()
                    .required("name", FieldKind::String)
                    .required("tag", FieldKind::String),
            )
        };
        let overrides = || FieldKind::list_of(FieldKind::String);
        Schema::new()
            .required("name", FieldKind::String)
            .required("environment", FieldKind::String)
            .required("endpoint", FieldKind::String)
            .required("realm_id", FieldKind::String)
            .required("node_groups", FieldKind::map_of(FieldKind::map_of(FieldKind::String)))
            .required("jupyterhub-logout-redirect-url", FieldKind::String)
            .required("forwardauth_middleware_name", FieldKind::String)
            .optional("cert_secret_name", FieldKind::String)
            .required("conda-store-environments", FieldKind::map_of(FieldKind::Any))
            .required("conda-store-default-namespace", FieldKind::String)
            .required("conda-store-filesystem-storage", FieldKind::String)
            .required("conda-store-object-storage", FieldKind::String)
            .required("conda-store-extra-settings", FieldKind::map_of(FieldKind::Any))
            .required("conda-store-extra-config", FieldKind::String)
            .required("conda-store-image", FieldKind::String)
            .required("conda-store-image-tag", FieldKind::String)
            .required(
                "conda-store-service-token-scopes",
                FieldKind::map_of(FieldKind::map_of(FieldKind::Any)),
            )
            .required("jupyterhub-theme", FieldKind::map_of(FieldKind::Any))
            .required("jupyterlab-image", image())
            .required("jupyterlab-default-settings", FieldKind::map_of(FieldKind::Any))
            .required("initial-repositories", FieldKind::String)
            .required("jupyterhub-overrides", overrides())
            .required("jupyterhub-shared-storage", FieldKind::String)
            .optional("jupyterhub-shared-endpoint", FieldKind::String)
            .required(
                "jupyterlab-profiles",
                FieldKind::list_of(FieldKind::Object(
                    Schema::new()
                        .required("display_name", FieldKind::String)
                        .required("description", FieldKind::String)
                        .required("access", FieldKind::String),
                )),
            )
            .required("jupyterhub-image", image())
            .required("jupyterhub-hub-extraEnv", FieldKind::String)
            .required("idle-culler-settings", FieldKind::map_of(FieldKind::Any))
            .required("argo-workflows-enabled", FieldKind::Boolean)
            .required("jhub-apps-enabled", FieldKind::Boolean)
            .required("cloud-provider", FieldKind::String)
            .optional("jupyterlab-preferred-dir", FieldKind::String)
            .required("dask-worker-image", image())
            .required("dask-gateway-profiles", FieldKind::map_of(FieldKind::map_of(FieldKind::Any)))
            .required("monitoring-enabled", FieldKind::Boolean)
            .required("minio-enabled", FieldKind::Boolean)
            .required("grafana-loki-overrides", overrides())
            .required("grafana-promtail-overrides", overrides())
            .required("grafana-loki-minio-overrides", overrides())
            .required("argo-workflows-overrides", overrides())
            .required("nebari-workflow-controller", FieldKind::Boolean)
            .required("workflow-controller-image-tag", FieldKind::String)
            .required("keycloak-read-only-user-credentials", FieldKind::map_of(FieldKind::Any))
            .required("jupyterlab-pioneer-enabled", FieldKind::Boolean)
            .optional("jupyterlab-pioneer-log-format", FieldKind::String)
    }

    fn output_schema(&self) -> Schema {
        Schema::new().required(
            "service_urls",
            FieldKind::map_of(FieldKind::Object(
                Schema::new()
                    .required("url", FieldKind::String)
                    .optional("health_url", FieldKind::String),
            )),
        )
    }

    fn resources(&self, config: &PlatformConfig) -> Vec<ResourceDeclaration> {
        let mut resources = vec![state_backend(Self::NAME, config)];
        resources.extend(cluster_providers(config));
        resources.push(ResourceDeclaration::module("kubernetes-services", "./modules/kubernetes/services"));
        resources
    }

    fn input_vars(
        &self,
        config: &PlatformConfig,
        inputs: StageInputs<'_>,
    ) -> Result<InputVariableSet, DeployflowError> {
        let domain = inputs.require_str(IngressStage::NAME, "domain")?;
        let realm_id = inputs.require_str(KeycloakConfigurationStage::NAME, "realm_id")?;
        let credentials = inputs.require(KeycloakConfigurationStage::NAME, "keycloak-read-only-user-credentials")?;
        let node_groups = inputs.require(InfrastructureStage::NAME, "node_selectors")?;
        let shared_endpoint = inputs
            .optional(InfrastructureStage::NAME, "nfs_endpoint")?
            .and_then(Value::as_str);
        let cloud_provider = config.provider.to_string();

        let hub_overrides = &config.jupyterhub.overrides;
        let hub_extra_env = hub_overrides
            .get("hub")
            .and_then(|hub| hub.get("extraEnv"))
            .cloned()
            .unwrap_or_else(|| json!([]));

        let shared = SharedVars {
            name: &config.project_name,
            environment: &config.namespace,
            endpoint: domain,
            realm_id,
            node_groups,
            jupyterhub_logout_redirect_url: logout_redirect_url(domain, config),
            forwardauth_middleware_name: FORWARDAUTH_MIDDLEWARE_NAME,
            cert_secret_name: match config.certificate.kind {
                CertificateKind::Existing => config.certificate.secret_name.as_deref(),
                _ => None,
            },
        };

        let conda_store = CondaStoreVars {
            conda_store_environments: &config.environments,
            conda_store_default_namespace: &config.conda_store.default_namespace,
            conda_store_filesystem_storage: &config.storage.conda_store,
            conda_store_object_storage: &config.storage.conda_store,
            conda_store_extra_settings: &config.conda_store.extra_settings,
            conda_store_extra_config: &config.conda_store.extra_config,
            conda_store_image: &config.conda_store.image,
            conda_store_image_tag: &config.conda_store.image_tag,
            conda_store_service_token_scopes: token_scopes(),
        };

        let jupyterhub = JupyterHubVars {
            jupyterhub_theme: jupyterhub_theme(config),
            jupyterlab_image: split_image(&config.default_images.jupyterlab)?,
            jupyterlab_default_settings: &config.jupyterlab.default_settings,
            initial_repositories: serde_json::to_string(&config.jupyterlab.initial_repositories)?,
            jupyterhub_overrides: json_override(hub_overrides)?,
            jupyterhub_shared_storage: &config.storage.shared_filesystem,
            jupyterhub_shared_endpoint: shared_endpoint,
            jupyterlab_profiles: &config.profiles.jupyterlab,
            jupyterhub_image: split_image(&config.default_images.jupyterhub)?,
            jupyterhub_hub_extra_env: serde_json::to_string(&hub_extra_env)?,
            idle_culler_settings: &config.jupyterlab.idle_culler,
            argo_workflows_enabled: config.argo_workflows.enabled,
            jhub_apps_enabled: config.jhub_apps.enabled,
            cloud_provider: cloud_provider.clone(),
            jupyterlab_preferred_dir: config.jupyterlab.preferred_dir.as_deref(),
        };

        let dask_gateway = DaskGatewayVars {
            dask_worker_image: split_image(&config.default_images.dask_worker)?,
            dask_gateway_profiles: &config.profiles.dask_worker,
            cloud_provider,
            forwardauth_middleware_name: FORWARDAUTH_MIDDLEWARE_NAME,
        };

        let overrides = &config.monitoring.overrides;
        let monitoring = MonitoringVars {
            monitoring_enabled: config.monitoring.enabled,
            minio_enabled: config.monitoring.minio_enabled,
            grafana_loki_overrides: json_override(&overrides.loki)?,
            grafana_promtail_overrides: json_override(&overrides.promtail)?,
            grafana_loki_minio_overrides: json_override(&overrides.minio)?,
        };

        let argo = &config.argo_workflows;
        let argo_workflows = ArgoWorkflowsVars {
            argo_workflows_enabled: argo.enabled,
            argo_workflows_overrides: json_override(&argo.overrides)?,
            nebari_workflow_controller: argo.nebari_workflow_controller.enabled,
            workflow_controller_image_tag: &argo.nebari_workflow_controller.image_tag,
            keycloak_read_only_user_credentials: credentials,
        };

        let pioneer = &config.telemetry.jupyterlab_pioneer;
        let telemetry = TelemetryVars {
            jupyterlab_pioneer_enabled: pioneer.enabled,
            jupyterlab_pioneer_log_format: pioneer.log_format.as_deref(),
        };

        Ok(InputVariableSet::builder()
            .extend(&shared)?
            .extend(&conda_store)?
            .extend(&jupyterhub)?
            .extend(&dask_gateway)?
            .extend(&monitoring)?
            .extend(&argo_workflows)?
            .extend(&telemetry)?
            .build())
    }

    async fn check(&self, outputs: &StageOutputMap, health: &HealthChecker) -> Result<(), DeployflowError> {
        let services = outputs
            .get(Self::NAME)
            .and_then(|o| o.get("service_urls"))
            .ok_or_else(|| CheckFailedError::new(Self::NAME, "outputs have no 'service_urls'"))?;
        let services: BTreeMap<String, ServiceUrl> = serde_json::from_value(services.clone())
            .map_err(|e| CheckFailedError::new(Self::NAME, format!("malformed 'service_urls': {e}")))?;

        let targets: Vec<_> = services
            .iter()
            .filter_map(|(name, svc)| {
                svc.health_url
                    .as_deref()
                    .filter(|url| !url.is_empty())
                    .map(|url| health.target(name, url))
            })
            .collect();
        info!(stage = Self::NAME, targets = targets.len(), "checking service health");

        health.check_all(&targets).await?;
        Ok(())
    }
}
