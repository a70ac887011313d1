//! Typed platform configuration.

use crate::health::HealthCheckPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Image tag used for platform images unless overridden.
pub const DEFAULT_IMAGE_TAG: &str = "2024.1.1";

/// Cloud provider hosting the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    /// A local kind cluster.
    #[default]
    Local,
    /// A pre-existing cluster.
    Existing,
    /// Amazon EKS.
    Aws,
    /// Google GKE.
    Gcp,
    /// Azure AKS.
    Azure,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Existing => write!(f, "existing"),
            Self::Aws => write!(f, "aws"),
            Self::Gcp => write!(f, "gcp"),
            Self::Azure => write!(f, "azure"),
        }
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "existing" => Ok(Self::Existing),
            "aws" => Ok(Self::Aws),
            "gcp" => Ok(Self::Gcp),
            "azure" => Ok(Self::Azure),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Top-level platform configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Project name; also prefixes cloud resources.
    pub project_name: String,
    /// Kubernetes namespace for platform services.
    pub namespace: String,
    /// Cloud provider.
    pub provider: CloudProvider,
    /// Cloud region.
    pub region: Option<String>,
    /// Requested Kubernetes version.
    pub kubernetes_version: Option<String>,
    /// Public domain, when known before ingress is applied.
    pub domain: Option<String>,
    /// Platform release the deployment targets.
    pub nebari_version: String,
    /// TLS certificate handling.
    pub certificate: Certificate,
    /// Extra services exposed behind the platform's auth.
    pub tf_extensions: Vec<TerraformExtension>,
    /// UI theme.
    pub theme: Theme,
    /// Default container images.
    pub default_images: DefaultImages,
    /// Storage sizes.
    pub storage: Storage,
    /// Spawnable server and worker profiles.
    pub profiles: Profiles,
    /// Conda environments seeded into conda-store.
    pub environments: BTreeMap<String, Value>,
    /// conda-store settings.
    pub conda_store: CondaStore,
    /// Argo Workflows settings.
    pub argo_workflows: ArgoWorkflows,
    /// Monitoring stack settings.
    pub monitoring: Monitoring,
    /// Telemetry settings.
    pub telemetry: Telemetry,
    /// JupyterHub Helm overrides.
    pub jupyterhub: JupyterHub,
    /// JupyterLab settings.
    pub jupyterlab: JupyterLab,
    /// jhub-apps launcher.
    pub jhub_apps: JHubApps,
    /// Post-apply health checking.
    pub health_check: HealthCheckPolicy,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            namespace: "dev".to_string(),
            provider: CloudProvider::default(),
            region: None,
            kubernetes_version: None,
            domain: None,
            nebari_version: env!("CARGO_PKG_VERSION").to_string(),
            certificate: Certificate::default(),
            tf_extensions: Vec::new(),
            theme: Theme::default(),
            default_images: DefaultImages::default(),
            storage: Storage::default(),
            profiles: Profiles::default(),
            environments: BTreeMap::new(),
            conda_store: CondaStore::default(),
            argo_workflows: ArgoWorkflows::default(),
            monitoring: Monitoring::default(),
            telemetry: Telemetry::default(),
            jupyterhub: JupyterHub::default(),
            jupyterlab: JupyterLab::default(),
            jhub_apps: JHubApps::default(),
            health_check: HealthCheckPolicy::default(),
        }
    }
}

impl PlatformConfig {
    /// Creates a default configuration for a project.
    #[must_use]
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Self::default()
        }
    }
}

/// How TLS certificates are provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateKind {
    /// Ingress-generated self-signed certificate.
    #[default]
    SelfSigned,
    /// ACME via Let's Encrypt.
    LetsEncrypt,
    /// A pre-existing Kubernetes secret.
    Existing,
}

/// TLS certificate settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    /// Provisioning mode.
    #[serde(rename = "type")]
    pub kind: CertificateKind,
    /// Secret holding the certificate when `kind` is `existing`.
    pub secret_name: Option<String>,
    /// ACME contact email when `kind` is `lets-encrypt`.
    pub acme_email: Option<String>,
}

/// An extra service mounted under the platform domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformExtension {
    /// Extension name.
    pub name: String,
    /// URL path segment the extension is served under.
    pub urlslug: String,
    /// Logout path, chained into the platform logout redirect when non-empty.
    #[serde(default)]
    pub logout: String,
}

/// UI theme settings; the JupyterHub theme is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// JupyterHub template variables.
    pub jupyterhub: Map<String, Value>,
}

impl Default for Theme {
    fn default() -> Self {
        let mut jupyterhub = Map::new();
        jupyterhub.insert("hub_title".into(), Value::from("Nebari"));
        jupyterhub.insert("hub_subtitle".into(), Value::from("Your open source data science platform"));
        jupyterhub.insert("display_version".into(), Value::from("True"));
        Self { jupyterhub }
    }
}

/// Default container images as `name:tag`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultImages {
    /// Hub image.
    pub jupyterhub: String,
    /// User server image.
    pub jupyterlab: String,
    /// Dask worker image.
    pub dask_worker: String,
}

impl Default for DefaultImages {
    fn default() -> Self {
        Self {
            jupyterhub: format!("quay.io/nebari/nebari-jupyterhub:{DEFAULT_IMAGE_TAG}"),
            jupyterlab: format!("quay.io/nebari/nebari-jupyterlab:{DEFAULT_IMAGE_TAG}"),
            dask_worker: format!("quay.io/nebari/nebari-dask-worker:{DEFAULT_IMAGE_TAG}"),
        }
    }
}

/// Persistent volume sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// conda-store volume.
    pub conda_store: String,
    /// Shared user filesystem.
    pub shared_filesystem: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            conda_store: "200Gi".to_string(),
            shared_filesystem: "200Gi".to_string(),
        }
    }
}

/// Who may spawn a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Everyone.
    #[default]
    All,
    /// Users and groups listed in the profile.
    Yaml,
    /// Users granted the profile in Keycloak.
    Keycloak,
}

/// KubeSpawner resource overrides; unknown keys pass through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeSpawner {
    /// CPU limit.
    pub cpu_limit: f64,
    /// CPU guarantee.
    pub cpu_guarantee: f64,
    /// Memory limit.
    pub mem_limit: String,
    /// Memory guarantee.
    pub mem_guarantee: String,
    /// Additional KubeSpawner settings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A JupyterLab server profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterLabProfile {
    /// Access mode.
    #[serde(default)]
    pub access: AccessLevel,
    /// Name shown in the spawner.
    pub display_name: String,
    /// Description shown in the spawner.
    pub description: String,
    /// Whether the profile is preselected.
    #[serde(default)]
    pub default: bool,
    /// Allowed users, only with `access: yaml`.
    #[serde(default)]
    pub users: Option<Vec<String>>,
    /// Allowed groups, only with `access: yaml`.
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    /// Resource overrides.
    #[serde(default)]
    pub kubespawner_override: Option<KubeSpawner>,
}

/// A Dask worker profile; unknown keys pass through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaskWorkerProfile {
    /// Worker CPU limit.
    pub worker_cores_limit: f64,
    /// Worker CPU request.
    pub worker_cores: f64,
    /// Worker memory limit.
    pub worker_memory_limit: String,
    /// Worker memory request.
    pub worker_memory: String,
    /// Threads per worker.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: u32,
    /// Additional gateway options.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const fn default_worker_threads() -> u32 {
    1
}

/// Spawnable profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Profiles {
    /// JupyterLab server profiles.
    pub jupyterlab: Vec<JupyterLabProfile>,
    /// Dask worker profiles by name.
    pub dask_worker: BTreeMap<String, DaskWorkerProfile>,
}

impl Default for Profiles {
    fn default() -> Self {
        let instance = |name: &str, cpu: f64, guarantee: f64, mem: &str, mem_guarantee: &str, default| {
            JupyterLabProfile {
                access: AccessLevel::All,
                display_name: format!("{name} Instance"),
                description: format!("Stable environment with {cpu} cpu / {mem}B ram"),
                default,
                users: None,
                groups: None,
                kubespawner_override: Some(KubeSpawner {
                    cpu_limit: cpu,
                    cpu_guarantee: guarantee,
                    mem_limit: mem.to_string(),
                    mem_guarantee: mem_guarantee.to_string(),
                    extra: Map::new(),
                }),
            }
        };
        let worker = |cores: f64, request: f64, mem: &str, mem_request: &str, threads| DaskWorkerProfile {
            worker_cores_limit: cores,
            worker_cores: request,
            worker_memory_limit: mem.to_string(),
            worker_memory: mem_request.to_string(),
            worker_threads: threads,
            extra: Map::new(),
        };

        let mut dask_worker = BTreeMap::new();
        dask_worker.insert("Small Worker".to_string(), worker(2.0, 1.5, "8G", "5G", 2));
        dask_worker.insert("Medium Worker".to_string(), worker(4.0, 3.0, "16G", "10G", 4));

        Self {
            jupyterlab: vec![
                instance("Small", 2.0, 1.5, "8G", "5G", true),
                instance("Medium", 4.0, 3.0, "16G", "10G", false),
            ],
            dask_worker,
        }
    }
}

/// conda-store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CondaStore {
    /// Extra traitlets settings.
    pub extra_settings: Map<String, Value>,
    /// Extra python config appended verbatim.
    pub extra_config: String,
    /// Server image.
    pub image: String,
    /// Server image tag.
    pub image_tag: String,
    /// Namespace for shared environments.
    pub default_namespace: String,
    /// Object storage size.
    pub object_storage: String,
}

impl Default for CondaStore {
    fn default() -> Self {
        Self {
            extra_settings: Map::new(),
            extra_config: String::new(),
            image: "quansight/conda-store-server".to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            default_namespace: "nebari-git".to_string(),
            object_storage: "200Gi".to_string(),
        }
    }
}

/// Workflow admission controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowController {
    /// Whether the controller is deployed.
    pub enabled: bool,
    /// Controller image tag.
    pub image_tag: String,
}

impl Default for WorkflowController {
    fn default() -> Self {
        Self {
            enabled: true,
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
        }
    }
}

/// Argo Workflows settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgoWorkflows {
    /// Whether Argo is deployed.
    pub enabled: bool,
    /// Helm value overrides.
    pub overrides: Map<String, Value>,
    /// Admission controller settings.
    pub nebari_workflow_controller: WorkflowController,
}

impl Default for ArgoWorkflows {
    fn default() -> Self {
        Self {
            enabled: true,
            overrides: Map::new(),
            nebari_workflow_controller: WorkflowController::default(),
        }
    }
}

/// Helm overrides for the monitoring stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringOverrides {
    /// Loki overrides.
    pub loki: Map<String, Value>,
    /// Promtail overrides.
    pub promtail: Map<String, Value>,
    /// MinIO overrides.
    pub minio: Map<String, Value>,
}

/// Monitoring stack settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    /// Whether monitoring is deployed.
    pub enabled: bool,
    /// Helm overrides.
    pub overrides: MonitoringOverrides,
    /// Whether MinIO backs Loki.
    pub minio_enabled: bool,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            enabled: true,
            overrides: MonitoringOverrides::default(),
            minio_enabled: true,
        }
    }
}

/// JupyterLab telemetry extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JupyterLabPioneer {
    /// Whether telemetry is collected.
    pub enabled: bool,
    /// Log line format.
    pub log_format: Option<String>,
}

/// Telemetry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// JupyterLab telemetry.
    pub jupyterlab_pioneer: JupyterLabPioneer,
}

/// JupyterHub settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JupyterHub {
    /// Helm value overrides.
    pub overrides: Map<String, Value>,
}

/// Idle culling timeouts in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleCuller {
    /// Terminal inactivity timeout.
    pub terminal_cull_inactive_timeout: u32,
    /// Terminal cull interval.
    pub terminal_cull_interval: u32,
    /// Kernel idle timeout.
    pub kernel_cull_idle_timeout: u32,
    /// Kernel cull interval.
    pub kernel_cull_interval: u32,
    /// Whether connected kernels may be culled.
    pub kernel_cull_connected: bool,
    /// Whether busy kernels may be culled.
    pub kernel_cull_busy: bool,
    /// Server shutdown after no activity.
    pub server_shutdown_no_activity_timeout: u32,
}

impl Default for IdleCuller {
    fn default() -> Self {
        Self {
            terminal_cull_inactive_timeout: 15,
            terminal_cull_interval: 5,
            kernel_cull_idle_timeout: 15,
            kernel_cull_interval: 5,
            kernel_cull_connected: true,
            kernel_cull_busy: false,
            server_shutdown_no_activity_timeout: 15,
        }
    }
}

/// JupyterLab settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JupyterLab {
    /// Default user settings.
    pub default_settings: Map<String, Value>,
    /// Idle culling.
    pub idle_culler: IdleCuller,
    /// Repositories cloned into new home directories.
    pub initial_repositories: Vec<BTreeMap<String, String>>,
    /// Directory the file browser opens in.
    pub preferred_dir: Option<String>,
}

/// jhub-apps launcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JHubApps {
    /// Whether jhub-apps is enabled.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_one_default_profile() {
        let profiles = Profiles::default();
        assert_eq!(profiles.jupyterlab.iter().filter(|p| p.default).count(), 1);
        assert_eq!(profiles.dask_worker.len(), 2);
        assert_eq!(profiles.dask_worker["Medium Worker"].worker_threads, 4);
    }

    #[test]
    fn test_provider_parse_and_display() {
        assert_eq!("Azure".parse::<CloudProvider>().unwrap(), CloudProvider::Azure);
        assert_eq!(CloudProvider::Gcp.to_string(), "gcp");
        assert!("openstack".parse::<CloudProvider>().is_err());
    }

    #[test]
    fn test_kubespawner_extra_keys_pass_through() {
        let spawner: KubeSpawner = serde_json::from_value(serde_json::json!({
            "cpu_limit": 2,
            "cpu_guarantee": 1,
            "mem_limit": "8G",
            "mem_guarantee": "4G",
            "image": "custom:1"
        }))
        .unwrap();
        assert_eq!(spawner.extra.get("image"), Some(&Value::from("custom:1")));
    }

    #[test]
    fn test_certificate_kind_is_kebab_case() {
        let cert: Certificate = serde_json::from_value(serde_json::json!({"type": "lets-encrypt"})).unwrap();
        assert_eq!(cert.kind, CertificateKind::LetsEncrypt);
    }
}
