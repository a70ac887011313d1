//! Azure Kubernetes Service version listing.

use super::{Credentials, VersionSource};
use crate::config::CloudProvider;
use crate::errors::DeployflowError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Service principal variables needed to query Azure.
pub const AZURE_CREDENTIALS: &[&str] = &[
    "ARM_CLIENT_ID",
    "ARM_CLIENT_SECRET",
    "ARM_SUBSCRIPTION_ID",
    "ARM_TENANT_ID",
];

/// Setup guide for the Azure credential variables.
pub const AZURE_ENV_DOCS: &str = "https://www.nebari.dev/docs/how-tos/nebari-azure";

const LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";
const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
const ORCHESTRATORS_API_VERSION: &str = "2019-08-01";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct OrchestratorList {
    properties: OrchestratorProperties,
}

#[derive(Deserialize)]
struct OrchestratorProperties {
    #[serde(default)]
    orchestrators: Vec<Orchestrator>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Orchestrator {
    orchestrator_type: String,
    orchestrator_version: String,
}

/// Lists AKS orchestrator versions via the Azure management API.
#[derive(Debug, Clone)]
pub struct AzureVersionSource {
    client: reqwest::Client,
    login_endpoint: String,
    management_endpoint: String,
}

impl AzureVersionSource {
    /// Creates a source against the public Azure cloud.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            login_endpoint: LOGIN_ENDPOINT.to_string(),
            management_endpoint: MANAGEMENT_ENDPOINT.to_string(),
        }
    }

    /// Points the source at other login and management endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, login: impl Into<String>, management: impl Into<String>) -> Self {
        self.login_endpoint = login.into().trim_end_matches('/').to_string();
        self.management_endpoint = management.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self, credentials: &Credentials) -> Result<String, DeployflowError> {
        let tenant = credentials.get("ARM_TENANT_ID").unwrap_or_default();
        let url = format!("{}/{tenant}/oauth2/v2.0/token", self.login_endpoint);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.get("ARM_CLIENT_ID").unwrap_or_default()),
            ("client_secret", credentials.get("ARM_CLIENT_SECRET").unwrap_or_default()),
            ("scope", "https://management.azure.com/.default"),
        ];
        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DeployflowError::Http(format!("Azure token request failed: {e}")))?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeployflowError::Serialization(format!("Azure token response: {e}")))?;
        Ok(token.access_token)
    }
}

impl Default for AzureVersionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VersionSource for AzureVersionSource {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Azure
    }

    fn required_credentials(&self) -> &[&'static str] {
        AZURE_CREDENTIALS
    }

    fn doc_url(&self) -> &str {
        AZURE_ENV_DOCS
    }

    /// `"East US"` and `"eastus"` name the same location.
    fn normalize_region(&self, region: &str) -> String {
        region.split_whitespace().collect::<String>().to_lowercase()
    }

    async fn list_versions(&self, region: &str, credentials: &Credentials) -> Result<Vec<String>, DeployflowError> {
        let token = self.access_token(credentials).await?;
        let subscription = credentials.get("ARM_SUBSCRIPTION_ID").unwrap_or_default();
        let url = format!(
            "{}/subscriptions/{subscription}/providers/Microsoft.ContainerService/locations/{region}/orchestrators",
            self.management_endpoint
        );
        let response = self
            .client
            .get(url)
            .query(&[
                ("api-version", ORCHESTRATORS_API_VERSION),
                ("resource-type", "managedClusters"),
            ])
            .bearer_auth(token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| DeployflowError::Http(format!("Azure orchestrator listing failed: {e}")))?;
        let list: OrchestratorList = response
            .json()
            .await
            .map_err(|e| DeployflowError::Serialization(format!("Azure orchestrator response: {e}")))?;

        let versions: Vec<String> = list
            .properties
            .orchestrators
            .into_iter()
            .filter(|o| o.orchestrator_type == "Kubernetes")
            .map(|o| o.orchestrator_version)
            .collect();
        debug!(region, count = versions.len(), "listed AKS orchestrator versions");
        Ok(versions)
    }
}
