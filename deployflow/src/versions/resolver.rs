//! Cached version resolution.

use super::{Credentials, SupportPolicy};
use crate::config::CloudProvider;
use crate::errors::{CredentialsMissingError, DeployflowError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// A provider API listing the Kubernetes versions offered in a region.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Provider this source answers for.
    fn provider(&self) -> CloudProvider;

    /// Credential variables that must be set before querying.
    fn required_credentials(&self) -> &[&'static str] {
        &[]
    }

    /// Where to read about setting the credentials.
    fn doc_url(&self) -> &str {
        ""
    }

    /// Canonical form of a region name, used as the cache key.
    fn normalize_region(&self, region: &str) -> String {
        region.to_string()
    }

    /// Lists raw version strings for `region` (already normalized).
    async fn list_versions(&self, region: &str, credentials: &Credentials) -> Result<Vec<String>, DeployflowError>;
}

type CacheKey = (CloudProvider, String);

/// Resolves supported versions, one provider query per `(provider, region)`.
///
/// Concurrent callers for the same key share the in-flight query. Failed
/// queries are not cached. There is no eviction.
pub struct VersionResolver {
    sources: HashMap<CloudProvider, Arc<dyn VersionSource>>,
    policy: SupportPolicy,
    credentials: Credentials,
    cache: DashMap<CacheKey, Arc<OnceCell<Vec<String>>>>,
}

impl std::fmt::Debug for VersionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionResolver")
            .field("providers", &self.sources.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl VersionResolver {
    /// Creates a resolver with no sources, reading credentials from the
    /// process environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            policy: SupportPolicy::default(),
            credentials: Credentials::from_env(),
            cache: DashMap::new(),
        }
    }

    /// Creates a resolver with every source compiled in.
    #[must_use]
    pub fn with_default_sources() -> Self {
        let resolver = Self::new();
        #[cfg(feature = "azure")]
        let resolver = resolver.with_source(Arc::new(super::AzureVersionSource::new()));
        resolver
    }

    /// Adds or replaces the source for its provider.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn VersionSource>) -> Self {
        self.sources.insert(source.provider(), source);
        self
    }

    /// Sets the compatibility policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SupportPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Uses a fixed credential snapshot.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Supported versions for `region`, ascending by semantic version.
    ///
    /// # Errors
    ///
    /// Returns [`DeployflowError::CredentialsMissing`] naming every unset
    /// variable before any network call, or the source's query error.
    pub async fn supported_versions(
        &self,
        provider: CloudProvider,
        region: &str,
    ) -> Result<Vec<String>, DeployflowError> {
        let source = self
            .sources
            .get(&provider)
            .ok_or_else(|| DeployflowError::Internal(format!("no version source for provider '{provider}'")))?;

        let missing = self.credentials.missing(source.required_credentials());
        if !missing.is_empty() {
            return Err(CredentialsMissingError::new(provider.to_string(), missing, source.doc_url()).into());
        }

        let region = source.normalize_region(region);
        let cell = self
            .cache
            .entry((provider, region.clone()))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let versions = cell
            .get_or_try_init(|| async {
                info!(%provider, %region, "querying supported kubernetes versions");
                let raw = source.list_versions(&region, &self.credentials).await?;
                let supported = self.policy.apply(raw);
                debug!(%provider, %region, versions = ?supported, "cached supported versions");
                Ok::<_, DeployflowError>(supported)
            })
            .await?;
        Ok(versions.clone())
    }
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticVersionSource;
    use pretty_assertions::assert_eq;

    fn resolver(source: &Arc<StaticVersionSource>) -> VersionResolver {
        VersionResolver::new()
            .with_source(source.clone())
            .with_credentials(Credentials::from_pairs([("TOKEN", "t")]))
    }

    #[tokio::test]
    async fn test_second_call_uses_cache() {
        let source = Arc::new(StaticVersionSource::new(
            CloudProvider::Gcp,
            vec!["1.28.5", "1.26.1", "1.27.3"],
        ));
        let resolver = resolver(&source);

        let first = resolver.supported_versions(CloudProvider::Gcp, "us-central1").await.unwrap();
        let second = resolver.supported_versions(CloudProvider::Gcp, "us-central1").await.unwrap();

        assert_eq!(first, vec!["1.26.1", "1.27.3", "1.28.5"]);
        assert_eq!(first, second);
        assert_eq!(source.queries(), 1);
    }

    #[tokio::test]
    async fn test_regions_are_cached_separately() {
        let source = Arc::new(StaticVersionSource::new(CloudProvider::Gcp, vec!["1.27.3"]));
        let resolver = resolver(&source);

        resolver.supported_versions(CloudProvider::Gcp, "us-central1").await.unwrap();
        resolver.supported_versions(CloudProvider::Gcp, "europe-west4").await.unwrap();

        assert_eq!(source.queries(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_query() {
        let source = Arc::new(StaticVersionSource::new(CloudProvider::Gcp, vec!["1.27.3"]));
        let resolver = Arc::new(resolver(&source));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.supported_versions(CloudProvider::Gcp, "r").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(source.queries(), 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_query() {
        let source = Arc::new(
            StaticVersionSource::new(CloudProvider::Azure, vec!["1.27.3"])
                .requiring(&["ARM_CLIENT_ID", "ARM_TENANT_ID"]),
        );
        let resolver = VersionResolver::new()
            .with_source(source.clone())
            .with_credentials(Credentials::from_pairs([("ARM_CLIENT_ID", "id")]));

        let err = resolver.supported_versions(CloudProvider::Azure, "eastus").await.unwrap_err();

        let DeployflowError::CredentialsMissing(e) = err else {
            panic!("expected missing credentials");
        };
        assert_eq!(e.missing, vec!["ARM_TENANT_ID".to_string()]);
        assert_eq!(source.queries(), 0);
    }

    #[tokio::test]
    async fn test_failed_query_is_not_cached() {
        let source = Arc::new(StaticVersionSource::failing(CloudProvider::Gcp));
        let resolver = resolver(&source);

        assert!(resolver.supported_versions(CloudProvider::Gcp, "r").await.is_err());
        assert!(resolver.supported_versions(CloudProvider::Gcp, "r").await.is_err());
        assert_eq!(source.queries(), 2);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let err = VersionResolver::new()
            .supported_versions(CloudProvider::Aws, "us-east-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no version source for provider 'aws'"));
    }
}
