//! Stand-ins for network-facing seams.

use crate::config::CloudProvider;
use crate::errors::DeployflowError;
use crate::health::{HealthCheckTarget, Probe};
use crate::versions::{Credentials, VersionSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A probe that replays scripted outcomes, then repeats the last one.
#[derive(Debug)]
pub struct StubProbe {
    script: Vec<Result<u16, String>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl StubProbe {
    /// Replays `script` in order.
    #[must_use]
    pub const fn new(script: Vec<Result<u16, String>>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every probe with `outcome`.
    #[must_use]
    pub fn always(outcome: Result<u16, String>) -> Self {
        Self::new(vec![outcome])
    }

    /// Number of probes issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs probed, in order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Probe for StubProbe {
    async fn probe(&self, target: &HealthCheckTarget) -> Result<u16, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(target.url.clone());
        self.script
            .get(n)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".to_string()))
    }
}

/// A version source with a fixed answer that counts its queries.
#[derive(Debug)]
pub struct StaticVersionSource {
    provider: CloudProvider,
    versions: Option<Vec<String>>,
    required: Vec<&'static str>,
    queries: AtomicUsize,
}

impl StaticVersionSource {
    /// Answers every query with `versions`.
    #[must_use]
    pub fn new(provider: CloudProvider, versions: Vec<&str>) -> Self {
        Self {
            provider,
            versions: Some(versions.into_iter().map(str::to_string).collect()),
            required: Vec::new(),
            queries: AtomicUsize::new(0),
        }
    }

    /// Fails every query.
    #[must_use]
    pub const fn failing(provider: CloudProvider) -> Self {
        Self {
            provider,
            versions: None,
            required: Vec::new(),
            queries: AtomicUsize::new(0),
        }
    }

    /// Declares credential variables the source needs.
    #[must_use]
    pub fn requiring(mut self, names: &[&'static str]) -> Self {
        self.required = names.to_vec();
        self
    }

    /// Number of queries issued so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionSource for StaticVersionSource {
    fn provider(&self) -> CloudProvider {
        self.provider
    }

    fn required_credentials(&self) -> &[&'static str] {
        &self.required
    }

    async fn list_versions(&self, _region: &str, _credentials: &Credentials) -> Result<Vec<String>, DeployflowError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.versions
            .clone()
            .ok_or_else(|| DeployflowError::Http("version listing unavailable".to_string()))
    }
}
