//! Single-request probes.

use super::checker::HealthCheckTarget;
use crate::errors::DeployflowError;
use async_trait::async_trait;

/// Issues one request against a target and reports the status code.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Performs one GET.
    ///
    /// Returns the HTTP status, or a description of why no response arrived.
    async fn probe(&self, target: &HealthCheckTarget) -> Result<u16, String>;
}

/// A [`Probe`] backed by `reqwest`.
///
/// Keeps one client per TLS mode so connections are pooled across attempts.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
}

impl HttpProbe {
    /// Builds the underlying HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, DeployflowError> {
        let build = |accept_invalid: bool| {
            reqwest::Client::builder()
                .danger_accept_invalid_certs(accept_invalid)
                .build()
                .map_err(|e| DeployflowError::Http(e.to_string()))
        };
        Ok(Self {
            verifying: build(false)?,
            insecure: build(true)?,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, target: &HealthCheckTarget) -> Result<u16, String> {
        let client = if target.verify_tls { &self.verifying } else { &self.insecure };
        let mut request = client.get(&target.url);
        if !target.timeout.is_zero() {
            request = request.timeout(target.timeout);
        }
        request
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::time::Duration;

    fn target(url: String) -> HealthCheckTarget {
        HealthCheckTarget {
            service: "svc".into(),
            url,
            verify_tls: false,
            attempts: 1,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_http_probe_reports_status() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", "/hub/health").with_status(503).create_async().await;

        let probe = HttpProbe::new().unwrap();
        let status = probe.probe(&target(format!("{}/hub/health", server.url()))).await;

        assert_eq!(status, Ok(503));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused_is_error() {
        let probe = HttpProbe::new().unwrap();
        let result = probe.probe(&target("http://127.0.0.1:1/health".into())).await;
        assert!(result.is_err());
    }
}
