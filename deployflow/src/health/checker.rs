//! The polling loop.

use super::policy::HealthCheckPolicy;
use super::probe::{HttpProbe, Probe};
use crate::errors::{DeployflowError, HealthCheckTimeoutError};
use crate::events::{types, EventSink, NoOpEventSink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One endpoint to poll. Created and consumed within a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckTarget {
    /// Service the endpoint belongs to.
    pub service: String,
    /// URL to GET.
    pub url: String,
    /// Whether TLS certificates are verified.
    pub verify_tls: bool,
    /// Attempt budget.
    pub attempts: u32,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Polls targets until they respond with a status below 400.
#[derive(Clone)]
pub struct HealthChecker {
    probe: Arc<dyn Probe>,
    policy: HealthCheckPolicy,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker").field("policy", &self.policy).finish_non_exhaustive()
    }
}

impl HealthChecker {
    /// Creates a checker around a probe with the default policy.
    #[must_use]
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self {
            probe,
            policy: HealthCheckPolicy::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Creates a checker that issues real HTTP requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn http() -> Result<Self, DeployflowError> {
        Ok(Self::new(Arc::new(HttpProbe::new()?)))
    }

    /// Sets the polling policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: HealthCheckPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the sink receiving `health.*` events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the polling policy.
    #[must_use]
    pub const fn policy(&self) -> &HealthCheckPolicy {
        &self.policy
    }

    /// Builds a target for `url` using this checker's policy.
    #[must_use]
    pub fn target(&self, service: impl Into<String>, url: impl Into<String>) -> HealthCheckTarget {
        HealthCheckTarget {
            service: service.into(),
            url: url.into(),
            verify_tls: self.policy.verify_tls,
            attempts: self.policy.attempts,
            timeout: self.policy.timeout(),
        }
    }

    /// Polls one target.
    ///
    /// Returns the number of attempts used on success. There is no sleep
    /// after the final attempt, so success on attempt `n` waits `(n-1) * T`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthCheckTimeoutError`] once the attempt budget is exhausted.
    pub async fn check_target(&self, target: &HealthCheckTarget) -> Result<u32, HealthCheckTimeoutError> {
        let interval = self.policy.interval();

        for attempt in 1..=target.attempts {
            let outcome = self.probe.probe(target).await;
            let succeeded = matches!(outcome, Ok(status) if status < 400);

            debug!(
                service = %target.service,
                url = %target.url,
                attempt,
                ?outcome,
                "health check attempt"
            );
            self.events
                .emit(
                    types::HEALTH_ATTEMPT,
                    Some(json!({
                        "service": target.service,
                        "url": target.url,
                        "attempt": attempt,
                        "succeeded": succeeded,
                        "status": outcome.as_ref().ok(),
                        "error": outcome.as_ref().err(),
                    })),
                )
                .await;

            if succeeded {
                return Ok(attempt);
            }
            if attempt < target.attempts && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        let error = HealthCheckTimeoutError::new(&target.service, &target.url, target.attempts);
        warn!(service = %target.service, url = %target.url, attempts = target.attempts, "service down");
        self.events
            .emit(
                types::HEALTH_DOWN,
                Some(json!({
                    "service": target.service,
                    "url": target.url,
                    "attempts": target.attempts,
                })),
            )
            .await;
        Err(error)
    }

    /// Polls every target in order; the first one to exhaust its budget
    /// fails the whole check and later targets are not polled.
    ///
    /// # Errors
    ///
    /// Returns the [`HealthCheckTimeoutError`] of the first target that is down.
    pub async fn check_all(&self, targets: &[HealthCheckTarget]) -> Result<(), HealthCheckTimeoutError> {
        for target in targets {
            self.check_target(target).await?;
        }
        Ok(())
    }
}
