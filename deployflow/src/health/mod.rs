//! Bounded-retry health checking for services exposed by a stage.
//!
//! A target is polled with fixed linear spacing: up to `attempts` GETs,
//! `interval_seconds` apart, where any status below 400 is success.

mod checker;
mod policy;
mod probe;

pub use checker::{HealthChecker, HealthCheckTarget};
pub use policy::HealthCheckPolicy;
pub use probe::{HttpProbe, Probe};
