//! Supported Kubernetes versions per cloud provider and region.
//!
//! Lookups go through a [`VersionResolver`], which checks credentials before
//! any network call and caches each `(provider, region)` answer for the life
//! of the resolver.

#[cfg(feature = "azure")]
mod azure;
mod credentials;
mod policy;
mod resolver;

#[cfg(feature = "azure")]
pub use azure::{AzureVersionSource, AZURE_CREDENTIALS, AZURE_ENV_DOCS};
pub use credentials::Credentials;
pub use policy::{parse_version, SupportPolicy};
pub use resolver::{VersionResolver, VersionSource};
