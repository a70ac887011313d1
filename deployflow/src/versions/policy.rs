//! The platform's Kubernetes compatibility policy.

use semver::Version;
use serde::{Deserialize, Serialize};

/// Parses `major.minor[.patch]`, ignoring a leading `v` and any vendor
/// suffix after the patch number (`1.28.3-gke.1200` is `1.28.3`).
#[must_use]
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim().trim_start_matches('v');
    let mut parts = trimmed.split(|c: char| !c.is_ascii_digit()).filter(|p| !p.is_empty());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

fn default_minimum() -> String {
    "1.26".to_string()
}

fn default_highest() -> String {
    "1.29".to_string()
}

/// Which Kubernetes versions the platform supports.
///
/// A version is supported when its `major.minor` lies within
/// `[minimum, highest]`; patch levels are ignored. If `keep` is set, only the
/// newest `keep` supported versions are returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportPolicy {
    /// Oldest supported `major.minor`.
    #[serde(default = "default_minimum")]
    pub minimum: String,
    /// Newest supported `major.minor`.
    #[serde(default = "default_highest")]
    pub highest: String,
    /// How many of the newest supported versions to return.
    #[serde(default)]
    pub keep: Option<usize>,
}

impl Default for SupportPolicy {
    fn default() -> Self {
        Self {
            minimum: default_minimum(),
            highest: default_highest(),
            keep: None,
        }
    }
}

impl SupportPolicy {
    /// Sets the oldest supported `major.minor`.
    #[must_use]
    pub fn with_minimum(mut self, minimum: impl Into<String>) -> Self {
        self.minimum = minimum.into();
        self
    }

    /// Sets the newest supported `major.minor`.
    #[must_use]
    pub fn with_highest(mut self, highest: impl Into<String>) -> Self {
        self.highest = highest.into();
        self
    }

    /// Keeps only the newest `n` supported versions.
    #[must_use]
    pub const fn with_keep(mut self, n: usize) -> Self {
        self.keep = Some(n);
        self
    }

    /// Sorts `versions` ascending and filters them to the supported set.
    ///
    /// Unparsable entries are dropped.
    #[must_use]
    pub fn apply(&self, versions: Vec<String>) -> Vec<String> {
        let bound = |raw: &str| parse_version(raw).map(|v| (v.major, v.minor));
        let minimum = bound(&self.minimum).unwrap_or((0, 0));
        let highest = bound(&self.highest).unwrap_or((u64::MAX, u64::MAX));

        let mut parsed: Vec<(Version, String)> = versions
            .into_iter()
            .filter_map(|raw| parse_version(&raw).map(|v| (v, raw)))
            .filter(|(v, _)| (minimum..=highest).contains(&(v.major, v.minor)))
            .collect();
        parsed.sort_by(|a, b| a.0.cmp(&b.0));
        parsed.dedup_by(|a, b| a.1 == b.1);

        let skip = self.keep.map_or(0, |n| parsed.len().saturating_sub(n));
        parsed.into_iter().skip(skip).map(|(_, raw)| raw).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_sorts_semantically() {
        let out = SupportPolicy::default().apply(strings(&["1.29.2", "1.27.10", "1.27.9", "1.28.0"]));
        assert_eq!(out, strings(&["1.27.9", "1.27.10", "1.28.0", "1.29.2"]));
    }

    #[test]
    fn test_filters_outside_window() {
        let out = SupportPolicy::default().apply(strings(&["1.25.6", "1.26.0", "1.30.1", "1.29.99"]));
        assert_eq!(out, strings(&["1.26.0", "1.29.99"]));
    }

    #[test]
    fn test_keep_newest() {
        let policy = SupportPolicy::default().with_keep(2);
        assert_eq!(
            policy.apply(strings(&["1.26.1", "1.27.1", "1.28.1", "1.29.1"])),
            strings(&["1.28.1", "1.29.1"])
        );
    }

    #[test]
    fn test_parse_version_variants() {
        assert_eq!(parse_version("1.27"), Some(Version::new(1, 27, 0)));
        assert_eq!(parse_version("v1.28.3-gke.1200"), Some(Version::new(1, 28, 3)));
        assert_eq!(parse_version("latest"), None);
    }
}
