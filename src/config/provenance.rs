//! Deployment provenance: when a run happened and which CI job drove it.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Commit id variable, checked first.
pub const GIT_SHA_ENV: &str = "GIT_SHA";

/// Commit id variable set by GitHub Actions, used as a fallback.
pub const GITHUB_SHA_ENV: &str = "GITHUB_SHA";

/// CI run id variable set by GitHub Actions.
pub const GITHUB_RUN_ID_ENV: &str = "GITHUB_RUN_ID";

/// Format of the deployment timestamp label value.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Optional CI provenance merged into template labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Provenance {
    /// Commit identifier.
    pub commit_sha: Option<String>,
    /// CI run identifier.
    pub run_id: Option<String>,
}

impl Provenance {
    /// Reads provenance from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads provenance through an arbitrary variable lookup.
    ///
    /// Empty values count as absent.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            commit_sha: get(GIT_SHA_ENV).or_else(|| get(GITHUB_SHA_ENV)),
            run_id: get(GITHUB_RUN_ID_ENV),
        }
    }

    /// Returns true if no provenance is available.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.commit_sha.is_none() && self.run_id.is_none()
    }
}

/// Per-run deployment stamp, computed once and shared by every unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentStamp {
    /// UTC timestamp formatted with [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// CI provenance, if any.
    pub provenance: Provenance,
}

impl DeploymentStamp {
    /// Stamps the current time.
    #[must_use]
    pub fn now(provenance: Provenance) -> Self {
        Self::at(Utc::now(), provenance)
    }

    /// Stamps a fixed instant.
    #[must_use]
    pub fn at(instant: DateTime<Utc>, provenance: Provenance) -> Self {
        Self {
            timestamp: instant.format(TIMESTAMP_FORMAT).to_string(),
            provenance,
        }
    }
}
