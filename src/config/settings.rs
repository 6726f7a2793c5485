//! Registry connection settings and environment loading.
//!
//! Settings come from CLI flags (with `DCLOUD_*` environment fallbacks
//! handled by clap) and from a `.env` file in the working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, DeployError, Result};

/// Default Vertex AI location.
pub const DEFAULT_LOCATION: &str = "australia-southeast1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variable holding the OAuth access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Connection settings for the remote template registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Cloud project id.
    pub project: String,
    /// Region hosting the templates.
    pub location: String,
    /// API endpoint override; derived from the location when unset.
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl RegistryConfig {
    /// Creates settings for a project and location.
    #[must_use]
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Overrides the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Returns the fully qualified parent, `projects/{p}/locations/{l}`.
    #[must_use]
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    /// Returns the API endpoint without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint.as_deref().map_or_else(
            || format!("https://{}-aiplatform.googleapis.com/v1beta1", self.location),
            |e| e.trim_end_matches('/').to_string(),
        )
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks that the settings can address a registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the project or location is empty or malformed.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("project", &self.project), ("location", &self.location)] {
            if value.trim().is_empty() {
                return Err(DeployError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: String::from("must not be empty"),
                }));
            }
            if value.contains('/') {
                return Err(DeployError::Config(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("'{value}' must not contain '/'"),
                }));
            }
        }

        if self.timeout_secs == 0 {
            return Err(DeployError::Config(ConfigError::InvalidValue {
                field: String::from("timeout"),
                message: String::from("must be at least one second"),
            }));
        }

        Ok(())
    }
}

/// Loads the .env file from `base` (or the working directory) if present.
///
/// Runs before logging is installed, so the loaded path is returned for the
/// caller to report.
///
/// # Errors
///
/// Returns an error if the .env file exists but cannot be loaded.
pub fn load_dotenv(base: Option<&Path>) -> Result<Option<PathBuf>> {
    let env_path = base.map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

    if !env_path.exists() {
        return Ok(None);
    }

    dotenvy::from_path(&env_path).map_err(|e| {
        DeployError::Config(ConfigError::DotenvFailed {
            path: env_path.clone(),
            message: e.to_string(),
        })
    })?;

    Ok(Some(env_path))
}

/// Gets the OAuth access token from the environment.
///
/// # Errors
///
/// Returns an error if the token is not set or empty.
pub fn access_token() -> Result<String> {
    std::env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            DeployError::Config(ConfigError::MissingEnvVar {
                name: String::from(ACCESS_TOKEN_ENV),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_follows_location() {
        let config = RegistryConfig::new("my-project", "us-central1");
        assert_eq!(
            config.endpoint(),
            "https://us-central1-aiplatform.googleapis.com/v1beta1"
        );
        assert_eq!(config.parent(), "projects/my-project/locations/us-central1");
    }

    #[test]
    fn test_endpoint_override_trims_slash() {
        let config = RegistryConfig::new("p", DEFAULT_LOCATION)
            .with_endpoint(Some(String::from("http://127.0.0.1:9000/")));
        assert_eq!(config.endpoint(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_validate_rejects_empty_project() {
        let config = RegistryConfig::new("  ", DEFAULT_LOCATION);
        assert!(config.validate().is_err());

        let config = RegistryConfig::new("p/q", DEFAULT_LOCATION);
        assert!(config.validate().is_err());

        let config = RegistryConfig::new("p", DEFAULT_LOCATION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_dotenv_missing_file_is_ok() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        assert_eq!(load_dotenv(Some(dir.path())).expect("no .env"), None);
    }

    #[test]
    fn test_load_dotenv_reports_loaded_path() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join(".env"), "DCLOUD_SETTINGS_TEST_VAR=from-dotenv\n")
            .expect("write .env");

        let loaded = load_dotenv(Some(dir.path())).expect("load .env");

        assert_eq!(loaded, Some(dir.path().join(".env")));
        assert_eq!(
            std::env::var("DCLOUD_SETTINGS_TEST_VAR").as_deref(),
            Ok("from-dotenv")
        );
    }
}
