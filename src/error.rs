//! Error types for the template deployer.
//!
//! Errors are split by where they arise in a run: loading templates from
//! disk, talking to the remote registry, and run-level reconciliation.
//! Anything returned as `Err` from the reconciler is fatal to the run;
//! per-template failures are recorded in the run report instead.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the template deployer.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Template loading or validation errors.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Remote registry errors.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Run-level reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading, decoding or validating template files.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template directory does not exist or cannot be listed.
    #[error("Cannot read template directory {path}: {message}")]
    DirectoryUnreadable {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// A template file could not be read.
    #[error("Cannot read template file {path}: {message}")]
    Unreadable {
        /// File that failed.
        path: PathBuf,
        /// Underlying cause.
        message: String,
    },

    /// A template file has an extension we do not decode.
    #[error("Unsupported file extension '{extension}' for {path}")]
    UnsupportedFormat {
        /// File that was rejected.
        path: PathBuf,
        /// The offending extension (empty when there is none).
        extension: String,
    },

    /// A template file could not be decoded.
    #[error("Failed to parse {path}: {message}")]
    ParseError {
        /// File that failed.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// The decoded template is structurally unusable.
    #[error("Invalid template {path}: {message}")]
    Invalid {
        /// File that failed.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },

    /// Validation failed.
    #[error("Template validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Remote registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Authentication failed.
    #[error("Registry authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Registry request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Registry rate limited (retry-after: {retry_after_secs}s)")]
    RateLimited {
        /// Seconds the server asked us to wait; zero when it did not say.
        retry_after_secs: u64,
    },

    /// Resource not found.
    #[error("Resource not found: {name}")]
    NotFound {
        /// Resource or display name that was looked up.
        name: String,
    },

    /// Network error.
    #[error("Network error communicating with the registry: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from the registry: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A long-running operation finished with an error.
    #[error("Operation {operation} failed: {code} - {message}")]
    OperationFailed {
        /// Operation resource name.
        operation: String,
        /// RPC status code.
        code: i32,
        /// Status message.
        message: String,
    },

    /// A long-running operation did not finish in time.
    #[error("Timed out waiting for operation {operation}")]
    OperationTimeout {
        /// Operation resource name.
        operation: String,
    },

    /// A long-running operation disappeared before reporting completion.
    #[error("Operation {operation} vanished before completing")]
    OperationLost {
        /// Operation resource name.
        operation: String,
    },
}

/// Run-level reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The remote snapshot could not be taken.
    #[error("Could not snapshot remote templates: {reason}")]
    SnapshotFailed {
        /// Underlying cause.
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Setting name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The .env file exists but could not be loaded.
    #[error("Failed to load {path}: {message}")]
    DotenvFailed {
        /// Path of the .env file.
        path: PathBuf,
        /// Loader message.
        message: String,
    },
}

/// Result type alias for deployer operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Returns true if this error is worth retrying at the transport level.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Registry(RegistryError::RateLimited { .. } | RegistryError::NetworkError { .. })
        )
    }

    /// Returns the delay the server asked for, if it named one.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Registry(RegistryError::RateLimited { retry_after_secs })
                if *retry_after_secs > 0 =>
            {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }

    /// Returns true if the request was rejected before the server acted on it.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Registry(RegistryError::RateLimited { .. }))
    }
}

impl TemplateError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error for a file.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-template error for a file.
    #[must_use]
    pub fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl RegistryError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let rate_limited = DeployError::Registry(RegistryError::RateLimited {
            retry_after_secs: 7,
        });
        assert!(rate_limited.is_retryable());
        assert_eq!(rate_limited.retry_delay_secs(), Some(7));

        let network = DeployError::Registry(RegistryError::network("reset"));
        assert!(network.is_retryable());
        assert!(!network.is_rate_limited());
        assert_eq!(network.retry_delay_secs(), None);

        let unspecified = DeployError::Registry(RegistryError::RateLimited {
            retry_after_secs: 0,
        });
        assert!(unspecified.is_rate_limited());
        assert_eq!(unspecified.retry_delay_secs(), None);

        let auth = DeployError::Registry(RegistryError::AuthenticationFailed {
            message: String::from("expired"),
        });
        assert!(!auth.is_retryable());
        assert_eq!(auth.retry_delay_secs(), None);
    }

    #[test]
    fn test_template_error_display() {
        let err = DeployError::from(TemplateError::UnsupportedFormat {
            path: PathBuf::from("templates/a.toml"),
            extension: String::from("toml"),
        });
        assert!(matches!(err, DeployError::Template(_)));
        assert!(err.to_string().contains("Unsupported file extension 'toml'"));
    }
}
