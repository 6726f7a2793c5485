//! Local template types.
//!
//! A [`LocalTemplate`] is one desired-state template file after decoding.
//! Everything except the display name and labels is kept as an opaque JSON
//! object so fields the deployer does not know about reach the registry
//! untouched.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::DeploymentStamp;
use crate::error::TemplateError;

/// Label recording the content fingerprint at deploy time.
pub const LABEL_FINGERPRINT: &str = "fingerprint";

/// Label recording the deployment timestamp.
pub const LABEL_DEPLOYMENT_TS: &str = "deployment_ts_utc";

/// Label recording the commit the template was deployed from.
///
/// The value is lowercased on stamping since label values may not hold
/// uppercase letters, so it can differ in case from the raw `GIT_SHA`.
pub const LABEL_GIT_SHA: &str = "git_sha";

/// Label recording the CI run that deployed the template, lowercased like
/// [`LABEL_GIT_SHA`].
pub const LABEL_GIT_RUN_ID: &str = "git_run_id";

/// Labels owned by the deployer. They override user labels with the same key.
pub const RESERVED_LABELS: &[&str] = &[
    LABEL_FINGERPRINT,
    LABEL_DEPLOYMENT_TS,
    LABEL_GIT_SHA,
    LABEL_GIT_RUN_ID,
];

/// Serialization formats accepted for template files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl TemplateFormat {
    /// Selects a format from a file extension.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Selects a format from a path.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self, TemplateError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        Self::from_extension(extension).ok_or_else(|| TemplateError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.to_string(),
        })
    }
}

impl std::fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        };
        write!(f, "{s}")
    }
}

/// A desired-state template loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTemplate {
    /// File the template was loaded from.
    pub source_path: PathBuf,
    /// User-facing name, the matching key against the registry.
    pub display_name: String,
    /// Template body without labels.
    pub attributes: Map<String, Value>,
    /// Labels submitted with the template.
    pub labels: BTreeMap<String, String>,
    fingerprint: String,
}

impl LocalTemplate {
    /// Builds a template from a decoded document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an object, has no usable
    /// `displayName`, or has non-string labels.
    pub fn from_document(
        source_path: impl Into<PathBuf>,
        fingerprint: impl Into<String>,
        document: Value,
    ) -> Result<Self, TemplateError> {
        let source_path = source_path.into();

        let Value::Object(mut attributes) = document else {
            return Err(TemplateError::invalid(
                source_path,
                "template must be a mapping at the top level",
            ));
        };

        if let Some(alias) = attributes.remove("display_name")
            && !attributes.contains_key("displayName")
        {
            attributes.insert(String::from("displayName"), alias);
        }

        let display_name = match attributes.get("displayName") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(Value::String(_)) | None => {
                return Err(TemplateError::invalid(source_path, "missing displayName"));
            }
            Some(_) => {
                return Err(TemplateError::invalid(
                    source_path,
                    "displayName must be a string",
                ));
            }
        };

        let labels = match attributes.remove("labels") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => {
                let mut labels = BTreeMap::new();
                for (key, value) in map {
                    let Value::String(value) = value else {
                        return Err(TemplateError::invalid(
                            source_path,
                            format!("label '{key}' must have a string value"),
                        ));
                    };
                    labels.insert(key, value);
                }
                labels
            }
            Some(_) => {
                return Err(TemplateError::invalid(source_path, "labels must be a mapping"));
            }
        };

        Ok(Self {
            source_path,
            display_name,
            attributes,
            labels,
            fingerprint: fingerprint.into(),
        })
    }

    /// Content fingerprint of the source bytes.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Injects the deployer's labels, overriding user labels with the same key.
    pub fn stamp_labels(&mut self, stamp: &DeploymentStamp) {
        self.labels
            .insert(String::from(LABEL_FINGERPRINT), self.fingerprint.clone());
        self.labels
            .insert(String::from(LABEL_DEPLOYMENT_TS), stamp.timestamp.clone());

        if let Some(sha) = &stamp.provenance.commit_sha {
            self.labels
                .insert(String::from(LABEL_GIT_SHA), sha.to_lowercase());
        }
        if let Some(run_id) = &stamp.provenance.run_id {
            self.labels
                .insert(String::from(LABEL_GIT_RUN_ID), run_id.to_lowercase());
        }
    }

    /// Request body for the registry: attributes plus labels.
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut body = self.attributes.clone();
        if !self.labels.is_empty() {
            let labels = self
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            body.insert(String::from("labels"), Value::Object(labels));
        }
        Value::Object(body)
    }

    /// Short label for log lines: the file name, or the full path.
    #[must_use]
    pub fn source_label(&self) -> String {
        self.source_path.file_name().map_or_else(
            || self.source_path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}
