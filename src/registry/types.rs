//! Registry API types and data structures.
//!
//! Wire shapes for the Vertex AI `notebookRuntimeTemplates` REST resource
//! and its long-running operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::template::LABEL_FINGERPRINT;

/// A template as stored in the remote registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTemplate {
    /// Opaque resource identifier,
    /// `projects/{p}/locations/{l}/notebookRuntimeTemplates/{id}`.
    #[serde(rename = "name")]
    pub resource_name: String,
    /// User-facing name.
    #[serde(default)]
    pub display_name: String,
    /// Remote labels; absent when the template carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation time (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// Every other field, kept for export.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteTemplate {
    /// Returns the fingerprint label recorded at deploy time, if any.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|l| l.get(LABEL_FINGERPRINT))
            .map(String::as_str)
    }

    /// Returns true if the template carries at least one label.
    #[must_use]
    pub fn has_labels(&self) -> bool {
        self.labels.as_ref().is_some_and(|l| !l.is_empty())
    }

    /// Returns the trailing id segment of the resource name.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.resource_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_name)
    }

    /// Returns the machine type, if the template specifies one.
    #[must_use]
    pub fn machine_type(&self) -> Option<&str> {
        self.extra
            .get("machineSpec")
            .and_then(|m| m.get("machineType"))
            .and_then(Value::as_str)
    }
}

/// One page of a template listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTemplatesResponse {
    /// Templates on this page.
    #[serde(default)]
    pub notebook_runtime_templates: Vec<RemoteTemplate>,
    /// Token for the next page; absent or empty on the last page.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A long-running operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    /// Operation resource name.
    pub name: String,
    /// Whether the operation has finished.
    #[serde(default)]
    pub done: bool,
    /// Failure status, set when the operation finished with an error.
    #[serde(default)]
    pub error: Option<OperationStatus>,
    /// Result payload, set when the operation finished successfully.
    #[serde(default)]
    pub response: Option<Value>,
}

/// Status attached to a failed operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationStatus {
    /// RPC status code.
    #[serde(default)]
    pub code: i32,
    /// Status message.
    #[serde(default)]
    pub message: String,
}
