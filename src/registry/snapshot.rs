//! Point-in-time view of the remote registry.
//!
//! A run takes exactly one snapshot before planning; every planning
//! decision in that run is made against it.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Result};

use super::store::TemplateRegistry;
use super::types::RemoteTemplate;

/// Remote templates keyed by display name.
#[derive(Debug, Clone)]
pub struct RemoteSnapshot {
    /// First template seen for each display name.
    by_name: HashMap<String, RemoteTemplate>,
    /// Later templates that reused a display name already in `by_name`.
    duplicates: Vec<RemoteTemplate>,
}

impl RemoteSnapshot {
    /// Lists the registry once and builds a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotFailed` if the listing fails for any reason.
    pub async fn fetch(registry: &dyn TemplateRegistry) -> Result<Self> {
        info!("Fetching remote templates");

        let templates = registry.list().await.map_err(|e| ReconcileError::SnapshotFailed {
            reason: e.to_string(),
        })?;

        Ok(Self::from_templates(templates))
    }

    /// Builds a snapshot from a listing, in listing order.
    ///
    /// When several templates share a display name, the first one wins.
    #[must_use]
    pub fn from_templates(templates: Vec<RemoteTemplate>) -> Self {
        let mut by_name: HashMap<String, RemoteTemplate> = HashMap::new();
        let mut duplicates = Vec::new();

        for template in templates {
            if let Some(kept) = by_name.get(&template.display_name) {
                warn!(
                    "Duplicate remote display name '{}': keeping {}, ignoring {}",
                    template.display_name, kept.resource_name, template.resource_name
                );
                duplicates.push(template);
                continue;
            }
            by_name.insert(template.display_name.clone(), template);
        }

        debug!(
            "Snapshot holds {} template(s), {} duplicate(s)",
            by_name.len(),
            duplicates.len()
        );

        Self {
            by_name,
            duplicates,
        }
    }

    /// Looks up the remote match for a display name.
    #[must_use]
    pub fn get(&self, display_name: &str) -> Option<&RemoteTemplate> {
        self.by_name.get(display_name)
    }

    /// Number of distinct display names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if the registry held no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Templates ignored because their display name was already taken.
    #[must_use]
    pub fn duplicates(&self) -> &[RemoteTemplate] {
        &self.duplicates
    }

    /// Matched templates sorted by display name.
    #[must_use]
    pub fn templates(&self) -> Vec<&RemoteTemplate> {
        let mut templates: Vec<_> = self.by_name.values().collect();
        templates.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeployError, RegistryError};
    use crate::registry::store::MockTemplateRegistry;

    fn remote(name: &str, display_name: &str) -> RemoteTemplate {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "displayName": display_name,
        }))
        .expect("valid template")
    }

    #[test]
    fn test_first_duplicate_wins() {
        let snapshot = RemoteSnapshot::from_templates(vec![
            remote("r-1", "gpu"),
            remote("r-2", "cpu"),
            remote("r-3", "gpu"),
        ]);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("gpu").map(|t| t.resource_name.as_str()), Some("r-1"));
        assert_eq!(snapshot.duplicates().len(), 1);
        assert_eq!(snapshot.duplicates()[0].resource_name, "r-3");

        let names: Vec<_> = snapshot.templates().iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names, vec!["cpu", "gpu"]);
    }

    #[tokio::test]
    async fn test_fetch_lists_once() {
        let mut registry = MockTemplateRegistry::new();
        registry
            .expect_list()
            .times(1)
            .returning(|| Ok(vec![remote("r-1", "gpu")]));

        let snapshot = RemoteSnapshot::fetch(&registry).await.expect("snapshot");
        assert!(snapshot.get("gpu").is_some());
        assert!(snapshot.get("cpu").is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let mut registry = MockTemplateRegistry::new();
        registry.expect_list().times(1).returning(|| {
            Err(DeployError::Registry(RegistryError::AuthenticationFailed {
                message: String::from("expired"),
            }))
        });
        registry.expect_create().never();
        registry.expect_delete().never();

        let result = RemoteSnapshot::fetch(&registry).await;
        match result {
            Err(DeployError::Reconcile(ReconcileError::SnapshotFailed { reason })) => {
                assert!(reason.contains("expired"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
