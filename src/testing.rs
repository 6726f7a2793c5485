//! In-memory registry for engine tests.
//!
//! Records every call in order, injects failures and panics by name, and
//! tracks how many calls were in flight at once.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{DeployError, RegistryError, Result};
use crate::registry::{RemoteTemplate, TemplateRegistry};
use crate::template::LocalTemplate;

/// A call observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    /// `list()`.
    List,
    /// `get(resource_name)`.
    Get(String),
    /// `create(template)`, by display name.
    Create(String),
    /// `delete(resource_name)`.
    Delete(String),
}

#[derive(Debug, Default)]
struct FakeState {
    templates: Vec<RemoteTemplate>,
    calls: Vec<FakeCall>,
    fail_create: HashSet<String>,
    fail_delete: HashSet<String>,
    panic_create: HashSet<String>,
    next_id: usize,
}

/// In-memory [`TemplateRegistry`].
#[derive(Debug, Default)]
pub struct FakeRegistry {
    state: Mutex<FakeState>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_templates(self, templates: Vec<RemoteTemplate>) -> Self {
        self.state().templates = templates;
        self
    }

    /// Sleeps this long inside every mutating call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_create_for(self, display_name: &str) -> Self {
        self.state().fail_create.insert(display_name.to_string());
        self
    }

    pub fn fail_delete_for(self, resource_name: &str) -> Self {
        self.state().fail_delete.insert(resource_name.to_string());
        self
    }

    pub fn panic_on_create(self, display_name: &str) -> Self {
        self.state().panic_create.insert(display_name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state().calls.clone()
    }

    pub fn templates(&self) -> Vec<RemoteTemplate> {
        self.state().templates.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl TemplateRegistry for FakeRegistry {
    async fn list(&self) -> Result<Vec<RemoteTemplate>> {
        let mut state = self.state();
        state.calls.push(FakeCall::List);
        Ok(state.templates.clone())
    }

    async fn get(&self, resource_name: &str) -> Result<RemoteTemplate> {
        let mut state = self.state();
        state.calls.push(FakeCall::Get(resource_name.to_string()));
        state
            .templates
            .iter()
            .find(|t| t.resource_name == resource_name)
            .cloned()
            .ok_or_else(|| {
                DeployError::Registry(RegistryError::NotFound {
                    name: resource_name.to_string(),
                })
            })
    }

    async fn create(&self, template: &LocalTemplate) -> Result<RemoteTemplate> {
        let _guard = self.enter();
        self.state()
            .calls
            .push(FakeCall::Create(template.display_name.clone()));
        self.pause().await;

        let should_panic = self.state().panic_create.contains(&template.display_name);
        assert!(!should_panic, "injected panic for {}", template.display_name);

        let mut state = self.state();
        if state.fail_create.contains(&template.display_name) {
            return Err(RegistryError::api_error(500, "injected create failure").into());
        }

        state.next_id += 1;
        let created = RemoteTemplate {
            resource_name: format!(
                "projects/p/locations/l/notebookRuntimeTemplates/fake-{}",
                state.next_id
            ),
            display_name: template.display_name.clone(),
            labels: Some(template.labels.clone()),
            description: None,
            create_time: None,
            extra: template.attributes.clone(),
        };
        state.templates.push(created.clone());
        Ok(created)
    }

    async fn delete(&self, resource_name: &str) -> Result<()> {
        let _guard = self.enter();
        self.state()
            .calls
            .push(FakeCall::Delete(resource_name.to_string()));
        self.pause().await;

        let mut state = self.state();
        if state.fail_delete.contains(resource_name) {
            return Err(RegistryError::api_error(503, "injected delete failure").into());
        }

        let before = state.templates.len();
        state.templates.retain(|t| t.resource_name != resource_name);
        if state.templates.len() == before {
            return Err(RegistryError::NotFound {
                name: resource_name.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// A local template loaded from `{name}.yaml` with the given fingerprint.
pub fn local(display_name: &str, fingerprint: &str) -> LocalTemplate {
    LocalTemplate::from_document(
        format!("{display_name}.yaml"),
        fingerprint,
        serde_json::json!({ "displayName": display_name }),
    )
    .expect("valid template")
}

/// A remote template, labelled with a fingerprint when one is given.
pub fn remote(resource_name: &str, display_name: &str, fingerprint: Option<&str>) -> RemoteTemplate {
    RemoteTemplate {
        resource_name: resource_name.to_string(),
        display_name: display_name.to_string(),
        labels: fingerprint.map(|fp| {
            std::iter::once((String::from("fingerprint"), fp.to_string())).collect()
        }),
        description: None,
        create_time: None,
        extra: serde_json::Map::new(),
    }
}
