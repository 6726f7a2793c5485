//! Registry trait definition.
//!
//! This module defines the interface the reconciliation engine uses to talk
//! to the remote template registry.

use async_trait::async_trait;
use std::sync::Arc;

use super::types::RemoteTemplate;
use crate::error::Result;
use crate::template::LocalTemplate;

/// Trait for remote template registries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateRegistry: Send + Sync {
    /// Lists every template under the configured parent.
    ///
    /// Implementations follow pagination internally; one call is one
    /// complete listing pass.
    async fn list(&self) -> Result<Vec<RemoteTemplate>>;

    /// Gets a single template by resource name.
    async fn get(&self, resource_name: &str) -> Result<RemoteTemplate>;

    /// Creates a template from a local definition, with its labels already
    /// stamped, and returns the created resource.
    async fn create(&self, template: &LocalTemplate) -> Result<RemoteTemplate>;

    /// Deletes a template by resource name.
    async fn delete(&self, resource_name: &str) -> Result<()>;
}

#[async_trait]
impl<T: TemplateRegistry + ?Sized> TemplateRegistry for Arc<T> {
    async fn list(&self) -> Result<Vec<RemoteTemplate>> {
        (**self).list().await
    }

    async fn get(&self, resource_name: &str) -> Result<RemoteTemplate> {
        (**self).get(resource_name).await
    }

    async fn create(&self, template: &LocalTemplate) -> Result<RemoteTemplate> {
        (**self).create(template).await
    }

    async fn delete(&self, resource_name: &str) -> Result<()> {
        (**self).delete(resource_name).await
    }
}
