//! Remote template registry.
//!
//! This module provides:
//! - The [`TemplateRegistry`] trait the engine depends on
//! - A REST implementation for Vertex AI ([`VertexClient`])
//! - The per-run [`RemoteSnapshot`]

mod client;
mod snapshot;
mod store;
mod types;

pub use client::VertexClient;
pub use snapshot::RemoteSnapshot;
pub use store::TemplateRegistry;
#[cfg(test)]
pub use store::MockTemplateRegistry;
pub use types::{ListTemplatesResponse, Operation, OperationStatus, RemoteTemplate};
