// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness
#![warn(unused_imports)]              // Unused imports
#![warn(unused_variables)]            // Unused variables
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// Test code asserts freely.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// ============================================================================
// Crate Documentation
// ============================================================================

//! # dcloud templates
//!
//! Deploys a directory of notebook runtime templates to Vertex AI and keeps
//! the remote registry in line with it.
//!
//! ## Overview
//!
//! Every template file is fingerprinted over its raw bytes. A run compares
//! each local template with the remote template of the same display name:
//!
//! - No remote template: **deploy** it
//! - Remote fingerprint label matches: **skip** it
//! - Otherwise: **replace** it, creating the new template before deleting
//!   the stale one so a live template is never removed without a successor
//!
//! ## Architecture
//!
//! 1. **Local Templates**: loaded from YAML or JSON files
//! 2. **Remote Snapshot**: one listing of the registry per run
//! 3. **Planner**: one action per local template
//! 4. **Executor**: applies the plan with bounded concurrency and reports
//!    every unit's outcome
//!
//! ## Modules
//!
//! - [`config`]: Registry settings, provenance and `.env` loading
//! - [`template`]: Template loading, fingerprinting and validation
//! - [`registry`]: Registry trait, REST client and snapshot
//! - [`planner`]: Comparison, planning and execution
//! - [`reconciler`]: Run orchestration and reporting
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! displayName: gpu-small
//! description: Small GPU runtime
//! machineSpec:
//!   machineType: n1-standard-4
//!   acceleratorType: NVIDIA_TESLA_T4
//!   acceleratorCount: 1
//! idleShutdownConfig:
//!   idleTimeout: 3600s
//! labels:
//!   team: ml
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod registry;
pub mod template;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{DeploymentStamp, Provenance, RegistryConfig};
pub use error::{DeployError, Result};
pub use planner::{PlanExecutor, ReconciliationAction, ReconciliationPlan};
pub use reconciler::{Reconciler, RunReport};
pub use registry::{RemoteSnapshot, RemoteTemplate, TemplateRegistry, VertexClient};
pub use template::{LocalTemplate, TemplateLoader, TemplateValidator};
