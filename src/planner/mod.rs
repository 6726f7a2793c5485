//! Planning module for reconciliation runs.
//!
//! This module compares local templates with the remote snapshot,
//! turns the comparison into per-template actions, and applies them
//! with bounded concurrency.

mod compare;
mod executor;
mod plan;

pub use compare::{compare, ChangeReason, Comparison};
pub use executor::{
    ExecutionResult, PlanExecutor, UnitFailure, UnitOutcome, UnitStage, UnitStatus,
    DEFAULT_MAX_CONCURRENCY,
};
pub use plan::{PlannedUnit, ReconciliationAction, ReconciliationPlan};
