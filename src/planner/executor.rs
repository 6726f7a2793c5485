//! Plan executor for applying reconciliation plans.
//!
//! Each mutating unit runs in its own task and holds one semaphore permit
//! for its whole protocol: stamp labels, create, then delete the stale
//! resource if the create succeeded. Units never wait on each other and a
//! failing unit never cancels its siblings.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::DeploymentStamp;
use crate::error::{DeployError, RegistryError};
use crate::registry::TemplateRegistry;

use super::plan::{PlannedUnit, ReconciliationAction, ReconciliationPlan};

/// Default number of units in flight.
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;

/// Executor for reconciliation plans.
pub struct PlanExecutor {
    /// Remote registry.
    registry: Arc<dyn TemplateRegistry>,
    /// Labels stamped on every created template.
    stamp: DeploymentStamp,
    /// Maximum number of units in flight.
    max_concurrency: usize,
}

/// Step of a unit that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStage {
    /// Creating the new template.
    Create,
    /// Deleting the stale template.
    Delete,
    /// The unit task itself died.
    Task,
}

/// Terminal status of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    /// Nothing to do.
    Skipped,
    /// Created; nothing to delete.
    Deployed {
        /// Resource name of the new template.
        created: String,
    },
    /// Created, and the stale template is gone.
    Replaced {
        /// Resource name of the new template.
        created: String,
        /// Resource name of the removed template.
        deleted: String,
    },
    /// Create failed; nothing was deleted.
    CreateFailed {
        /// Error detail.
        error: String,
    },
    /// Created, but the stale template could not be deleted and still exists.
    DeleteFailed {
        /// Resource name of the new template.
        created: String,
        /// Resource name of the stale template.
        stale: String,
        /// Error detail.
        error: String,
    },
    /// The unit task panicked or was cancelled.
    Aborted {
        /// Error detail.
        error: String,
    },
}

/// Result of one unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    /// Position in the local template set.
    pub index: usize,
    /// File the template was loaded from.
    pub source_path: PathBuf,
    /// Display name of the template.
    pub display_name: String,
    /// Planned action.
    pub action: ReconciliationAction,
    /// What happened.
    pub status: UnitStatus,
}

/// A failed unit, attributed to its source file and stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    /// File the template was loaded from.
    pub source_path: PathBuf,
    /// Display name of the template.
    pub display_name: String,
    /// Failing stage.
    pub stage: UnitStage,
    /// Resource the failing call targeted, if any.
    pub resource: Option<String>,
    /// Error detail.
    pub detail: String,
}

/// Result of executing a plan.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// One outcome per planned unit, in plan order.
    pub outcomes: Vec<UnitOutcome>,
}

impl UnitOutcome {
    fn new(unit: &PlannedUnit, status: UnitStatus) -> Self {
        Self {
            index: unit.index,
            source_path: unit.template.source_path.clone(),
            display_name: unit.template.display_name.clone(),
            action: unit.action.clone(),
            status,
        }
    }

    /// Returns the failure carried by this outcome, if any.
    #[must_use]
    pub fn failure(&self) -> Option<UnitFailure> {
        let (stage, resource, detail) = match &self.status {
            UnitStatus::Skipped | UnitStatus::Deployed { .. } | UnitStatus::Replaced { .. } => {
                return None;
            }
            UnitStatus::CreateFailed { error } => (UnitStage::Create, None, error),
            UnitStatus::DeleteFailed { stale, error, .. } => {
                (UnitStage::Delete, Some(stale.clone()), error)
            }
            UnitStatus::Aborted { error } => (UnitStage::Task, None, error),
        };

        Some(UnitFailure {
            source_path: self.source_path.clone(),
            display_name: self.display_name.clone(),
            stage,
            resource,
            detail: detail.clone(),
        })
    }

    /// Returns true if the unit failed at any stage.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.failure().is_some()
    }
}

impl ExecutionResult {
    /// Number of skipped units.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Skipped))
    }

    /// Number of units whose create succeeded without a completed replace.
    #[must_use]
    pub fn deployed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Deployed { .. } | UnitStatus::DeleteFailed { .. }))
    }

    /// Number of units that created and then removed the stale template.
    #[must_use]
    pub fn replaced(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Replaced { .. }))
    }

    /// Every failure, in plan order.
    #[must_use]
    pub fn failures(&self) -> Vec<UnitFailure> {
        self.outcomes.iter().filter_map(UnitOutcome::failure).collect()
    }

    /// Returns true if no unit failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(UnitOutcome::is_failure)
    }

    fn count(&self, predicate: impl Fn(&UnitStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

impl PlanExecutor {
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(registry: Arc<dyn TemplateRegistry>, stamp: DeploymentStamp) -> Self {
        Self {
            registry,
            stamp,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Sets the number of units in flight; values below one are raised to one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Executes a plan and returns one outcome per unit.
    pub async fn execute(&self, plan: ReconciliationPlan) -> ExecutionResult {
        info!(
            "Executing plan: {} unit(s), {} in flight at most",
            plan.len(),
            self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<UnitOutcome>();

        let mut outcomes = Vec::with_capacity(plan.len());
        let mut handles: Vec<(UnitOutcome, JoinHandle<()>)> = Vec::new();

        for unit in plan.units {
            if !unit.action.is_mutation() {
                info!(
                    "Skipping '{}' from {}: {}",
                    unit.template.display_name,
                    unit.template.source_label(),
                    unit.comparison
                );
                outcomes.push(UnitOutcome::new(&unit, UnitStatus::Skipped));
                continue;
            }

            // Stand-in outcome used only if the task dies before reporting.
            let placeholder = UnitOutcome::new(&unit, UnitStatus::Skipped);

            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    outcomes.push(UnitOutcome {
                        status: UnitStatus::Aborted {
                            error: format!("Concurrency gate closed: {e}"),
                        },
                        ..placeholder
                    });
                    continue;
                }
            };

            let registry = Arc::clone(&self.registry);
            let stamp = self.stamp.clone();
            let tx = tx.clone();
            let span = info_span!(
                "unit",
                template = %unit.template.display_name,
                source = %unit.template.source_label()
            );

            let handle = tokio::spawn(
                async move {
                    let outcome = run_unit(registry.as_ref(), unit, &stamp).await;
                    drop(permit);
                    if tx.send(outcome).is_err() {
                        warn!("Outcome receiver dropped");
                    }
                }
                .instrument(span),
            );
            handles.push((placeholder, handle));
        }

        drop(tx);

        for (placeholder, handle) in handles {
            if let Err(e) = handle.await {
                error!(
                    "Unit for {} did not complete: {e}",
                    placeholder.source_path.display()
                );
                outcomes.push(UnitOutcome {
                    status: UnitStatus::Aborted {
                        error: format!("Unit task failed: {e}"),
                    },
                    ..placeholder
                });
            }
        }

        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|o| o.index);
        debug!("Collected {} outcome(s)", outcomes.len());

        ExecutionResult { outcomes }
    }
}

/// Runs one mutating unit: stamp, create, then delete on success.
async fn run_unit(
    registry: &dyn TemplateRegistry,
    unit: PlannedUnit,
    stamp: &DeploymentStamp,
) -> UnitOutcome {
    let PlannedUnit {
        index,
        mut template,
        action,
        ..
    } = unit;

    template.stamp_labels(stamp);
    let source = template.source_label();

    info!("Creating '{}' from {source}", template.display_name);

    let status = match registry.create(&template).await {
        Err(e) => {
            error!("Create failed for {source}: {e}");
            UnitStatus::CreateFailed {
                error: e.to_string(),
            }
        }
        Ok(created) => match action.stale_resource() {
            None => UnitStatus::Deployed {
                created: created.resource_name,
            },
            Some(stale) => {
                info!("Deleting stale template {stale}");
                match registry.delete(stale).await {
                    Ok(()) => UnitStatus::Replaced {
                        created: created.resource_name,
                        deleted: stale.to_string(),
                    },
                    // Only a 404 on the stale template itself proves it is gone.
                    Err(DeployError::Registry(RegistryError::NotFound { name }))
                        if name == stale =>
                    {
                        warn!("Stale template {stale} was already gone");
                        UnitStatus::Replaced {
                            created: created.resource_name,
                            deleted: stale.to_string(),
                        }
                    }
                    Err(e) => {
                        error!("Delete of {stale} failed for {source}: {e}");
                        UnitStatus::DeleteFailed {
                            created: created.resource_name,
                            stale: stale.to_string(),
                            error: e.to_string(),
                        }
                    }
                }
            }
        },
    };

    UnitOutcome {
        index,
        source_path: template.source_path,
        display_name: template.display_name,
        action,
        status,
    }
}
