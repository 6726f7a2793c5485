//! Reconciler driving one deployment run.
//!
//! A run is: snapshot the registry once, plan every local template against
//! that snapshot, then execute the plan. Only a failed snapshot is fatal;
//! per-template failures end up in the [`RunReport`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{DeploymentStamp, Provenance};
use crate::error::Result;
use crate::planner::{
    PlanExecutor, ReconciliationPlan, UnitFailure, UnitOutcome, DEFAULT_MAX_CONCURRENCY,
};
use crate::registry::{RemoteSnapshot, TemplateRegistry};
use crate::template::LocalTemplate;

/// Reconciler for a remote template registry.
pub struct Reconciler {
    /// Remote registry.
    registry: Arc<dyn TemplateRegistry>,
    /// CI provenance stamped on created templates.
    provenance: Provenance,
    /// Maximum number of units in flight.
    max_concurrency: usize,
}

/// Result of a reconciliation run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Units with nothing to do.
    pub skipped: usize,
    /// Units that created a template without completing a replace.
    pub deployed: usize,
    /// Units that created a template and removed the stale one.
    pub replaced: usize,
    /// Failed units, attributed to source file and stage.
    pub failures: Vec<UnitFailure>,
    /// Every unit outcome, in load order.
    pub units: Vec<UnitOutcome>,
}

impl Reconciler {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(registry: Arc<dyn TemplateRegistry>, provenance: Provenance) -> Self {
        Self {
            registry,
            provenance,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Sets the maximum number of units in flight.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Snapshots the registry and plans the templates without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be taken.
    pub async fn plan(
        &self,
        templates: Vec<LocalTemplate>,
    ) -> Result<(RemoteSnapshot, ReconciliationPlan)> {
        let snapshot = RemoteSnapshot::fetch(&self.registry).await?;
        info!(
            "Remote registry holds {} template(s)",
            snapshot.len()
        );
        if !snapshot.duplicates().is_empty() {
            warn!(
                "{} remote template(s) share a display name and were ignored",
                snapshot.duplicates().len()
            );
        }

        let plan = ReconciliationPlan::build(templates, &snapshot);
        Ok((snapshot, plan))
    }

    /// Runs a full reconciliation, stamping the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be taken.
    pub async fn run(&self, templates: Vec<LocalTemplate>) -> Result<RunReport> {
        let stamp = DeploymentStamp::now(self.provenance.clone());
        self.run_with_stamp(templates, stamp).await
    }

    /// Runs a full reconciliation with a fixed deployment stamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be taken.
    pub async fn run_with_stamp(
        &self,
        templates: Vec<LocalTemplate>,
        stamp: DeploymentStamp,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting reconciliation run {run_id} for {} template(s)",
            templates.len()
        );

        let (_, plan) = self.plan(templates).await?;
        info!(
            "Plan: {} skip, {} deploy, {} replace",
            plan.skip_count(),
            plan.deploy_count(),
            plan.replace_count()
        );

        let result = PlanExecutor::new(Arc::clone(&self.registry), stamp)
            .with_max_concurrency(self.max_concurrency)
            .execute(plan)
            .await;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            skipped: result.skipped(),
            deployed: result.deployed(),
            replaced: result.replaced(),
            failures: result.failures(),
            units: result.outcomes,
        };

        if report.is_success() {
            info!("{report}");
        } else {
            error!("{report}");
        }

        Ok(report)
    }
}

impl RunReport {
    /// Returns true if no unit failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Run {}: {} skipped, {} deployed, {} replaced, {} error(s)",
            self.run_id,
            self.skipped,
            self.deployed,
            self.replaced,
            self.failures.len()
        )
    }
}
