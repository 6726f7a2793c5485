//! Reconciliation plan types and construction.
//!
//! Each local template becomes exactly one planned unit. Units are
//! independent of each other; only the steps inside a unit are ordered.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::registry::RemoteSnapshot;
use crate::template::LocalTemplate;

use super::compare::{compare, Comparison};

/// What to do with one local template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconciliationAction {
    /// The remote template is up to date.
    Skip,
    /// Create the template.
    Deploy,
    /// Create the template, then delete the stale remote resource.
    DeployThenDelete {
        /// Resource name of the stale template.
        stale: String,
    },
}

/// A single planned unit.
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    /// Position in the local template set.
    pub index: usize,
    /// Template to reconcile.
    pub template: LocalTemplate,
    /// Action to take.
    pub action: ReconciliationAction,
    /// Comparison the action was derived from.
    pub comparison: Comparison,
}

/// A complete reconciliation plan.
#[derive(Debug, Clone)]
pub struct ReconciliationPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// One unit per local template, in load order.
    pub units: Vec<PlannedUnit>,
}

impl ReconciliationAction {
    /// Derives the action for a comparison.
    #[must_use]
    pub fn from_comparison(comparison: &Comparison, remote_name: Option<&str>) -> Self {
        match (comparison, remote_name) {
            (Comparison::Identical, _) => Self::Skip,
            (Comparison::Changed(_), Some(stale)) => Self::DeployThenDelete {
                stale: stale.to_string(),
            },
            (Comparison::NoMatch | Comparison::Changed(_), _) => Self::Deploy,
        }
    }

    /// Returns true if the action touches the registry.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Skip)
    }

    /// Resource the action deletes, if any.
    #[must_use]
    pub fn stale_resource(&self) -> Option<&str> {
        match self {
            Self::DeployThenDelete { stale } => Some(stale),
            Self::Skip | Self::Deploy => None,
        }
    }
}

impl ReconciliationPlan {
    /// Plans every template against a snapshot.
    #[must_use]
    pub fn build(templates: Vec<LocalTemplate>, snapshot: &RemoteSnapshot) -> Self {
        let units: Vec<PlannedUnit> = templates
            .into_iter()
            .enumerate()
            .map(|(index, template)| {
                let remote = snapshot.get(&template.display_name);
                let comparison = compare(&template, remote);
                let action = ReconciliationAction::from_comparison(
                    &comparison,
                    remote.map(|r| r.resource_name.as_str()),
                );
                debug!(
                    "Planned {} for '{}' ({comparison})",
                    action, template.display_name
                );
                PlannedUnit {
                    index,
                    template,
                    action,
                    comparison,
                }
            })
            .collect();

        let plan = Self {
            created_at: Utc::now(),
            units,
        };

        for (stale, sources) in plan.shared_stale_resources() {
            warn!(
                "Stale template {stale} is replaced by several local templates: {}",
                sources.join(", ")
            );
        }

        plan
    }

    /// Returns true if the plan has no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns the number of units that are skipped.
    #[must_use]
    pub fn skip_count(&self) -> usize {
        self.count(|a| matches!(a, ReconciliationAction::Skip))
    }

    /// Returns the number of create-only units.
    #[must_use]
    pub fn deploy_count(&self) -> usize {
        self.count(|a| matches!(a, ReconciliationAction::Deploy))
    }

    /// Returns the number of create-then-delete units.
    #[must_use]
    pub fn replace_count(&self) -> usize {
        self.count(|a| matches!(a, ReconciliationAction::DeployThenDelete { .. }))
    }

    /// Returns true if any unit mutates the registry.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.units.iter().any(|u| u.action.is_mutation())
    }

    /// Stale resources targeted by more than one unit, with the source
    /// files that target them.
    #[must_use]
    pub fn shared_stale_resources(&self) -> Vec<(String, Vec<String>)> {
        let mut targets: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for unit in &self.units {
            if let Some(stale) = unit.action.stale_resource() {
                targets
                    .entry(stale)
                    .or_default()
                    .push(unit.template.source_label());
            }
        }

        targets
            .into_iter()
            .filter(|(_, sources)| sources.len() > 1)
            .map(|(stale, sources)| (stale.to_string(), sources))
            .collect()
    }

    fn count(&self, predicate: impl Fn(&ReconciliationAction) -> bool) -> usize {
        self.units.iter().filter(|u| predicate(&u.action)).count()
    }
}

impl std::fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Deploy => write!(f, "deploy"),
            Self::DeployThenDelete { .. } => write!(f, "replace"),
        }
    }
}

impl std::fmt::Display for PlannedUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} '{}' from {}",
            self.action,
            self.template.display_name,
            self.template.source_label()
        )?;
        if let Some(stale) = self.action.stale_resource() {
            write!(f, ", then delete {stale}")?;
        }
        write!(f, " ({})", self.comparison)
    }
}

impl std::fmt::Display for ReconciliationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_changes() {
            return write!(f, "No changes required");
        }

        writeln!(
            f,
            "Reconciliation Plan ({} skip, {} deploy, {} replace):",
            self.skip_count(),
            self.deploy_count(),
            self.replace_count()
        )?;
        for unit in &self.units {
            writeln!(f, "  {}. {unit}", unit.index)?;
        }

        Ok(())
    }
}
