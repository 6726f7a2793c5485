//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::planner::{ReconciliationAction, ReconciliationPlan, UnitStage};
use crate::reconciler::RunReport;
use crate::registry::RemoteTemplate;
use crate::template::{Fingerprinter, LoadReport, ValidationResult};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan unit row for table display.
#[derive(Tabled)]
struct PlanUnitRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Template")]
    template: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Remote template row for table display.
#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Machine")]
    machine: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
    #[tabled(rename = "Created")]
    created: String,
}

/// Failure row for table display.
#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Error")]
    detail: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a reconciliation plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &ReconciliationPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ReconciliationPlan) -> String {
        if !plan.has_changes() {
            return format!(
                "{} No changes required - {} template(s) up to date.\n",
                "✓".green(),
                plan.len()
            );
        }

        let mut output = String::from("\nReconciliation Plan\n\n");

        let rows: Vec<PlanUnitRow> = plan
            .units
            .iter()
            .map(|u| PlanUnitRow {
                index: u.index + 1,
                action: Self::format_action(&u.action),
                template: Self::truncate(&u.template.display_name, 40),
                source: u.template.source_label(),
                reason: Self::truncate(&u.comparison.to_string(), 40),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = writeln!(
            output,
            "\nPlan: {} to deploy, {} to replace, {} unchanged",
            plan.deploy_count().to_string().green(),
            plan.replace_count().to_string().yellow(),
            plan.skip_count()
        );

        for (stale, sources) in plan.shared_stale_resources() {
            let _ = writeln!(
                output,
                "{} {stale} is replaced by {}",
                "⚠".yellow(),
                sources.join(", ")
            );
        }

        output
    }

    /// Formats a run report.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let status = if report.is_success() {
                    format!("{} Deployment successful", "✓".green())
                } else {
                    format!("{} Deployment finished with errors", "✗".red())
                };

                let mut output = format!("{status}\n\n");
                let _ = writeln!(output, "   Run: {}", report.run_id);
                let _ = writeln!(output, "   Skipped: {}", report.skipped);
                let _ = writeln!(output, "   Deployed: {}", report.deployed);
                let _ = writeln!(output, "   Replaced: {}", report.replaced);

                if !report.failures.is_empty() {
                    let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
                    let rows: Vec<FailureRow> = report
                        .failures
                        .iter()
                        .map(|f| FailureRow {
                            source: f.source_path.display().to_string(),
                            stage: Self::format_stage(f.stage),
                            resource: f.resource.clone().unwrap_or_default(),
                            detail: Self::truncate(&f.detail, 60),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats a list of remote templates.
    #[must_use]
    pub fn format_templates(&self, templates: &[&RemoteTemplate]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(templates).unwrap_or_default(),
            OutputFormat::Text => {
                if templates.is_empty() {
                    return String::from("No templates found.\n");
                }

                let fingerprinter = Fingerprinter::new();
                let rows: Vec<TemplateRow> = templates
                    .iter()
                    .map(|t| TemplateRow {
                        name: Self::truncate(&t.display_name, 40),
                        id: t.short_id().to_string(),
                        machine: t.machine_type().unwrap_or("-").to_string(),
                        fingerprint: t
                            .fingerprint()
                            .map_or_else(|| String::from("-"), |fp| fingerprinter.short(fp)),
                        created: t.create_time.clone().unwrap_or_default(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = write!(output, "\n\n{} template(s)\n", templates.len());
                output
            }
        }
    }

    /// Formats one remote template for export. Always JSON.
    #[must_use]
    pub fn format_template(&self, template: &RemoteTemplate) -> String {
        serde_json::to_string_pretty(template).unwrap_or_default()
    }

    /// Formats the result of a deletion.
    #[must_use]
    pub fn format_deleted(&self, template: &RemoteTemplate) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "status": "deleted",
                "displayName": template.display_name,
                "name": template.resource_name,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} Deleted '{}' ({})\n",
                "✓".green(),
                template.display_name,
                template.resource_name
            ),
        }
    }

    /// Formats files that failed to load.
    #[must_use]
    pub fn format_load_report(&self, report: &LoadReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&LoadReportJson::from(report)).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!(
                    "Loaded {} template(s)\n",
                    report.templates.len()
                );
                if !report.failures.is_empty() {
                    let _ = write!(
                        output,
                        "\n{} {} file(s) failed to load:\n",
                        "✗".red(),
                        report.failures.len()
                    );
                    for failure in &report.failures {
                        let _ = writeln!(output, "   - {}", failure.error);
                    }
                }
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result
                    .errors
                    .iter()
                    .map(|e| serde_json::json!({ "field": e.field, "message": e.message }))
                    .collect::<Vec<_>>(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Templates are valid\n", "✓".green())
                } else {
                    let mut output = format!("{} Validation failed:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                    }
                    output
                };

                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats an action with color.
    fn format_action(action: &ReconciliationAction) -> String {
        match action {
            ReconciliationAction::Skip => "=skip".dimmed().to_string(),
            ReconciliationAction::Deploy => "+deploy".green().to_string(),
            ReconciliationAction::DeployThenDelete { .. } => "~replace".yellow().to_string(),
        }
    }

    /// Formats a failing stage with color.
    fn format_stage(stage: UnitStage) -> String {
        match stage {
            UnitStage::Create => "create".red().to_string(),
            UnitStage::Delete => "delete".yellow().to_string(),
            UnitStage::Task => "task".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct PlanJson {
    created_at: String,
    skip: usize,
    deploy: usize,
    replace: usize,
    units: Vec<UnitJson>,
}

#[derive(Serialize)]
struct UnitJson {
    index: usize,
    display_name: String,
    source_path: String,
    fingerprint: String,
    action: ReconciliationAction,
    reason: String,
}

impl From<&ReconciliationPlan> for PlanJson {
    fn from(plan: &ReconciliationPlan) -> Self {
        Self {
            created_at: plan.created_at.to_rfc3339(),
            skip: plan.skip_count(),
            deploy: plan.deploy_count(),
            replace: plan.replace_count(),
            units: plan
                .units
                .iter()
                .map(|u| UnitJson {
                    index: u.index,
                    display_name: u.template.display_name.clone(),
                    source_path: u.template.source_path.display().to_string(),
                    fingerprint: u.template.fingerprint().to_string(),
                    action: u.action.clone(),
                    reason: u.comparison.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct LoadReportJson {
    loaded: Vec<String>,
    failures: Vec<LoadFailureJson>,
}

#[derive(Serialize)]
struct LoadFailureJson {
    path: String,
    error: String,
}

impl From<&LoadReport> for LoadReportJson {
    fn from(report: &LoadReport) -> Self {
        Self {
            loaded: report
                .templates
                .iter()
                .map(|t| t.source_path.display().to_string())
                .collect(),
            failures: report
                .failures
                .iter()
                .map(|f| LoadFailureJson {
                    path: f.path.display().to_string(),
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}
