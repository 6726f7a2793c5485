//! dcloud CLI entrypoint.
//!
//! This is the main entrypoint for the dcloud command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use dcloud_templates::cli::{Cli, Commands, LogFormat, OutputFormatter};
use dcloud_templates::config::{access_token, load_dotenv, Provenance, RegistryConfig};
use dcloud_templates::error::{ConfigError, DeployError, RegistryError, Result};
use dcloud_templates::reconciler::Reconciler;
use dcloud_templates::registry::{RemoteSnapshot, RemoteTemplate, VertexClient};
use dcloud_templates::template::{TemplateLoader, TemplateValidator};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    // Before parsing, so .env values feed the clap env fallbacks.
    let dotenv = load_dotenv(None);

    let cli = Cli::parse();

    init_logging(&cli);

    match dotenv {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => debug!("No .env file in the working directory"),
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr; stdout carries results.
fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.silent {
        "warn"
    } else {
        "info"
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match &cli.command {
        Commands::Validate { templates } => cmd_validate(templates, &formatter),
        Commands::Deploy {
            templates,
            threads,
            dry_run: true,
        } => {
            debug!("Dry run requested with {threads} thread(s)");
            cmd_plan(&cli, templates, &formatter).await
        }
        Commands::Deploy {
            templates,
            threads,
            dry_run: false,
        } => cmd_deploy(&cli, templates, usize::from(*threads), &formatter).await,
        Commands::List => cmd_list(&cli, &formatter).await,
        Commands::Delete { name } => cmd_delete(&cli, name, &formatter).await,
        Commands::Export { name } => cmd_export(&cli, name, &formatter).await,
    }
}

/// Validate templates offline.
fn cmd_validate(dir: &Path, formatter: &OutputFormatter) -> Result<ExitCode> {
    let report = TemplateLoader::new().load_dir_report(dir)?;
    if !report.is_complete() {
        emit(&formatter.format_load_report(&report))?;
    }

    let result = TemplateValidator::new().check(&report.templates);
    emit(&formatter.format_validation(&result))?;

    Ok(exit_code(report.is_complete() && result.is_valid()))
}

/// Show the plan for a template directory without mutating anything.
async fn cmd_plan(cli: &Cli, dir: &Path, formatter: &OutputFormatter) -> Result<ExitCode> {
    let report = TemplateLoader::new().load_dir_report(dir)?;
    if !report.is_complete() {
        emit(&formatter.format_load_report(&report))?;
    }

    let validation = TemplateValidator::new().check(&report.templates);
    if !validation.is_valid() || !validation.warnings.is_empty() {
        emit(&formatter.format_validation(&validation))?;
    }

    let client = create_client(cli)?;
    let reconciler = Reconciler::new(Arc::new(client), Provenance::from_env());
    let complete = report.is_complete();
    let (_, plan) = reconciler.plan(report.templates).await?;

    emit(&formatter.format_plan(&plan))?;

    Ok(exit_code(complete && validation.is_valid()))
}

/// Deploy a template directory.
async fn cmd_deploy(
    cli: &Cli,
    dir: &Path,
    threads: usize,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    // Any bad file aborts the run before the registry is contacted.
    let templates = TemplateLoader::new().load_dir(dir)?;
    let validation = TemplateValidator::new().validate(&templates)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let client = create_client(cli)?;
    let provenance = Provenance::from_env();
    if provenance.is_empty() {
        debug!("No CI provenance found in the environment");
    }

    let report = Reconciler::new(Arc::new(client), provenance)
        .with_max_concurrency(threads)
        .run(templates)
        .await?;

    emit(&formatter.format_report(&report))?;

    Ok(exit_code(report.is_success()))
}

/// List remote templates.
async fn cmd_list(cli: &Cli, formatter: &OutputFormatter) -> Result<ExitCode> {
    let client = create_client(cli)?;
    let snapshot = RemoteSnapshot::fetch(&client).await?;

    let mut templates = snapshot.templates();
    templates.extend(snapshot.duplicates());
    templates.sort_by(|a, b| a.display_name.cmp(&b.display_name));

    emit(&formatter.format_templates(&templates))?;
    Ok(ExitCode::SUCCESS)
}

/// Delete a remote template by display name.
async fn cmd_delete(cli: &Cli, name: &str, formatter: &OutputFormatter) -> Result<ExitCode> {
    let client = create_client(cli)?;
    let target = find_by_display_name(&client, name).await?;

    info!("Deleting '{name}' ({})", target.resource_name);
    client.delete_template(&target.resource_name).await?;

    emit(&formatter.format_deleted(&target))?;
    Ok(ExitCode::SUCCESS)
}

/// Print a remote template as JSON.
async fn cmd_export(cli: &Cli, name: &str, formatter: &OutputFormatter) -> Result<ExitCode> {
    let client = create_client(cli)?;
    let target = find_by_display_name(&client, name).await?;
    let template = client.get_template(&target.resource_name).await?;

    emit(&formatter.format_template(&template))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Looks a template up by display name in a fresh snapshot.
async fn find_by_display_name(client: &VertexClient, name: &str) -> Result<RemoteTemplate> {
    let snapshot = RemoteSnapshot::fetch(client).await?;
    snapshot.get(name).cloned().ok_or_else(|| {
        DeployError::Registry(RegistryError::NotFound {
            name: name.to_string(),
        })
    })
}

/// Creates the registry client from CLI settings and the environment.
fn create_client(cli: &Cli) -> Result<VertexClient> {
    let project = cli.project.clone().ok_or_else(|| {
        DeployError::Config(ConfigError::MissingEnvVar {
            name: String::from("DCLOUD_PROJECT"),
        })
    })?;

    let config =
        RegistryConfig::new(project, cli.location.clone()).with_endpoint(cli.endpoint.clone());
    config.validate()?;

    debug!("Using registry endpoint {} for {}", config.endpoint(), config.parent());
    VertexClient::new(&config, access_token()?)
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}

const fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
