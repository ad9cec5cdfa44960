//! unitctl CLI entrypoint.
//!
//! This is the main entrypoint for the unitctl command-line tool.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use unit_controller::api::{ObjectKey, Unit};
use unit_controller::cli::{Cli, Commands, LogFormat, OutputFormatter};
use unit_controller::config::{
    load_unit_manifest, ConfigParser, ConfigValidator, ControllerConfig,
};
use unit_controller::error::{Result, StoreError};
use unit_controller::planner::plan_own_resources;
use unit_controller::reconciler::{PassOutcome, Reconciler};
use unit_controller::resources::ChildOwner;
use unit_controller::store::{ClusterStore, MemoryStore, ObjectStore};
use unit_controller::worker::{Action, RequeuePolicy, Worker};

use clap::Parser;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr so stdout stays clean
/// for command output.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Validate { file, warnings } => {
            cmd_validate(config_path, file.as_deref(), warnings, &formatter)
        }
        Commands::Plan { file, simulate } => cmd_plan(&file, simulate, &formatter).await,
        Commands::Reconcile { key, max_attempts } => {
            cmd_reconcile(config_path, key, max_attempts, &formatter).await
        }
        Commands::Status { key } => cmd_status(config_path, &key, &formatter).await,
    }
}

/// Validate configuration and, optionally, a Unit manifest.
fn cmd_validate(
    config_path: Option<&Path>,
    manifest: Option<&Path>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let validator = ConfigValidator::new();

    let config = ConfigParser::new().load(config_path)?;
    let result = validator.validate(&config)?;
    println!("{}", formatter.format_validation("Configuration", &result, show_warnings));

    if let Some(path) = manifest {
        info!("Validating manifest: {}", path.display());
        let unit = load_unit_manifest(path)?;
        let result = validator.validate_unit(&unit)?;
        println!(
            "{}",
            formatter.format_validation(&format!("Unit {}", unit.key()), &result, show_warnings)
        );
    }

    Ok(())
}

/// Show the children a manifest plans, optionally running a simulated pass.
async fn cmd_plan(file: &Path, simulate: bool, formatter: &OutputFormatter) -> Result<()> {
    let mut unit = load_unit_manifest(file)?;

    let validation = ConfigValidator::new().validate_unit(&unit)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    // Manifests carry no UID until the API server assigns one.
    if unit.metadata.uid.is_none() {
        unit.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
    }

    let plan = plan_own_resources(&unit);
    let owner = ChildOwner::for_unit(&unit)?;
    let rendered = plan
        .resources
        .iter()
        .map(|r| r.render(&owner))
        .collect::<Result<Vec<_>>>()?;
    println!("{}", formatter.format_plan(&plan, &rendered));

    if simulate {
        let store = Arc::new(MemoryStore::new());
        let key = store.insert(unit).await?.key();
        debug!("Simulating pass for {key} against {} store", store.backend_type());

        let worker = worker_for(store, info_span!("simulate"), RequeuePolicy::default());
        let (outcome, action) = worker.process(key).await;
        println!("{}", formatter.format_outcome(&outcome, action));
        return into_result(outcome);
    }

    Ok(())
}

/// Run reconcile passes for one Unit against the cluster.
async fn cmd_reconcile(
    config_path: Option<&Path>,
    key: ObjectKey,
    max_attempts: u32,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_validated_config(config_path)?;
    let store = Arc::new(ClusterStore::connect(&config.cluster).await?);
    let worker = worker_for(
        store,
        info_span!("controller", manager = %config.cluster.field_manager),
        RequeuePolicy::from_config(&config.reconcile),
    );

    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        info!("Reconciling Unit {key} (attempt {attempt}/{attempts})");
        let (outcome, action) = worker.process(key.clone()).await;
        println!("{}", formatter.format_outcome(&outcome, action));

        match action {
            Action::Requeue(delay) if attempt < attempts => {
                info!("Retrying in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            _ => return into_result(outcome),
        }
    }
}

/// Show the status stored on a Unit.
async fn cmd_status(
    config_path: Option<&Path>,
    key: &ObjectKey,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_validated_config(config_path)?;
    let store = ClusterStore::connect(&config.cluster).await?;

    let unit: Unit = store.get(key).await?.ok_or_else(|| StoreError::NotFound {
        kind: String::from("Unit"),
        key: key.to_string(),
    })?;

    println!("{}", formatter.format_status(&unit));
    Ok(())
}

fn load_validated_config(config_path: Option<&Path>) -> Result<ControllerConfig> {
    let config = ConfigParser::new().load(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(config)
}

fn worker_for<S: ObjectStore + 'static>(
    store: Arc<S>,
    span: tracing::Span,
    policy: RequeuePolicy,
) -> Worker<S> {
    Worker::new(Arc::new(Reconciler::new(store, span)), policy)
}

/// Maps a final pass outcome to the process result.
fn into_result(outcome: PassOutcome) -> Result<()> {
    match outcome {
        PassOutcome::Absent | PassOutcome::Success(_) => Ok(()),
        PassOutcome::Recoverable { error, .. } | PassOutcome::Fatal { error } => Err(error),
    }
}

