//! Mesh enforcer CLI entrypoint.
//!
//! This is the main entrypoint for the mesh-enforcer command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use mesh_enforcer::appmesh::{
    AppMeshEnforcer, AppMeshTranslator, DesiredResources, SdkAppMeshApiFactory,
    StaticCredentialResolver,
};
use mesh_enforcer::cli::{Cli, Commands, OutputFormatter};
use mesh_enforcer::config::{
    ConfigParser, ConfigValidator, EnforcerConfig, LogFormat, ManifestValidator, StoreBackend,
    find_config_file,
};
use mesh_enforcer::enforcement::{
    EnforcementOrchestrator, PolicyGroupWatcher, default_enforcement,
};
use mesh_enforcer::error::Result;
use mesh_enforcer::model::StatusState;
use mesh_enforcer::store::{LocalResourceStore, Manifest, ResourceStore, S3ResourceStore};
use mesh_enforcer::topology::TopologyResolver;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Loaded configuration and the store it points at.
struct Context {
    config: EnforcerConfig,
    store: Arc<dyn ResourceStore>,
}

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_format = cli
        .log_format
        .unwrap_or_else(|| configured_log_format(cli.config.as_ref()));
    init_logging(cli.verbose, log_format);

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

/// Initializes the logging system.
///
/// `-v` forces debug output; otherwise `RUST_LOG` wins over the info default.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Reads the log format from the configuration, falling back to text.
fn configured_log_format(config_path: Option<&PathBuf>) -> LogFormat {
    resolve_config_path(config_path)
        .and_then(|path| ConfigParser::new().load_with_env(path))
        .map_or(LogFormat::Text, |config| config.logging.format)
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => {
            cmd_validate(cli.config.as_ref(), warnings, &formatter).await
        }
        Commands::Plan { mesh, enforce, open } => {
            let mode = if enforce {
                Some(true)
            } else if open {
                Some(false)
            } else {
                None
            };
            cmd_plan(cli.config.as_ref(), mesh.as_deref(), mode, &formatter).await
        }
        Commands::Run { watch } => cmd_run(cli.config.as_ref(), watch, &formatter).await,
        Commands::Status => cmd_status(cli.config.as_ref(), &formatter).await,
    }
}

/// Validate configuration and manifest.
async fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let context = load_context(config_path).await?;
    let config_result = ConfigValidator::new().validate(&context.config)?;
    emit(&formatter.format_validation("Configuration", &config_result, show_warnings));

    let manifest = read_manifest(context.store.as_ref()).await?;
    info!(
        "Validating manifest: {} meshes, {} services, {} workloads, {} policies, {} virtual meshes",
        manifest.meshes.len(),
        manifest.mesh_services.len(),
        manifest.mesh_workloads.len(),
        manifest.access_control_policies.len(),
        manifest.virtual_meshes.len()
    );
    let manifest_result = ManifestValidator::new().validate(&manifest)?;
    emit(&formatter.format_validation("Manifest", &manifest_result, show_warnings));

    Ok(())
}

/// Show the desired App Mesh resources.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    mesh_filter: Option<&str>,
    mode: Option<bool>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let context = load_context(config_path).await?;
    let store = context.store.as_ref();
    let resolver = TopologyResolver::new(store);
    let translator = AppMeshTranslator::new();

    let mut plans = Vec::new();
    for mesh in store.list_meshes().await? {
        if mesh_filter.is_some_and(|name| name != mesh.metadata.name) {
            continue;
        }
        let Some(spec) = mesh.app_mesh() else {
            debug!("Skipping mesh {} ({})", mesh.metadata, mesh.mesh_type);
            continue;
        };

        let enforced = match mode {
            Some(enforced) => enforced,
            None => default_enforcement(&mesh)?,
        };
        let snapshot = resolver.snapshot(&mesh).await?;
        plans.push(DesiredResources::build(&translator, &snapshot, &spec.name, enforced)?);
    }

    emit(&formatter.format_plan(&plans));
    Ok(())
}

/// Reconcile every virtual mesh once, or keep watching.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    watch: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let context = load_context(config_path).await?;
    let orchestrator = build_orchestrator(&context).await;

    if !watch {
        let statuses = orchestrator.process_all().await?;
        emit(&formatter.format_run(&statuses));
        return Ok(());
    }

    let interval = Duration::from_secs(context.config.reconcile.watch_interval_secs);
    info!("Watching for changes every {}s", interval.as_secs());

    let mut watcher = PolicyGroupWatcher::new();
    let mut ticker = tokio::time::interval(interval);

    loop {
        let cycle = async {
            ticker.tick().await;
            watch_cycle(&mut watcher, context.store.as_ref(), &orchestrator).await
        };

        let outcome = tokio::select! {
            _ = tokio::signal::ctrl_c() => None,
            result = cycle => Some(result),
        };

        match outcome {
            None => {
                info!("Interrupted, stopping watch");
                return Ok(());
            }
            Some(Ok(true)) => {}
            Some(Ok(false)) => {
                warn!("Some virtual meshes were not accepted, retrying next cycle");
                watcher.force_resync();
            }
            Some(Err(e)) => {
                error!("Watch cycle failed: {e}");
                watcher.force_resync();
            }
        }
    }
}

/// Runs one watch cycle. Returns false if any virtual mesh was not accepted.
async fn watch_cycle(
    watcher: &mut PolicyGroupWatcher,
    store: &dyn ResourceStore,
    orchestrator: &EnforcementOrchestrator,
) -> Result<bool> {
    let events = watcher.poll(store).await?;
    if events.is_empty() {
        return Ok(true);
    }

    info!("Handling {} virtual mesh events", events.len());
    let mut all_accepted = true;
    for event in &events {
        if let Some(status) = orchestrator.handle(event).await? {
            all_accepted &= status.access_control_enforcement.state == StatusState::Accepted;
        }
        watcher.acknowledge(event);
    }
    Ok(all_accepted)
}

/// Show virtual mesh statuses.
async fn cmd_status(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let context = load_context(config_path).await?;
    let virtual_meshes = context.store.list_virtual_meshes().await?;

    emit(&formatter.format_status(&virtual_meshes));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Writes command output to stdout.
fn emit(output: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads configuration and creates the configured resource store.
async fn load_context(config_path: Option<&PathBuf>) -> Result<Context> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let base = config_file.parent().unwrap_or_else(|| Path::new("."));
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    ConfigValidator::new().validate(&config)?;

    let store: Arc<dyn ResourceStore> = match config.store.backend {
        StoreBackend::Local => {
            let manifest = parser.resolve_path(&config.store.manifest);
            match &config.store.status_path {
                Some(status) => Arc::new(LocalResourceStore::with_status_path(
                    manifest,
                    parser.resolve_path(status),
                )),
                None => Arc::new(LocalResourceStore::new(manifest)),
            }
        }
        StoreBackend::S3 => {
            let bucket = config.store.bucket.as_deref().ok_or_else(|| {
                mesh_enforcer::error::EnforcerError::internal("S3 bucket not configured")
            })?;
            let prefix = config.store.prefix.as_deref();
            let region = config.store.region.as_deref();
            Arc::new(S3ResourceStore::new(bucket, prefix, region).await)
        }
    };
    debug!("Using {} resource store", store.backend_type());

    Ok(Context { config, store })
}

/// Builds the orchestrator with every supported enforcer.
///
/// The ambient AWS config is loaded once and shared by every account's
/// client and role session.
async fn build_orchestrator(context: &Context) -> EnforcementOrchestrator {
    let base = aws_config::load_from_env().await;
    let credentials = Arc::new(StaticCredentialResolver::from_config(
        &context.config.credentials,
        base.clone(),
    ));
    let factory = Arc::new(SdkAppMeshApiFactory::new(
        base,
        context.config.provider.client_settings(),
    ));
    let app_mesh = AppMeshEnforcer::new(context.store.clone(), credentials, factory)
        .with_surface_provider_errors(context.config.reconcile.surface_provider_errors);

    EnforcementOrchestrator::new(context.store.clone()).with_enforcer(Arc::new(app_mesh))
}

/// Reads the full topology back out of the store.
async fn read_manifest(store: &dyn ResourceStore) -> Result<Manifest> {
    Ok(Manifest {
        meshes: store.list_meshes().await?,
        mesh_services: store.list_mesh_services().await?,
        mesh_workloads: store.list_mesh_workloads().await?,
        access_control_policies: store.list_access_control_policies().await?,
        virtual_meshes: store.list_virtual_meshes().await?,
    })
}
