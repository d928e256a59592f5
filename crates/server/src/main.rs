use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use vellum_delivery::DeliveryServiceBuilder;
use vellum_server::api::AppState;
use vellum_server::audit_factory::create_audit_store;
use vellum_server::blob_factory::create_object_store;
use vellum_server::config::VellumConfig;
use vellum_server::notifier_factory::create_notifier;
use vellum_server::store_factory::{create_store, migrate_store};

/// Vellum document delivery HTTP server.
#[derive(Parser, Debug)]
#[command(name = "vellum-server", about = "Standalone HTTP server for Vellum")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "vellum.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run database migrations for the configured store and audit backends, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    config.apply_env_overrides(|name| std::env::var(name).ok());

    vellum_server::telemetry::init(&config.telemetry);

    if matches!(cli.command, Some(Commands::Migrate)) {
        return run_migrate(&config).await;
    }

    let stores = create_store(&config.store).await?;
    let objects = create_object_store(&config.blob).await?;
    let audit = create_audit_store(&config.audit).await?;
    let notifier = create_notifier(&config.email)?;
    let delivery_config = config.delivery.to_delivery_config(config.external_url())?;

    info!(
        store = %config.store.backend,
        blob = %config.blob.backend,
        audit = audit.is_some(),
        limit = %delivery_config.default_policy.download_limit,
        "backends ready"
    );

    let mut builder = DeliveryServiceBuilder::new()
        .store(stores.purchases)
        .catalog(stores.catalog)
        .objects(objects)
        .notifier(notifier)
        .config(delivery_config);
    if let Some(audit) = audit {
        builder = builder.audit(audit);
    }
    let delivery = Arc::new(builder.build()?);

    if config.server.app_key.is_none() {
        info!("no app key configured, POST /v1/watermark is disabled");
    }

    let state = AppState {
        delivery: Arc::clone(&delivery),
        app_key: config.server.app_key.as_deref().map(Arc::from),
    };
    let app = vellum_server::api::router(state);

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "vellum-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain pending purchase emails and audit writes.
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    info!(
        timeout_secs = config.server.shutdown_timeout_seconds,
        "waiting for background tasks..."
    );
    if !delivery.shutdown(shutdown_timeout).await {
        warn!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "shutdown timeout exceeded, some notifications or audit records may be lost"
        );
    }

    info!("vellum-server shut down");
    Ok(())
}

/// Read the config file, falling back to defaults when it does not exist.
fn load_config(path: &str) -> Result<VellumConfig, Box<dyn std::error::Error>> {
    let config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)?
    } else {
        eprintln!("config file {path} not found, using defaults");
        VellumConfig::default()
    };
    Ok(config)
}

async fn run_migrate(config: &VellumConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(backend = %config.store.backend, "running store migrations");
    migrate_store(&config.store).await?;

    if config.audit.enabled {
        info!(backend = %config.audit.backend, "running audit migrations");
        // Connecting creates the audit table.
        create_audit_store(&config.audit).await?;
    }

    info!("migrations complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
