//! partscan-intake - inventory intake service
//!
//! Reads scanner input (stdin keyboard wedge and `POST /scans`), resolves
//! part numbers against the local CSV cache with a Mouser fallback, and
//! streams FOUND / NOT_FOUND events over SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partscan_common::config::{default_config_path, resolve_root_folder, RootFolderInitializer};
use partscan_common::events::EventBus;
use partscan_intake::catalog::MouserClient;
use partscan_intake::config::{
    load_bootstrap_config, resolve_mouser_api_key, CliOverrides, IntakeSettings,
};
use partscan_intake::frame::{frame_channel, FrameSource, LineScanner, NoDecoder};
use partscan_intake::pipeline::{Pipeline, PipelineConfig, ScanCounters};
use partscan_intake::resolver::PartResolver;
use partscan_intake::store::{CachePaths, CacheStore};
use partscan_intake::AppState;

/// Command-line arguments for partscan-intake
#[derive(Parser, Debug)]
#[command(name = "partscan-intake")]
#[command(about = "Inventory intake: scan, resolve and cache electronic parts")]
#[command(version)]
struct Args {
    /// Folder holding seen_codes.csv and parts.csv
    #[arg(short, long, env = "PARTSCAN_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// HTTP listen address
    #[arg(short, long, env = "PARTSCAN_BIND")]
    bind: Option<String>,

    /// Seconds before a repeated code is reported again
    #[arg(long)]
    rearm_secs: Option<u64>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not read scanner input from stdin
    #[arg(long)]
    no_stdin: bool,

    /// Seconds to wait for in-flight lookups at shutdown
    #[arg(long, default_value = "5")]
    shutdown_grace_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Read before tracing is installed; reported after
    let (toml_config, config_source) =
        load_bootstrap_config(args.config.clone().or_else(default_config_path))?;

    let cli = CliOverrides {
        bind_address: args.bind.clone(),
        rearm_window_secs: args.rearm_secs,
    };
    let settings = IntakeSettings::resolve(&cli, &toml_config);

    // Initialize tracing
    let level = &settings.log_level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "partscan_intake={level},partscan_common={level},tower_http={level}"
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting partscan-intake");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    // Root folder and durable tables
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let store = Arc::new(
        CacheStore::load(CachePaths::in_folder(initializer.root_folder()))
            .context("Failed to load part cache")?,
    );

    // Catalog client
    let api_key = resolve_mouser_api_key(&toml_config)?;
    let catalog = MouserClient::with_base_url(
        api_key,
        settings.catalog_base_url.clone(),
        settings.catalog_requests_per_minute,
    )
    .context("Failed to build catalog client")?;
    let resolver = Arc::new(PartResolver::new(store.clone(), Arc::new(catalog)));

    let event_bus = EventBus::new(100);
    let counters = Arc::new(ScanCounters::default());
    let (sink, feed) = frame_channel();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        Arc::new(NoDecoder),
        store.clone(),
        resolver,
        event_bus.clone(),
        counters.clone(),
        PipelineConfig {
            rearm_window: settings.rearm_window,
            shutdown_grace: std::time::Duration::from_secs(args.shutdown_grace_secs),
        },
    );
    let pipeline_task = tokio::spawn(pipeline.run(feed, cancel.clone()));

    let scanner_task = if args.no_stdin {
        None
    } else {
        let scanner = LineScanner::stdin();
        let scanner_sink = sink.clone();
        let scanner_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = scanner.run(scanner_sink, scanner_cancel).await {
                warn!("{} stopped with error: {}", scanner.name(), e);
            }
        }))
    };

    let state = AppState::new(store, counters, event_bus, sink, cancel.clone());
    let app = partscan_intake::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_address))?;
    info!("Listening on http://{}", settings.bind_address);
    info!("Health check: http://{}/health", settings.bind_address);

    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_cancel.cancel();
        })
        .await
        .context("Server error")?;

    // Already cancelled unless the server stopped on its own
    cancel.cancel();
    if let Some(task) = scanner_task {
        if let Err(e) = task.await {
            warn!("Scanner task failed: {}", e);
        }
    }
    if let Err(e) = pipeline_task.await {
        warn!("Pipeline task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
