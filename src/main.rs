//! Livecam Server - main entry point.
//!
//! Construct each component once, wire the viewer and control servers,
//! run until a termination signal, then release sessions and the device.

use clap::Parser;
use livecam_server::capture::{CaptureSupervisor, DeviceFactory, PatternCamera};
use livecam_server::config_store::ConfigStore;
use livecam_server::control;
use livecam_server::fallback_source::FallbackSource;
use livecam_server::frame_channel::FrameChannel;
use livecam_server::snapshot_channel::SnapshotChannel;
use livecam_server::state::{AppConfig, AppState, SystemHealth};
use livecam_server::system_ops::SystemOps;
use livecam_server::web_api;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Live camera system
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Process config file
    #[arg(short = 'c', long, default_value = "camera.json")]
    config_file: PathBuf,

    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Livecam Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&cli.config_file).await?;
    tracing::info!(
        http_port = config.http_port,
        control_port = config.control_port,
        video_config = %config.video_config.display(),
        www_dir = %config.www_dir.display(),
        "Configuration loaded"
    );

    // Frame plumbing
    let frames = Arc::new(FrameChannel::new());
    let snapshots = Arc::new(SnapshotChannel::new());
    let fallback = Arc::new(FallbackSource::new(config.logo_file.as_deref())?);
    fallback.clone().start();

    // Capture settings
    let settings = Arc::new(ConfigStore::load(config.video_config.clone()).await?);
    tracing::info!("ConfigStore initialized");

    // Camera supervisor over the synthetic pattern device; a sensor
    // driver plugs in here behind the same factory seam.
    let factory: DeviceFactory = Box::new(|| Ok(Box::new(PatternCamera::new())));
    let capture = Arc::new(CaptureSupervisor::new(
        factory,
        settings.clone(),
        frames.clone(),
        snapshots.clone(),
    ));
    if let Err(e) = capture.start().await {
        tracing::warn!(error = %e, "Camera failed to start; viewers get placeholder frames");
    }

    let system_ops = Arc::new(SystemOps::new(config.software_dir.clone()));
    let system_health = Arc::new(RwLock::new(SystemHealth::default()));

    let state = AppState {
        config: config.clone(),
        settings,
        capture: capture.clone(),
        frames,
        fallback,
        snapshots,
        system_ops,
        system_health: system_health.clone(),
    };

    // System health monitoring
    tokio::spawn(async move {
        use sysinfo::System;
        let mut sys = System::new_all();
        let mut interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            interval.tick().await;
            sys.refresh_all();

            let cpu = {
                let cpus = sys.cpus();
                if cpus.is_empty() {
                    0.0
                } else {
                    cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
                }
            };
            let memory = if sys.total_memory() > 0 {
                (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
            } else {
                0.0
            };

            let mut health = system_health.write().await;
            health.update(cpu, memory);
        }
    });

    // Viewer server
    let viewer_app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());
    let viewer_addr = format!("{}:{}", config.host, config.http_port);
    let viewer_listener = tokio::net::TcpListener::bind(&viewer_addr).await?;
    tracing::info!(addr = %viewer_addr, "Viewer server listening");

    // Control server
    let control_app = control::create_router(state.clone()).layer(TraceLayer::new_for_http());
    let control_addr = format!("{}:{}", config.host, config.control_port);
    let control_listener = tokio::net::TcpListener::bind(&control_addr).await?;
    tracing::info!(addr = %control_addr, "Control server listening");

    let viewer_server = axum::serve(viewer_listener, viewer_app);
    let control_server = axum::serve(control_listener, control_app);

    // Stream bodies are unbounded, so a graceful drain would never
    // finish; on a termination signal the servers are dropped, which
    // tears down every session, then the device is released.
    tokio::select! {
        result = async { viewer_server.await } => result?,
        result = async { control_server.await } => result?,
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutting down");
    capture.stop().await;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("ctrl-c handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::warn!("Termination signal received");
}
