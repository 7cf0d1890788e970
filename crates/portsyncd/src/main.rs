// # portsyncd - Port Sync Daemon
//
// Keeps qBittorrent's listening port equal to the port Gluetun forwards
// through the VPN.
//
// The daemon is a thin integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the Gluetun and qBittorrent clients into the sync engine
// 4. Serving the health endpoint and handling shutdown signals
//
// All reconciliation logic lives in portsync-core.
//
// ## Configuration
//
// ### Gluetun
// - `GLUETUN_URL`: Control server URL (required)
// - `GLUETUN_API_KEY`: API key, sent as `X-API-Key`
// - `GLUETUN_USERNAME` / `GLUETUN_PASSWORD`: HTTP basic auth
//
// ### qBittorrent
// - `QBITTORRENT_URL`: Web UI URL (required)
// - `QBITTORRENT_USERNAME` / `QBITTORRENT_PASSWORD`: Web UI login
// - `QBITTORRENT_VERIFY_SSL`: Verify TLS certificates (default: true)
//
// ### Timing (seconds unless noted)
// - `STARTUP_CHECK_DELAY` (5), `STARTUP_CHECK_INTERVAL` (5),
//   `STARTUP_MAX_ATTEMPTS` (60 attempts)
// - `POLL_INTERVAL` (30), `REQUEST_TIMEOUT` (10)
// - `VERIFY_DELAY` (2), `VERIFY_MAX_ATTEMPTS` (3 attempts)
//
// ### Daemon
// - `LOG_LEVEL`: DEBUG, INFO, WARN or ERROR (default: INFO)
// - `HEALTH_ENABLED`: Serve `GET /health` (default: true)
// - `HEALTH_PORT`: Health endpoint port (default: 8081)
//
// ## Example
//
// ```bash
// export GLUETUN_URL=http://gluetun:8000
// export GLUETUN_API_KEY=your_key
// export QBITTORRENT_URL=http://qbittorrent:8080
// export QBITTORRENT_USERNAME=admin
// export QBITTORRENT_PASSWORD=adminadmin
//
// portsyncd
// ```

mod env;
mod health_server;

use anyhow::Result;
use env::DaemonConfig;
use portsync_core::{ClientPortTarget, GatewayPortSource, HealthStatus, SyncEngine};
use portsync_gluetun::GluetunPortSource;
use portsync_qbittorrent::QBittorrentPortTarget;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PortsyncExitCode> for ExitCode {
    fn from(code: PortsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// How the daemon stopped
enum DaemonError {
    /// Services never became ready, or rejected our credentials
    Startup(portsync_core::Error),
    /// Anything else
    Runtime(anyhow::Error),
}

fn main() -> ExitCode {
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Subscriber is not installed yet
            for line in e.to_string().lines() {
                eprintln!("Configuration error: {}", line);
            }
            return PortsyncExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PortsyncExitCode::ConfigError.into();
    }

    info!("Starting portsyncd v{}", env!("CARGO_PKG_VERSION"));
    config.sync.log_summary();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PortsyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => PortsyncExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {}", e);
                PortsyncExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {}", e);
                PortsyncExitCode::RuntimeError
            }
        }
    });

    info!("portsyncd stopped");
    code.into()
}

/// Wire the collaborators and run the engine until shutdown
async fn run_daemon(config: DaemonConfig) -> std::result::Result<(), DaemonError> {
    let sync = config.sync;
    let timeout = sync.timing.request_timeout();

    let gateway: Arc<dyn GatewayPortSource> = Arc::new(
        GluetunPortSource::with_timeout(&sync.gateway, timeout)
            .map_err(|e| DaemonError::Runtime(e.into()))?,
    );
    let client: Arc<dyn ClientPortTarget> = Arc::new(
        QBittorrentPortTarget::with_timeout(&sync.client, timeout)
            .map_err(|e| DaemonError::Runtime(e.into()))?,
    );
    let health = Arc::new(HealthStatus::new());

    let health_task = if sync.health.enabled {
        let listener = health_server::bind(sync.health.port)
            .await
            .map_err(DaemonError::Runtime)?;
        let health = health.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = health_server::serve(listener, health).await {
                error!("Health server error: {}", e);
            }
        }))
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let signal_task = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let engine = SyncEngine::new(gateway, client, health, sync.timing);
    let result = engine.run_with_shutdown(Some(shutdown_rx)).await;

    signal_task.abort();
    if let Some(task) = health_task {
        task.abort();
    }

    result.map_err(DaemonError::Startup)
}

/// Wait for SIGTERM or SIGINT
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
