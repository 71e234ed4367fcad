use miner_sentry::config::ProcessConfig;
use miner_sentry::reload::{PidMarker, ReloadSignal};
use miner_sentry::services::{DaemonContext, ServiceContainer, ShutdownSignals};
use miner_sentry::utils::http_client;
use miner_sentry::{logging, panic_hook};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let process = ProcessConfig::from_env()?;

    let (log_files, _guard) = logging::init_logging(&process.log_dir, "miner-sentry.log")?;
    panic_hook::install(&log_files);
    http_client::install_rustls_provider();

    tracing::info!("miner-sentry {} starting", env!("CARGO_PKG_VERSION"));

    // Handlers go in before the marker is published: the web process may
    // send SIGHUP as soon as it can read our PID.
    let mut shutdown = ShutdownSignals::register()?;
    let hangup = ReloadSignal::register()?;

    // Dropped on every early return below, which removes the marker.
    let marker = PidMarker::acquire(process.pid_file.clone())?;

    let services = ServiceContainer::new(process).await?;
    log_files.start_retention_cleanup(services.cancellation_token());

    let token = services.cancellation_token();
    let started = tokio::select! {
        started = DaemonContext::start(services, marker, hangup) => started?,
        _ = shutdown.recv() => {
            // Dropping the unfinished start releases the marker.
            token.cancel();
            tracing::info!("Shutdown requested during startup");
            return Ok(());
        }
    };

    let (daemon, summary) = started;
    tracing::info!(
        "Startup poll finished: {}/{} miners responded",
        summary.succeeded,
        summary.total
    );

    shutdown.recv().await;
    daemon.shutdown().await;

    tracing::info!("miner-sentry stopped");
    Ok(())
}
