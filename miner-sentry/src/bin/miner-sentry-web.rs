use miner_sentry::api::{ApiServer, ApiServerConfig, AppState};
use miner_sentry::config::ProcessConfig;
use miner_sentry::services::{ServiceContainer, ShutdownSignals};
use miner_sentry::utils::http_client;
use miner_sentry::{logging, panic_hook};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let process = ProcessConfig::from_env()?;

    let (log_files, _guard) = logging::init_logging(&process.log_dir, "miner-sentry-web.log")?;
    panic_hook::install(&log_files);
    http_client::install_rustls_provider();

    let mut shutdown = ShutdownSignals::register()?;

    let bind_address = process.web_addr;
    let services = ServiceContainer::new(process).await?;
    let token = services.cancellation_token();
    log_files.start_retention_cleanup(token.clone());

    let server = ApiServer::new(
        ApiServerConfig::new(bind_address),
        AppState::from_services(&services),
        token.clone(),
    );

    tokio::spawn(async move {
        shutdown.recv().await;
        token.cancel();
    });

    let result = server.run().await;
    services.shutdown().await;
    result?;

    Ok(())
}
