//! API server setup and configuration.

use axum::Router;
use axum::extract::Request;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::config::ConfigService;
use crate::database::TelemetryRepository;
use crate::error::{Error, Result};
use crate::notification::{DiscardSink, NotificationService};
use crate::poller::PollingEngine;
use crate::services::ServiceContainer;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: SocketAddr,
    pub enable_cors: bool,
}

impl ApiServerConfig {
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub config: Arc<ConfigService>,
    pub repo: Arc<dyn TelemetryRepository>,
    pub notifications: Arc<NotificationService>,
    /// Poll-now engine; alerts are discarded because the daemon owns alert state.
    pub engine: Arc<PollingEngine>,
    /// Where the daemon publishes its PID.
    pub pid_file: PathBuf,
}

impl AppState {
    pub fn from_services(services: &ServiceContainer) -> Self {
        Self {
            start_time: Instant::now(),
            config: services.config.clone(),
            repo: services.repo.clone(),
            notifications: services.notifications.clone(),
            engine: Arc::new(services.polling_engine(Arc::new(DiscardSink))),
            pid_file: services.process.pid_file.clone(),
        }
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            state,
            cancel_token,
        }
    }

    /// Build the router with all middleware and routes.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.enable_cors)
    }

    /// Serve until the cancellation token fires.
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.bind_address;
        let router = self.router();
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("API server listening on http://{}", addr);

        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| Error::Other(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// Routes plus CORS and request tracing. Health probes are not traced.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let mut router = routes::create_router(state);

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &Request| {
                if req.uri().path().starts_with("/api/health") {
                    Span::none()
                } else {
                    let mut make_span =
                        tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                    use tower_http::trace::MakeSpan;
                    make_span.make_span(req)
                }
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let on_response =
                        tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnResponse;
                    on_response.on_response(res, latency, span);
                },
            ),
    )
}
