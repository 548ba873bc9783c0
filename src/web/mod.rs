//! Web layer module
//!
//! HTTP interface of the render server. Handlers stay thin: they extract the
//! query, hand it to [`RenderService`] and map the outcome onto a response.
//!
//! - **Handlers**: render and health endpoints
//! - **Responses**: PNG bodies and `"<status>: <message>"` error bodies
//! - **Middleware**: request logging with a per-request id

use anyhow::Result;
use axum::{Router, routing::get};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::services::RenderService;

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{handle_error, png_response};

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: Config, render_service: RenderService) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let app = create_router(AppState::new(render_service));
        Ok(Self { app, addr })
    }

    /// Serve until SIGINT/SIGTERM, reporting bind success or failure on
    /// `ready_signal` first
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        self.serve_until(ready_signal, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn serve_until<F>(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                info!("Listening on {}", self.addr);
                let _ = ready_signal.send(Ok(()));

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown)
                    .await?;
                info!("Web server stopped");
                Ok(())
            }
            Err(e) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, e);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Create the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::render::render_image))
        .route("/health", get(handlers::health::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn(
                    middleware::request_logging_middleware,
                )),
        )
        .with_state(state)
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub render_service: RenderService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(render_service: RenderService) -> Self {
        Self {
            render_service,
            started_at: Utc::now(),
        }
    }
}

/// Resolves on SIGTERM or SIGINT (Ctrl+C elsewhere)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    std::future::pending::<()>().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully");
    }
}
