use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mandelbrot_server::{
    cache::CacheStore,
    config::Config,
    heavy_queue::HeavyRequestScheduler,
    render::{EscapeTimeEngine, RenderEngine},
    services::RenderService,
    utils::human_format::format_bytes,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "mandelbrot-server")]
#[command(version)]
#[command(about = "HTTP server rendering cached Mandelbrot set images")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Maximum number of requests processed at once
    #[arg(short = 'm', long, value_name = "N")]
    max_connections: Option<usize>,

    /// Simulated cost of each big/ultra render, e.g. "20s" or "500ms"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    heavy_delay: Option<Duration>,

    /// Directory under which the per-process cache directory is created
    #[arg(long, value_name = "DIR")]
    cache_parent: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("mandelbrot_server={},tower_http=trace", cli.log_level)
    } else {
        format!("mandelbrot_server={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mandelbrot server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(max_connections) = cli.max_connections {
        anyhow::ensure!(max_connections > 0, "--max-connections must be at least 1");
        config.web.max_connections = max_connections;
    }
    if let Some(delay) = cli.heavy_delay {
        config.heavy.simulated_delay = delay;
    }
    if let Some(parent) = cli.cache_parent {
        config.cache.parent_dir = parent;
    }

    // The server is useless without somewhere to cache, so this is fatal
    let cache =
        CacheStore::from_config(&config.cache).context("failed to create cache directory")?;
    info!(
        "Cache directory: {} (quota {})",
        cache.directory().display(),
        format_bytes(cache.quota_bytes())
    );

    let escape_time = EscapeTimeEngine::new(config.render.max_iterations);
    info!(
        "Escape-time engine ready (max iterations: {})",
        escape_time.max_iterations()
    );
    let engine: Arc<dyn RenderEngine> = Arc::new(escape_time);
    let (scheduler, worker_handle) =
        HeavyRequestScheduler::spawn(engine.clone(), config.heavy.simulated_delay);

    let render_service = RenderService::new(
        cache.clone(),
        engine,
        scheduler,
        config.web.max_connections,
    );
    info!(
        "Render service initialized (admission ceiling: {})",
        config.web.max_connections
    );

    let web_server = WebServer::new(config, render_service)?;
    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );

    // Create a channel to signal when the server is ready or fails to bind
    let (server_ready_tx, server_ready_rx) = tokio::sync::oneshot::channel();

    let server_handle = tokio::spawn(async move {
        if let Err(e) = web_server.serve_with_signal(server_ready_tx).await {
            tracing::error!("Web server failed: {}", e);
        }
    });

    match server_ready_rx.await {
        Ok(Ok(())) => info!("Web server is now listening"),
        Ok(Err(bind_error)) => {
            tracing::error!("Failed to bind web server: {}", bind_error);
            return Err(bind_error);
        }
        Err(_) => {
            tracing::error!("Web server task completed without signaling");
            return Err(anyhow::anyhow!("Web server failed to start"));
        }
    }

    server_handle.await?;

    // Router and scheduler handles are gone once the server stops, which lets
    // the heavy worker exit
    worker_handle.abort();

    let cache_dir = cache.directory().to_path_buf();
    drop(cache);
    info!("Shut down, cache directory {} released", cache_dir.display());

    Ok(())
}
