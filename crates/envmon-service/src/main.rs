//! Envmon Service - HTTP API for the monitoring dashboard.
//!
//! Run with: `cargo run -p envmon-service`

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use envmon_service::{AppState, Config, ErrorMode, api};
use envmon_store::Store;

/// Envmon Service - HTTP REST API for sensors, stations and accounts.
#[derive(Parser, Debug)]
#[command(name = "envmon-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Report each error with its own status instead of 400.
    #[arg(long)]
    typed_errors: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("envmon_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    if args.typed_errors {
        config.server.error_mode = ErrorMode::Typed;
    }
    config.validate()?;

    let store = Store::open(&config.storage.path)?;
    let addr: SocketAddr = config.server.bind.parse()?;
    info!(
        "Serving API under '{}' ({:?} errors)",
        config.server.base_path, config.server.error_mode
    );

    let state = AppState::new(store, config);

    let app = api::router(state).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers([api::TOTAL_COUNT_HEADER]),
        ),
    );

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
