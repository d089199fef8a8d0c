mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "fd-server", about = "Dynamic routing front door")]
struct Args {
    /// Path to the TOML config file. Created with defaults if missing.
    #[arg(short, long, default_value = "front-door.toml")]
    config: PathBuf,

    /// Listen address.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    state::create_default_config(&args.config)?;
    let state = AppState::new(args.config.clone()).await?;

    let auto_configure = state.config.read().await.get_bool("bootstrap.auto_configure");
    if auto_configure {
        match state.front_door.sync_all().await {
            Ok(report) => {
                tracing::info!(
                    synced = report.synced,
                    errors = report.errors.len(),
                    "bootstrap sync finished"
                );
            }
            Err(err) => tracing::warn!(error = %err, "bootstrap sync failed"),
        }
    }

    let admin_routes = Router::new()
        .route("/sync", post(handlers::sync_handler))
        .route("/configure/:project_id", post(handlers::configure_handler))
        .route("/projects", get(handlers::projects_handler))
        .route(
            "/gateway/projects/:project_id/resources",
            get(handlers::gateway_resources_handler).delete(handlers::gateway_cleanup_handler),
        )
        .route("/metrics", get(handlers::metrics_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::admin_auth,
        ));

    let app = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .nest("/admin", admin_routes)
        .fallback(handlers::dispatch_handler)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    tracing::info!(listen = %args.listen, "front door listening");
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Evict every pooled module so their shutdown hooks run before exit.
    state.front_door.shutdown().await;
    tracing::info!("front door stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
}
