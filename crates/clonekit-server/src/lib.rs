pub mod error;
pub mod launcher;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clonekit_core::config::Config;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf, config: Config) -> Router {
    let body_limit = usize::try_from(config.server.max_upload_mb.saturating_mul(1024 * 1024))
        .unwrap_or(usize::MAX);
    let app_state = state::AppState::new(root, config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Runs
        .route(
            "/api/runs",
            get(routes::runs::list_runs).post(routes::runs::create_run),
        )
        .route("/api/runs/{folder}", get(routes::runs::get_run))
        .route("/api/runs/{folder}/log", get(routes::runs::get_log))
        .route("/api/runs/{folder}/events", get(routes::runs::run_events))
        .route("/api/runs/{folder}/retry", post(routes::runs::retry_run))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the intake portal.
pub async fn serve(root: PathBuf, config: Config, open_browser: bool) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, config, listener, open_browser).await
}

/// Start the intake portal on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    root: PathBuf,
    config: Config,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root, config);

    tracing::info!("clonekit portal listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
