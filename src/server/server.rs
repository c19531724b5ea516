use anyhow::{Context, Result};
use std::time::Duration;

use axum::{
    extract::State, middleware, response::IntoResponse, routing::get, Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::{
    log_requests, metrics::metrics_handler, radio_routes::make_radio_routes, state::*,
    ServerConfig,
};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

pub fn make_app(config: ServerConfig, radio: GuardedRadioService) -> Router {
    let state = ServerState::new(config, radio);

    let home_router: Router = Router::new()
        .route("/", get(home))
        .with_state(state.clone());

    let mut app: Router = home_router.nest("/v1/radio", make_radio_routes(state.clone()));

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state, log_requests));

    app
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    radio: GuardedRadioService,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(config, radio);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    let app_token = shutdown_token.clone();
    let metrics_token = shutdown_token.clone();
    let app_server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { app_token.cancelled().await });
    let metrics_server = axum::serve(metrics_listener, make_metrics_app())
        .with_graceful_shutdown(async move { metrics_token.cancelled().await });

    info!("Serving on port {}, metrics on port {}", port, metrics_port);
    tokio::try_join!(
        async { app_server.await.context("HTTP server failed") },
        async { metrics_server.await.context("Metrics server failed") },
    )?;
    Ok(())
}
