// src/lib.rs

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod matrix;
pub mod middleware;
pub mod state;

use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
    Router,
};
use std::{path::Path, sync::Arc, time::Instant};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub use config::{ApiKey, AppConfig, ConfigStore};
pub use error::{AppError, Result};
pub use state::AppState;

/// Builds the application router.
///
/// Every path under `/:token` passes the API key gate before reaching a
/// handler, so an unmatched path still gets 401 for an unknown token and 404
/// past the gate.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/:token/authentik", post(handlers::authentik_webhook))
        .route("/:token", any(|| async { StatusCode::NOT_FOUND }))
        .route("/:token/*rest", any(|| async { StatusCode::NOT_FOUND }))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::api_key_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected)
        .layer(axum::middleware::from_fn(trace_requests))
        .with_state(state)
}

/// Middleware adding a request id and a tracing span around each request.
async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("x-request-id", value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Loads the configuration, connects the Matrix session, and assembles the
/// router. Any failure here is fatal: the process must not start accepting
/// webhooks without a working chat session.
pub async fn run(config_path: &Path) -> Result<(Router, AppConfig)> {
    info!("Starting webhook2matrix relay...");

    let store = Arc::new(ConfigStore::new());
    store.load(config_path).await.map_err(|e| {
        error!(
            config.path = %config_path.display(),
            error = ?e,
            "Failed to load or validate configuration. Exiting."
        );
        e
    })?;
    let app_config = store.get().await?;

    info!(
        config.api_keys = app_config.api_keys.len(),
        server.host = %app_config.listen_host,
        server.port = app_config.listen_port,
        "Configuration loaded and validated successfully."
    );

    let chat = matrix::MatrixClient::connect(&app_config.matrix)
        .await
        .map_err(|e| {
            error!(error = ?e, "Failed to initialize Matrix client. Exiting.");
            e
        })?;

    let state = AppState::new(store, Arc::new(chat));
    let app = create_router(state);

    Ok((app, app_config))
}
