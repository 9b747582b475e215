// src/middleware/auth.rs

use axum::{
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// API key gate for everything routed under `/:token`.
///
/// Scans the configured keys in order and attaches the matched record to the
/// request extensions for downstream handlers. An unknown token gets the same
/// 401 as a missing one; no further detail leaks to the caller.
pub async fn api_key_auth(
    State(state): State<AppState>,
    params: RawPathParams,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = params
        .iter()
        .find(|(name, _)| *name == "token")
        .map(|(_, value)| value)
        .unwrap_or_default();

    let config = state.config.get().await?;

    let Some(api_key) = config.find_api_key(token).cloned() else {
        warn!("Rejected request: token does not match any configured API key");
        return Err(AppError::Unauthorized);
    };

    debug!(api_key.name = %api_key.name, "Request authenticated");
    req.extensions_mut().insert(api_key);
    Ok(next.run(req).await)
}
