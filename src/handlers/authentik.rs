// src/handlers/authentik.rs

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::ApiKey;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Notice,
    Warning,
    Alert,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Alert => "alert",
        }
    }
}

/// Webhook payload shape sent by authentik. Unknown keys are tolerated;
/// `user_email` and `user_username` are accepted but unused downstream.
#[derive(Debug, Deserialize)]
pub struct AuthentikPayload {
    pub body: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub user_username: Option<String>,
}

/// Renders the outbound room message. The bracketed severity segment is
/// omitted when the webhook did not carry one.
pub fn format_message(api_key_name: &str, payload: &AuthentikPayload) -> String {
    match payload.severity {
        Some(severity) => format!(
            "[webhook2matrix/{}] [{}]: {}",
            api_key_name,
            severity.as_str(),
            payload.body
        ),
        None => format!("[webhook2matrix/{}]: {}", api_key_name, payload.body),
    }
}

/// `POST /:token/authentik` — validate the payload, format the room message,
/// forward it through the shared chat session.
pub async fn authentik_webhook(
    State(state): State<AppState>,
    Extension(api_key): Extension<ApiKey>,
    Json(raw): Json<Value>,
) -> Result<Json<Value>> {
    let payload: AuthentikPayload = serde_json::from_value(raw).map_err(|e| {
        warn!(api_key.name = %api_key.name, "Rejected webhook with invalid payload");
        AppError::PayloadValidation {
            detail: e.to_string(),
        }
    })?;

    let config = state.config.get().await?;
    let message = format_message(&api_key.name, &payload);

    state
        .chat
        .send_message(config.matrix.room_id(), &message)
        .await?;

    info!(api_key.name = %api_key.name, "Webhook relayed to Matrix");
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: Value) -> AuthentikPayload {
        serde_json::from_value(value).expect("payload should deserialize")
    }

    #[test]
    fn message_includes_severity_when_present() {
        let p = payload(json!({ "body": "disk full", "severity": "alert" }));
        assert_eq!(
            format_message("ops", &p),
            "[webhook2matrix/ops] [alert]: disk full"
        );
    }

    #[test]
    fn severity_segment_is_omitted_when_absent() {
        let p = payload(json!({ "body": "disk full" }));
        assert_eq!(format_message("ops", &p), "[webhook2matrix/ops]: disk full");
    }

    #[test]
    fn body_is_required() {
        let result: std::result::Result<AuthentikPayload, _> =
            serde_json::from_value(json!({ "severity": "notice" }));
        assert!(result.is_err());
    }

    #[test]
    fn severity_must_be_a_known_level() {
        let result: std::result::Result<AuthentikPayload, _> =
            serde_json::from_value(json!({ "body": "x", "severity": "critical" }));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let p = payload(json!({
            "body": "login",
            "user_email": "a@b.c",
            "user_username": "a",
            "extra": { "nested": true }
        }));
        assert_eq!(p.body, "login");
        assert_eq!(p.user_email.as_deref(), Some("a@b.c"));
    }
}
