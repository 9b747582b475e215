// src/matrix.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::MatrixConfig;
use crate::error::{AppError, Result};

/// Fixed liveness message posted to the room right after connecting.
pub const ONLINE_MESSAGE: &str = "webhook2matrix is online";

/// The narrow chat capability the relay needs. Handlers only ever see this
/// trait, so tests can substitute a recording fake.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn send_message(&self, room_id: &str, body: &str) -> Result<()>;
}

/// Matrix client-server API client. One instance per process lifetime,
/// created at startup before the HTTP listener binds.
#[derive(Debug, Clone)]
pub struct MatrixClient {
    http: Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

impl MatrixClient {
    /// Connects using the configured credential form and posts the online
    /// notice. The password form runs the `m.login.password` flow and keeps
    /// the access token the homeserver hands back.
    pub async fn connect(config: &MatrixConfig) -> Result<Self> {
        let http = Client::builder().build()?;
        let base_url = config.base_url().trim_end_matches('/').to_string();

        let access_token = match config {
            MatrixConfig::Token(with_token) => with_token.access_token.clone(),
            MatrixConfig::Password(with_password) => {
                debug!(user_id = %with_password.user_id, "Logging in with password");
                let response = http
                    .post(format!("{base_url}/_matrix/client/v3/login"))
                    .json(&json!({
                        "type": "m.login.password",
                        "identifier": { "type": "m.id.user", "user": with_password.user_id },
                        "password": with_password.password,
                    }))
                    .send()
                    .await
                    .map_err(|e| AppError::Login {
                        message: e.to_string(),
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();
                    return Err(AppError::Login {
                        message: format!("homeserver returned {status}: {detail}"),
                    });
                }

                response
                    .json::<LoginResponse>()
                    .await
                    .map_err(|e| AppError::Login {
                        message: e.to_string(),
                    })?
                    .access_token
            }
        };

        let client = Self {
            http,
            base_url,
            access_token,
        };

        debug!("Sending online message...");
        client.send_message(config.room_id(), ONLINE_MESSAGE).await?;
        info!("Matrix client initialized");

        Ok(client)
    }
}

#[async_trait]
impl ChatSession for MatrixClient {
    async fn send_message(&self, room_id: &str, body: &str) -> Result<()> {
        // Transaction ids only need to be unique per access token; a fresh
        // uuid satisfies that without tracking state.
        let txn_id = Uuid::new_v4();
        let url = format!(
            "{}/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            self.base_url, room_id, txn_id
        );

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "msgtype": "m.text", "body": body }))
            .send()
            .await
            .map_err(|e| AppError::Dispatch {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Dispatch {
                message: format!("homeserver returned {status}: {detail}"),
            });
        }

        debug!(room.id = %room_id, "Message delivered");
        Ok(())
    }
}
