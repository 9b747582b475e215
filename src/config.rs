// src/config.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use validator::Validate;

use crate::error::{AppError, Result};

/// Matrix connection details with a pre-obtained access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MatrixWithToken {
    pub base_url: String,
    pub user_id: String,
    pub room_id: String,
    pub access_token: String,
}

/// Matrix connection details using the password login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MatrixWithPassword {
    pub base_url: String,
    pub user_id: String,
    pub room_id: String,
    pub password: String,
}

/// The two mutually exclusive credential forms for the `matrix` section.
///
/// Untagged over two strict structs: a file carrying both `accessToken` and
/// `password` (or neither) fails to deserialize, so the "exactly one of"
/// invariant holds structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatrixConfig {
    Token(MatrixWithToken),
    Password(MatrixWithPassword),
}

impl MatrixConfig {
    pub fn base_url(&self) -> &str {
        match self {
            Self::Token(c) => &c.base_url,
            Self::Password(c) => &c.base_url,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Token(c) => &c.user_id,
            Self::Password(c) => &c.user_id,
        }
    }

    pub fn room_id(&self) -> &str {
        match self {
            Self::Token(c) => &c.room_id,
            Self::Password(c) => &c.room_id,
        }
    }
}

/// A named shared secret authorizing webhook senders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKey {
    pub name: String,
    pub key: String,
}

/// Root of the on-disk configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppConfig {
    pub matrix: MatrixConfig,
    pub api_keys: Vec<ApiKey>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub listen_host: String,
    #[validate(range(min = 1024, max = 65535, message = "must be within [1024, 65535]"))]
    pub listen_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            matrix: MatrixConfig::Password(MatrixWithPassword {
                base_url: "https://matrix.org".to_string(),
                user_id: "@example:matrix.org".to_string(),
                room_id: "!<example>:matrix.org".to_string(),
                password: "<password>".to_string(),
            }),
            api_keys: Vec::new(),
            listen_host: "0.0.0.0".to_string(),
            listen_port: 9456,
        }
    }
}

impl AppConfig {
    /// Returns the first configured key record whose `key` equals `token`.
    /// Keys need not be unique; declaration order decides.
    pub fn find_api_key(&self, token: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == token)
    }

    /// Runs all schema checks serde cannot express, collecting every failure
    /// so diagnostics can be logged as a list.
    pub fn check(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(validation_errors) = self.validate() {
            for (field, field_errors) in validation_errors.field_errors() {
                for field_error in field_errors {
                    match &field_error.message {
                        Some(message) => errors.push(format!("{field}: {message}")),
                        None => errors.push(format!("{field}: {}", field_error.code)),
                    }
                }
            }
        }

        if let Err(e) = Url::parse(self.matrix.base_url()) {
            errors.push(format!("matrix.baseUrl: {e}"));
        }

        for (idx, api_key) in self.api_keys.iter().enumerate() {
            if api_key.name.trim().is_empty() {
                errors.push(format!("apiKeys[{idx}].name: must not be empty"));
            }
            if api_key.key.trim().is_empty() {
                errors.push(format!("apiKeys[{idx}].key: must not be empty"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Typed deserialization plus constraint checks, with every failure reported.
fn deserialize_and_check(value: Value) -> std::result::Result<AppConfig, Vec<String>> {
    let config: AppConfig = serde_json::from_value(value).map_err(|e| vec![e.to_string()])?;
    config.check()?;
    Ok(config)
}

fn write_pretty(path: &Path, config: &AppConfig) -> Result<()> {
    let rendered = serde_json::to_string_pretty(config)?;
    fs::write(path, rendered)?;
    Ok(())
}

#[derive(Debug, Default)]
struct Inner {
    config: Option<AppConfig>,
    path: Option<PathBuf>,
}

/// Holds the process-wide configuration snapshot and the path it was loaded
/// from. All access goes through the lock so `set` cannot race `get` across
/// handler tasks.
#[derive(Debug, Default)]
pub struct ConfigStore {
    inner: RwLock<Inner>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from `path`, writing defaults first when the
    /// file does not exist.
    ///
    /// A file that parses but fails the schema gets one repair attempt: its
    /// top-level fields are overlaid onto the defaults and re-validated. A
    /// successful repair is treated as a legacy-format upgrade and persisted
    /// back to disk. Anything else is fatal.
    pub async fn load(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            let defaults = AppConfig::default();
            write_pretty(path, &defaults)?;
            info!(config.path = %path.display(), "No configuration file found, wrote defaults");
        }

        let contents = fs::read_to_string(path)?;
        let parsed: Value = serde_json::from_str(&contents).map_err(|e| AppError::ConfigParse {
            message: e.to_string(),
        })?;

        let config = match deserialize_and_check(parsed.clone()) {
            Ok(config) => config,
            Err(first_errors) => self.upgrade_legacy(path, &parsed, first_errors)?,
        };

        let mut inner = self.inner.write().await;
        inner.config = Some(config);
        inner.path = Some(path.to_path_buf());

        debug!("Config loaded successfully");
        Ok(())
    }

    /// Overlay `parsed` onto the defaults and retry validation. Gaps filled
    /// from the defaults are an accepted tradeoff of the soft migration.
    fn upgrade_legacy(
        &self,
        path: &Path,
        parsed: &Value,
        first_errors: Vec<String>,
    ) -> Result<AppConfig> {
        let Value::Object(parsed_map) = parsed else {
            return Err(AppError::ConfigSchema {
                errors: first_errors,
            });
        };

        let mut merged = serde_json::to_value(AppConfig::default())?;
        if let Value::Object(merged_map) = &mut merged {
            for (key, value) in parsed_map {
                merged_map.insert(key.clone(), value.clone());
            }
        }

        debug!(config = %merged, "Corrected config");

        match deserialize_and_check(merged) {
            Ok(config) => {
                warn!("Old configuration format detected, updating file...");
                write_pretty(path, &config)?;
                Ok(config)
            }
            Err(errors) => {
                debug!(schema.errors = ?first_errors, "Original config did not validate either");
                Err(AppError::ConfigSchema { errors })
            }
        }
    }

    /// Snapshot of the current configuration. Calling this before a
    /// successful `load` is a sequencing bug, not a runtime condition.
    pub async fn get(&self) -> Result<AppConfig> {
        let inner = self.inner.read().await;
        inner.config.clone().ok_or(AppError::ConfigNotLoaded)
    }

    /// Validates and persists a replacement configuration, then swaps it in.
    /// Returns `Ok(false)` without writing when `load` has not run yet.
    pub async fn set(&self, config: AppConfig) -> Result<bool> {
        config
            .check()
            .map_err(|errors| AppError::ConfigSchema { errors })?;

        let mut inner = self.inner.write().await;
        let Some(path) = inner.path.clone() else {
            warn!("Will not write config as it is not loaded yet");
            return Ok(false);
        };

        write_pretty(&path, &config)?;
        inner.config = Some(config);
        Ok(true)
    }
}
