// src/state.rs

use std::sync::Arc;

use crate::config::ConfigStore;
use crate::matrix::ChatSession;

/// Shared application state handed to every Axum handler. Both collaborators
/// are injected at startup so tests can run the router against fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub chat: Arc<dyn ChatSession>,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>, chat: Arc<dyn ChatSession>) -> Self {
        Self { config, chat }
    }
}
