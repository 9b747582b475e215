// src/handlers/mod.rs

pub mod authentik;
pub mod health;

pub use authentik::authentik_webhook;
pub use health::health_check;
