//! Configuration management for the lamp
//!
//! This module provides:
//! - **settings**: the typed settings domains (matrix, connection, mqtt, button, general)
//! - **store**: the in-memory store holding them plus the effect collection

pub mod settings;
pub mod store;

// Re-export commonly used types
pub use settings::{ButtonSettings, ConnectionSettings, GeneralSettings, MatrixSettings, MqttSettings};
pub use store::{ConfigStore, SettingsDocument};
