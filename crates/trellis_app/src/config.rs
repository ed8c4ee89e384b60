//! Application configuration
//!
//! Read from a `trellis.toml`-style document or built in code:
//!
//! ```toml
//! log_filter = "trellis_layout=debug,info"
//! background_queue = true
//! queue_thread_name = "trellis-tasks"
//! idle_timeout_ms = 16
//! root_size = [800.0, 600.0]
//! ```

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use trellis_core::Size;

/// Trellis application configuration
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// `tracing` filter directives; `RUST_LOG` takes precedence
    pub log_filter: String,
    /// Start the background task queue's consumer thread
    pub background_queue: bool,
    pub queue_thread_name: String,
    /// How long the run loop waits for work before checking its exit
    /// condition again
    pub idle_timeout_ms: u64,
    /// Initial size of the root control
    pub root_size: (f32, f32),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            background_queue: true,
            queue_thread_name: "trellis-tasks".to_string(),
            idle_timeout_ms: 16,
            root_size: (800.0, 600.0),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("reading {}: {err}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_background_queue(mut self, enabled: bool) -> Self {
        self.background_queue = enabled;
        self
    }

    pub fn with_queue_thread_name(mut self, name: impl Into<String>) -> Self {
        self.queue_thread_name = name.into();
        self
    }

    pub fn with_idle_timeout_ms(mut self, millis: u64) -> Self {
        self.idle_timeout_ms = millis;
        self
    }

    pub fn with_root_size(mut self, width: f32, height: f32) -> Self {
        self.root_size = (width, height);
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms.max(1))
    }

    pub fn root_size(&self) -> Size {
        Size::new(self.root_size.0, self.root_size.1).sanitized()
    }

    fn validate(&self) -> Result<()> {
        if self.background_queue && self.queue_thread_name.trim().is_empty() {
            return Err(AppError::Config(
                "queue_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            log_filter = "debug"
            root_size = [320.0, 240.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.root_size(), Size::new(320.0, 240.0));
        assert!(config.background_queue);
        assert_eq!(config.idle_timeout(), Duration::from_millis(16));
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let result = AppConfig::from_toml_str("idle_timeout_ms = \"soon\"");
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = AppConfig::from_toml_str("queue_thread_name = \"  \"");
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_builder_setters() {
        let config = AppConfig::new()
            .with_background_queue(false)
            .with_idle_timeout_ms(0)
            .with_root_size(-5.0, 10.0);

        assert!(!config.background_queue);
        assert_eq!(config.idle_timeout(), Duration::from_millis(1));
        assert_eq!(config.root_size(), Size::new(0.0, 10.0));
    }
}
