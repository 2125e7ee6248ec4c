//! Auth API endpoint configuration.
//!
//! Configuration is loaded from environment variables with defaults suitable
//! for local development.

use platform_session::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Auth API endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL for the auth API (e.g., "https://auth.relay.example").
    pub base_url: String,

    /// Path of the credential login endpoint.
    pub login_path: String,

    /// Path of the refresh endpoint.
    pub refresh_path: String,

    /// Path of the logout endpoint.
    pub logout_path: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            login_path: "/api/v1/auth/login".to_string(),
            refresh_path: "/api/v1/auth/refresh".to_string(),
            logout_path: "/api/v1/auth/logout".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    /// Configuration pointing at `base_url` with default paths.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AUTH_API_URL`: auth API URL (default: http://localhost:3000)
    /// - `AUTH_TIMEOUT_SECS`: request timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            base_url: std::env::var("AUTH_API_URL").unwrap_or(default.base_url),
            timeout_secs: std::env::var("AUTH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
            ..default
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "AUTH_API_URL".to_string(),
                message: format!("not an http(s) URL: {}", self.base_url),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AUTH_TIMEOUT_SECS".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
