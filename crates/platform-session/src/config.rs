//! Session configuration.
//!
//! Configuration is loaded from environment variables with defaults
//! suitable for the platform's own issuer.

use crate::token::DEFAULT_REFRESH_WINDOW_SECS;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default issuer accepted by the claims decoder.
pub const DEFAULT_ISSUER: &str = "relay-platform";

/// Default namespace for secret store keys.
pub const DEFAULT_KEY_PREFIX: &str = "platform.session";

/// Upper bound on the refresh window (one day).
pub const MAX_REFRESH_WINDOW_SECS: i64 = 86_400;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required setting.
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Session manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds before hard expiry at which a token is refreshed proactively.
    pub refresh_window_secs: i64,

    /// Issuers the claims decoder trusts.
    pub allowed_issuers: Vec<String>,

    /// Save identifier/secret on login so biometric login can replay them.
    pub remember_credentials: bool,

    /// Prompt shown by the biometric gate.
    pub biometric_reason: String,

    /// Namespace for secret store keys.
    pub secret_key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_window_secs: DEFAULT_REFRESH_WINDOW_SECS,
            allowed_issuers: vec![DEFAULT_ISSUER.to_string()],
            remember_credentials: true,
            biometric_reason: "Sign in to your account".to_string(),
            secret_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SESSION_REFRESH_WINDOW_SECS`: Refresh lead time (default: 300)
    /// - `SESSION_ALLOWED_ISSUERS`: Comma-separated issuers (default: relay-platform)
    /// - `SESSION_REMEMBER_CREDENTIALS`: Save credentials for biometric login (default: true)
    /// - `SESSION_BIOMETRIC_REASON`: Biometric prompt text
    /// - `SESSION_KEY_PREFIX`: Secret store key namespace (default: platform.session)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            refresh_window_secs: std::env::var("SESSION_REFRESH_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.refresh_window_secs),
            allowed_issuers: std::env::var("SESSION_ALLOWED_ISSUERS")
                .ok()
                .map(|s| parse_issuers(&s))
                .filter(|issuers| !issuers.is_empty())
                .unwrap_or(default.allowed_issuers),
            remember_credentials: std::env::var("SESSION_REMEMBER_CREDENTIALS")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.remember_credentials),
            biometric_reason: std::env::var("SESSION_BIOMETRIC_REASON")
                .unwrap_or(default.biometric_reason),
            secret_key_prefix: std::env::var("SESSION_KEY_PREFIX")
                .unwrap_or(default.secret_key_prefix),
        }
    }

    /// Get the refresh window as a Duration.
    ///
    /// Clamped to `0..=MAX_REFRESH_WINDOW_SECS`; [`validate`](Self::validate)
    /// rejects values outside that range.
    pub fn refresh_window(&self) -> Duration {
        Duration::seconds(self.refresh_window_secs.clamp(0, MAX_REFRESH_WINDOW_SECS))
    }

    /// Set the refresh window.
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window_secs = window.num_seconds();
        self
    }

    /// Replace the issuer allow-list.
    pub fn with_allowed_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_issuers = issuers.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether credentials are saved for biometric login.
    pub fn with_remember_credentials(mut self, remember: bool) -> Self {
        self.remember_credentials = remember;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_REFRESH_WINDOW_SECS).contains(&self.refresh_window_secs) {
            return Err(ConfigError::InvalidValue {
                key: "refresh_window_secs".to_string(),
                message: format!("must be between 0 and {}", MAX_REFRESH_WINDOW_SECS),
            });
        }
        if self.allowed_issuers.is_empty() {
            return Err(ConfigError::Missing("allowed_issuers".to_string()));
        }
        if self.secret_key_prefix.is_empty() {
            return Err(ConfigError::Missing("secret_key_prefix".to_string()));
        }
        Ok(())
    }
}

fn parse_issuers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
