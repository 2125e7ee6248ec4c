//! # Platform Transport
//!
//! HTTP implementation of [`platform_session::CredentialTransport`] for the
//! Relay auth API.
//!
//! ## Endpoints
//!
//! All requests are JSON `POST`s:
//! - login: `{ "identifier", "secret" }` returning a token response
//! - refresh: `{ "refresh_token" }` returning a token response
//! - logout: `{ "refresh_token" }`, response body ignored
//!
//! A token response carries `access_token`, and optionally `refresh_token`
//! (present only when the server rotates it), `expires_in`, and `token_type`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use platform_session::{
//!     MemorySecretStore, SessionConfig, SessionOrchestrator, StaticBiometricGate,
//! };
//! use platform_transport::{HttpCredentialTransport, TransportConfig};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpCredentialTransport::new(TransportConfig::from_env())?;
//! let sessions = SessionOrchestrator::new(
//!     SessionConfig::from_env(),
//!     Arc::new(transport),
//!     Arc::new(MemorySecretStore::new()),
//!     Arc::new(StaticBiometricGate::unavailable()),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;

pub use config::TransportConfig;
pub use http::{BuildError, HttpCredentialTransport};
