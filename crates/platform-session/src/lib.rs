//! # Platform Session
//!
//! This crate provides client-side session management for Relay platform
//! apps: it holds the current access/refresh token pair, decides when the
//! pair is stale, and guarantees that concurrent callers needing a fresh
//! token trigger at most one network refresh at a time.
//!
//! ## Overview
//!
//! The platform-session crate handles:
//! - **Claims**: Decoding access tokens into identity claims with issuer checks
//! - **Tokens**: Immutable token records with expiry predicates
//! - **Refresh**: Single-flight refresh coordination
//! - **Sessions**: Login, logout, biometric login, and restore at launch
//!
//! Network transport, secret storage, and biometric prompts are collaborators
//! supplied by the app through the [`CredentialTransport`], [`SecretStore`],
//! and [`BiometricGate`] traits.
//!
//! ## Features
//!
//! - `jwt` (default): [`JwtSignatureVerifier`] for opt-in signature checks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use platform_session::{
//!     MemorySecretStore, SessionConfig, SessionOrchestrator, StaticBiometricGate,
//! };
//! use std::sync::Arc;
//!
//! # async fn example(transport: Arc<dyn platform_session::CredentialTransport>) {
//! let sessions = SessionOrchestrator::new(
//!     SessionConfig::from_env(),
//!     transport,
//!     Arc::new(MemorySecretStore::new()),
//!     Arc::new(StaticBiometricGate::unavailable()),
//! )
//! .unwrap();
//!
//! // At launch
//! sessions.restore().await.unwrap();
//! if sessions.has_active_session().await {
//!     let token = sessions.valid_access_token().await.unwrap();
//! }
//! # }
//! ```

pub mod biometric;
pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
#[cfg(feature = "jwt")]
pub mod jwt;
pub mod observer;
pub mod orchestrator;
pub mod refresh;
pub mod secrets;
pub mod store;
pub mod token;
pub mod transport;

// Re-export main types
pub use biometric::{BiometricGate, StaticBiometricGate};
pub use claims::{ClaimsDecoder, Identity, IdentityClaims, SignatureVerifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, SessionConfig};
pub use error::{
    AuthError, AuthResult, DecodeError, GateError, SecretStoreError, TransportError,
};
pub use observer::{
    ClearReason, NoopObserver, SessionMetrics, SessionMetricsSnapshot, SessionObserver,
};
pub use orchestrator::{SessionOrchestrator, SessionState};
pub use refresh::RefreshCoordinator;
pub use secrets::{MemorySecretStore, SecretKeys, SecretStore};
pub use store::SessionStore;
pub use token::{expiry_after, RawTokenResponse, TokenRecord};
pub use transport::{CredentialTransport, TransportResult};

#[cfg(feature = "jwt")]
pub use jwt::{JwtAlgorithm, JwtSignatureVerifier};
