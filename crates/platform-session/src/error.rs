//! Error types for session operations
//!
//! This module defines the error taxonomy for the session subsystem:
//! credential decoding, collaborator failures (transport, secret storage,
//! biometric gate), and the caller-facing [`AuthError`].

use thiserror::Error;

/// Errors produced while decoding an access token into identity claims.
///
/// Decode errors are always local and never retried. Callers treat them as
/// "the current token is unusable" and fall back to a refresh.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Token does not consist of exactly three non-empty segments
    #[error("Malformed token structure")]
    MalformedStructure,

    /// Payload segment is not valid URL-safe base64 or not a JSON object
    #[error("Malformed token encoding: {0}")]
    MalformedEncoding(String),

    /// One or more required claims are absent
    #[error("Missing required claims: {}", .0.join(", "))]
    MissingClaims(Vec<&'static str>),

    /// Issuer is not in the configured allow-list
    #[error("Untrusted issuer: {0}")]
    UntrustedIssuer(String),

    /// A configured signature verifier rejected the token
    #[error("Invalid token signature")]
    InvalidSignature,
}

/// Classified failures reported by a credential transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The server rejected the presented credential
    #[error("Unauthorized")]
    Unauthorized,

    /// The server answered with a non-success status
    #[error("Server error ({status}): {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Error message from the server
        message: String,
    },

    /// The request never reached the server or the connection dropped
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded the transport's timeout
    #[error("Request timed out")]
    Timeout,

    /// The server answered successfully but the body could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Whether the credential itself was rejected.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Unauthorized)
    }
}

/// Failures reported by a secret store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretStoreError {
    /// The backing store could not be read
    #[error("Failed to read secret '{key}': {message}")]
    Read {
        /// Key being read
        key: String,
        /// Backend message
        message: String,
    },

    /// The backing store could not be written
    #[error("Failed to write secret '{key}': {message}")]
    Write {
        /// Key being written
        key: String,
        /// Backend message
        message: String,
    },

    /// The backing store could not delete the entry
    #[error("Failed to delete secret '{key}': {message}")]
    Delete {
        /// Key being deleted
        key: String,
        /// Backend message
        message: String,
    },
}

/// Outcomes of a biometric prompt other than success.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GateError {
    /// The user dismissed the prompt
    #[error("Biometric authentication cancelled")]
    UserCancelled,

    /// Too many failed attempts; biometrics are locked out
    #[error("Biometric authentication is locked")]
    Locked,

    /// The device supports biometrics but none are enrolled
    #[error("No biometrics enrolled")]
    NotEnrolled,

    /// The device has no biometric hardware or it is disabled
    #[error("Biometric authentication not available")]
    NotAvailable,

    /// The prompt completed but the presented biometric did not match
    #[error("Biometric authentication failed")]
    Failed,
}

/// Session error types.
///
/// These are the errors surfaced to callers of the session orchestrator and
/// refresh coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credential is held
    #[error("No active session")]
    NoSession,

    /// The refresh token was rejected; the session has been cleared
    #[error("Session is no longer valid")]
    SessionInvalid,

    /// Network or server failure; session state is preserved
    #[error("Transient failure: {0}")]
    Transient(TransportError),

    /// Login was rejected by the server
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A token in a server response could not be decoded
    #[error("Token decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The server response lacked a required field
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// The biometric gate refused
    #[error("Biometric login failed: {0}")]
    Biometric(GateError),

    /// Biometric login was requested but no credentials were saved
    #[error("No stored credentials for biometric login")]
    NoStoredCredentials,

    /// Secret storage failed
    #[error("Secret storage error: {0}")]
    Storage(#[from] SecretStoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for session operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Classify a transport failure during a refresh.
    pub fn from_refresh_failure(error: TransportError) -> Self {
        if error.is_unauthorized() {
            AuthError::SessionInvalid
        } else {
            AuthError::Transient(error)
        }
    }

    /// Classify a transport failure during a login.
    pub fn from_login_failure(error: TransportError) -> Self {
        if error.is_unauthorized() {
            AuthError::InvalidCredentials
        } else {
            AuthError::Transient(error)
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Transient(_))
    }

    /// Whether the caller must route the user back to a login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NoSession | AuthError::SessionInvalid | AuthError::InvalidCredentials
        )
    }

    /// Whether the user dismissed a biometric prompt.
    ///
    /// Cancellation is not an error from the user's perspective and
    /// should not be logged or shown as one.
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, AuthError::Biometric(GateError::UserCancelled))
    }

    /// Get error code for UI mapping.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NoSession => "NO_SESSION",
            AuthError::SessionInvalid => "SESSION_INVALID",
            AuthError::Transient(_) => "TRANSIENT",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Decode(_) => "DECODE_FAILED",
            AuthError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            AuthError::Biometric(GateError::UserCancelled) => "BIOMETRIC_CANCELLED",
            AuthError::Biometric(GateError::Locked) => "BIOMETRIC_LOCKED",
            AuthError::Biometric(GateError::NotEnrolled) => "BIOMETRIC_NOT_ENROLLED",
            AuthError::Biometric(GateError::NotAvailable) => "BIOMETRIC_NOT_AVAILABLE",
            AuthError::Biometric(GateError::Failed) => "BIOMETRIC_FAILED",
            AuthError::NoStoredCredentials => "NO_STORED_CREDENTIALS",
            AuthError::Storage(_) => "STORAGE_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
