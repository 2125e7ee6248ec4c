//! Credential transport abstraction
//!
//! The session core never performs network I/O itself. Login, refresh and
//! logout calls go through a [`CredentialTransport`], which is responsible
//! for its own timeouts and for classifying failures into [`TransportError`].

use crate::error::TransportError;
use crate::token::RawTokenResponse;
use async_trait::async_trait;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Network operations against the authentication server.
#[async_trait]
pub trait CredentialTransport: Send + Sync {
    /// Exchange an identifier and secret for a token pair.
    async fn login(&self, identifier: &str, secret: &str) -> TransportResult<RawTokenResponse>;

    /// Exchange a refresh token for a new access token.
    ///
    /// A `refresh_token` in the response rotates the stored one.
    async fn refresh(&self, refresh_token: &str) -> TransportResult<RawTokenResponse>;

    /// Revoke a refresh token on the server.
    async fn logout(&self, refresh_token: &str) -> TransportResult<()>;
}
