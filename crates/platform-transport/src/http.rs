//! HTTP credential transport.
//!
//! Posts JSON to the auth API's login, refresh, and logout endpoints and maps
//! HTTP outcomes onto [`TransportError`] classes so the session layer can
//! tell a rejected credential from a network problem.

use crate::config::TransportConfig;
use async_trait::async_trait;
use platform_session::{
    ConfigError, CredentialTransport, RawTokenResponse, TransportError, TransportResult,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors building an [`HttpCredentialTransport`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// [`CredentialTransport`] over the auth API.
#[derive(Clone)]
pub struct HttpCredentialTransport {
    client: Client,
    config: TransportConfig,
}

impl std::fmt::Debug for HttpCredentialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCredentialTransport")
            .field("config", &self.config)
            .finish()
    }
}

impl HttpCredentialTransport {
    /// Create a transport for `config`.
    pub fn new(config: TransportConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    /// Create a transport sharing an existing client's connection pool.
    ///
    /// The client's own timeout applies.
    pub fn with_client(client: Client, config: TransportConfig) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self { client, config })
    }

    /// The active configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> TransportResult<Response> {
        let url = self.config.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;
        check_status(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> TransportResult<T> {
        response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl CredentialTransport for HttpCredentialTransport {
    #[instrument(skip_all)]
    async fn login(&self, identifier: &str, secret: &str) -> TransportResult<RawTokenResponse> {
        debug!("Sending login request");
        let response = self
            .post(&self.config.login_path, &LoginRequest { identifier, secret })
            .await?;
        Self::parse(response).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> TransportResult<RawTokenResponse> {
        debug!("Sending refresh request");
        let response = self
            .post(&self.config.refresh_path, &RefreshRequest { refresh_token })
            .await?;
        Self::parse(response).await
    }

    #[instrument(skip_all)]
    async fn logout(&self, refresh_token: &str) -> TransportResult<()> {
        debug!("Sending logout request");
        self.post(&self.config.logout_path, &RefreshRequest { refresh_token })
            .await
            .map(|_| ())
    }
}

/// Map a non-success status onto a transport error.
async fn check_status(response: Response) -> TransportResult<Response> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        debug!(status = status.as_u16(), "Auth API rejected credential");
        return Err(TransportError::Unauthorized);
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!("Auth API error ({}): {}", status.as_u16(), message);
        return Err(TransportError::ServerError {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

/// Classify a request failure.
fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_decode() {
        TransportError::InvalidResponse(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}
