//! Session orchestration
//!
//! [`SessionOrchestrator`] is the service the app talks to. It logs in and
//! out, restores a persisted session at launch, answers "who is signed in",
//! and performs biometric-assisted login by replaying saved credentials.
//!
//! ## State machine
//!
//! ```text
//! LoggedOut -> Authenticating -> Authenticated(fresh)
//! Authenticated(fresh) -> Authenticated(stale) -> Refreshing
//! Refreshing -> Authenticated(fresh)      on success
//!            -> LoggedOut                 on rejected refresh token
//!            -> Authenticated(stale)      on transient failure
//! any -> LoggedOut                        on logout
//! ```

use crate::biometric::BiometricGate;
use crate::claims::{ClaimsDecoder, Identity, IdentityClaims, SignatureVerifier};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, SessionConfig};
use crate::error::{AuthError, AuthResult, GateError};
use crate::observer::{ClearReason, NoopObserver, SessionObserver};
use crate::refresh::RefreshCoordinator;
use crate::secrets::{SecretKeys, SecretStore};
use crate::store::SessionStore;
use crate::token::{expiry_after, RawTokenResponse, TokenRecord};
use crate::transport::CredentialTransport;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Coarse session state for UI routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credential is held
    LoggedOut,
    /// Access token is outside its refresh window
    Fresh,
    /// Access token is inside its refresh window but still usable
    NeedsRefresh,
    /// A refresh is in flight
    Refreshing,
    /// Access token is past hard expiry
    Expired,
}

impl SessionState {
    /// Whether a credential is held at all.
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, SessionState::LoggedOut)
    }
}

/// Public session service.
pub struct SessionOrchestrator {
    config: SessionConfig,
    transport: Arc<dyn CredentialTransport>,
    secrets: Arc<dyn SecretStore>,
    biometric: Arc<dyn BiometricGate>,
    store: Arc<SessionStore>,
    decoder: ClaimsDecoder,
    keys: SecretKeys,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn SessionObserver>,
    coordinator: RefreshCoordinator,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("config", &self.config)
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl SessionOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn CredentialTransport>,
        secrets: Arc<dyn SecretStore>,
        biometric: Arc<dyn BiometricGate>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(SessionStore::new());
        let decoder = ClaimsDecoder::new(config.allowed_issuers.iter().cloned());
        let keys = SecretKeys::with_prefix(&config.secret_key_prefix);
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            transport.clone(),
            secrets.clone(),
            decoder.clone(),
        )
        .with_keys(keys.clone())
        .with_refresh_window(config.refresh_window());

        Ok(Self {
            config,
            transport,
            secrets,
            biometric,
            store,
            decoder,
            keys,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
            coordinator,
        })
    }

    /// Set the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.rebuild_coordinator();
        self
    }

    /// Set the observer.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self.rebuild_coordinator();
        self
    }

    /// Require access tokens to pass signature verification.
    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.decoder = self.decoder.with_verifier(verifier);
        self.rebuild_coordinator();
        self
    }

    fn rebuild_coordinator(&mut self) {
        self.coordinator = RefreshCoordinator::new(
            self.store.clone(),
            self.transport.clone(),
            self.secrets.clone(),
            self.decoder.clone(),
        )
        .with_keys(self.keys.clone())
        .with_clock(self.clock.clone())
        .with_observer(self.observer.clone())
        .with_refresh_window(self.config.refresh_window());
    }

    /// The refresh coordinator, for callers that need a bearer token.
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// The active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Log in with an identifier and secret.
    ///
    /// On success the new record replaces any existing session, and (when
    /// `remember_credentials` is set) the credentials are saved for a later
    /// biometric login. Saving them is best effort.
    #[instrument(skip_all)]
    pub async fn login(&self, identifier: &str, secret: &str) -> AuthResult<Identity> {
        match self.login_inner(identifier, secret).await {
            Ok(identity) => {
                self.observer.login_succeeded();
                info!(user_id = %identity.user_id, "Login succeeded");
                Ok(identity)
            }
            Err(error) => {
                self.observer.login_failed(&error);
                warn!(%error, "Login failed");
                Err(error)
            }
        }
    }

    async fn login_inner(&self, identifier: &str, secret: &str) -> AuthResult<Identity> {
        let response = self
            .transport
            .login(identifier, secret)
            .await
            .map_err(AuthError::from_login_failure)?;

        let (record, claims) = self.record_from_login(response)?;
        self.coordinator.install(record).await;

        if self.config.remember_credentials {
            self.remember_credentials(identifier, secret).await;
        }

        Ok(claims.into())
    }

    fn record_from_login(&self, response: RawTokenResponse) -> AuthResult<(TokenRecord, IdentityClaims)> {
        let refresh_token = response
            .refresh_token
            .ok_or_else(|| AuthError::MalformedResponse("missing refresh_token".to_string()))?;
        let claims = self.decoder.decode(&response.access_token)?;

        let expires_at = match response.expires_in {
            Some(secs) => expiry_after(self.clock.now(), secs).ok_or_else(|| {
                AuthError::MalformedResponse(format!("expires_in out of range: {}", secs))
            })?,
            None => claims.expires_at,
        };

        Ok((
            TokenRecord::new(response.access_token, refresh_token, expires_at),
            claims,
        ))
    }

    async fn remember_credentials(&self, identifier: &str, secret: &str) {
        let saved = match self.secrets.save(&self.keys.identifier, identifier).await {
            Ok(()) => self.secrets.save(&self.keys.secret, secret).await,
            Err(error) => Err(error),
        };
        if let Err(error) = saved {
            warn!(%error, "Failed to save credentials for biometric login");
        }
    }

    /// Log in by replaying saved credentials after a biometric check.
    ///
    /// # Errors
    ///
    /// - `Biometric(NotAvailable)` if the device cannot do biometrics
    /// - `Biometric(..)` with the gate's reason if the prompt fails; a user
    ///   cancellation is `Biometric(UserCancelled)`
    /// - `NoStoredCredentials` if nothing was saved by an earlier login
    /// - any error from [`login`](Self::login)
    #[instrument(skip_all)]
    pub async fn login_with_biometrics(&self) -> AuthResult<Identity> {
        if !self.biometric.is_available() {
            debug!("Biometric authentication not available");
            return Err(AuthError::Biometric(GateError::NotAvailable));
        }

        match self.biometric.authenticate(&self.config.biometric_reason).await {
            Ok(()) => {}
            Err(GateError::UserCancelled) => {
                debug!("Biometric prompt cancelled by user");
                return Err(AuthError::Biometric(GateError::UserCancelled));
            }
            Err(error) => {
                warn!(%error, "Biometric authentication failed");
                return Err(AuthError::Biometric(error));
            }
        }

        let identifier = self.secrets.get(&self.keys.identifier).await?;
        let secret = self.secrets.get(&self.keys.secret).await?;

        match (identifier, secret) {
            (Some(identifier), Some(secret)) => self.login(&identifier, &secret).await,
            _ => {
                debug!("No stored credentials for biometric login");
                Err(AuthError::NoStoredCredentials)
            }
        }
    }

    /// Log out.
    ///
    /// Revokes the refresh token on the server if possible, ignoring the
    /// result, then clears memory and secret storage. Always succeeds locally.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        if let Some(record) = self.store.get().await {
            if let Err(error) = self.transport.logout(record.refresh_token()).await {
                debug!(%error, "Server logout failed; clearing locally");
            }
        }

        self.coordinator.clear(ClearReason::Logout).await;
        info!("Logged out");
    }

    /// Who is signed in.
    ///
    /// Answers from the current access token when it decodes and is outside
    /// its refresh window. Claims that have expired before the record does
    /// force a refresh. Otherwise falls back to
    /// [`refresh_session`](Self::refresh_session).
    #[instrument(skip_all)]
    pub async fn get_current_identity(&self) -> AuthResult<Identity> {
        if let Some(record) = self.store.get().await {
            let now = self.clock.now();
            if record.should_refresh_at(now, self.coordinator.refresh_window()) {
                debug!("Token inside refresh window");
            } else {
                match self.decoder.decode(record.access_token()) {
                    Ok(claims) if !claims.is_expired_at(now) => return Ok(claims.into()),
                    Ok(_) => {
                        debug!("Token claims expired before the record; forcing refresh");
                        let record = self.coordinator.force_refresh().await?;
                        return Ok(self.decoder.decode(record.access_token())?.into());
                    }
                    Err(error) => debug!(%error, "Current token does not decode"),
                }
            }
        }

        self.refresh_session().await
    }

    /// Refresh if needed, then decode the resulting token.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self) -> AuthResult<Identity> {
        let record = self.coordinator.get_valid_token().await?;
        let claims = self.decoder.decode(record.access_token())?;
        Ok(claims.into())
    }

    /// Whether [`get_current_identity`](Self::get_current_identity) succeeds.
    pub async fn has_active_session(&self) -> bool {
        self.get_current_identity().await.is_ok()
    }

    /// A bearer token outside its refresh window.
    pub async fn valid_access_token(&self) -> AuthResult<String> {
        let record = self.coordinator.get_valid_token().await?;
        Ok(record.access_token().to_string())
    }

    /// Restore a persisted session at launch.
    ///
    /// Reads the token pair from secret storage and places it in the session
    /// store. An access token that no longer decodes is kept as already
    /// expired so the next request refreshes it. Returns whether a session
    /// is now held.
    #[instrument(skip_all)]
    pub async fn restore(&self) -> AuthResult<bool> {
        if self.store.is_present().await {
            return Ok(true);
        }

        let Some(refresh_token) = self.secrets.get(&self.keys.refresh_token).await? else {
            debug!("No persisted session");
            return Ok(false);
        };
        let access_token = self
            .secrets
            .get(&self.keys.access_token)
            .await?
            .unwrap_or_default();

        let expires_at = match self.decoder.decode(&access_token) {
            Ok(claims) => claims.expires_at,
            Err(error) => {
                debug!(%error, "Persisted access token unusable; will refresh");
                self.clock.now()
            }
        };

        let record = TokenRecord::new(access_token, refresh_token, expires_at);
        if self.coordinator.restore(record).await {
            info!("Session restored");
        }
        Ok(true)
    }

    /// The current record, if any.
    pub async fn current_record(&self) -> Option<TokenRecord> {
        self.store.get().await
    }

    /// Coarse session state.
    pub async fn session_state(&self) -> SessionState {
        let Some(record) = self.store.get().await else {
            return SessionState::LoggedOut;
        };
        if self.coordinator.is_refreshing().await {
            return SessionState::Refreshing;
        }

        let now = self.clock.now();
        if record.is_expired_at(now) {
            SessionState::Expired
        } else if record.should_refresh_at(now, self.coordinator.refresh_window()) {
            SessionState::NeedsRefresh
        } else {
            SessionState::Fresh
        }
    }

    /// Whether credentials for biometric login are saved.
    pub async fn has_stored_credentials(&self) -> AuthResult<bool> {
        let identifier = self.secrets.get(&self.keys.identifier).await?;
        let secret = self.secrets.get(&self.keys.secret).await?;
        Ok(identifier.is_some() && secret.is_some())
    }

    /// Delete credentials saved for biometric login.
    pub async fn forget_stored_credentials(&self) -> AuthResult<()> {
        for key in self.keys.credential_keys() {
            self.secrets.delete(key).await?;
        }
        Ok(())
    }
}
