//! Single-flight token refresh
//!
//! [`RefreshCoordinator`] hands out valid token records. When the current
//! record is inside its refresh window, concurrent callers are funnelled into
//! one in-flight refresh against the credential transport and all of them
//! observe the same outcome.
//!
//! ## Attempt lifecycle
//!
//! An attempt runs on its own task, so a caller going away does not abort
//! the transport call. When the call returns, the task takes the registry
//! lock, removes its attempt, commits the outcome to the session store and
//! secret store, and only then resolves its waiters. A caller arriving after
//! that point either sees the new record or starts a fresh attempt.
//!
//! An attempt that was superseded (by [`RefreshCoordinator::force_refresh`],
//! a new login, or a logout) never commits; its own waiters still receive
//! its outcome.

use crate::claims::ClaimsDecoder;
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};
use crate::observer::{ClearReason, NoopObserver, SessionObserver};
use crate::secrets::{SecretKeys, SecretStore};
use crate::store::SessionStore;
use crate::token::{default_refresh_window, expiry_after, fingerprint, RawTokenResponse, TokenRecord};
use crate::transport::CredentialTransport;
use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

type SharedOutcome = Shared<BoxFuture<'static, AuthResult<TokenRecord>>>;

/// The one refresh currently in flight.
struct RefreshAttempt {
    id: Uuid,
    refresh_token: String,
    outcome: SharedOutcome,
}

impl std::fmt::Debug for RefreshAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshAttempt")
            .field("id", &self.id)
            .field("refresh_token", &fingerprint(&self.refresh_token))
            .finish()
    }
}

/// Deduplicates concurrent refreshes and commits their results.
#[derive(Clone)]
pub struct RefreshCoordinator {
    store: Arc<SessionStore>,
    transport: Arc<dyn CredentialTransport>,
    secrets: Arc<dyn SecretStore>,
    decoder: ClaimsDecoder,
    keys: SecretKeys,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn SessionObserver>,
    refresh_window: Duration,
    in_flight: Arc<Mutex<Option<RefreshAttempt>>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("decoder", &self.decoder)
            .field("keys", &self.keys)
            .field("refresh_window", &self.refresh_window)
            .finish()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator over a session store and its collaborators.
    ///
    /// Uses the system clock, the default refresh window, the default key
    /// layout, and no observer until configured otherwise.
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn CredentialTransport>,
        secrets: Arc<dyn SecretStore>,
        decoder: ClaimsDecoder,
    ) -> Self {
        Self {
            store,
            transport,
            secrets,
            decoder,
            keys: SecretKeys::default(),
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
            refresh_window: default_refresh_window(),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the observer.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the lead time before expiry at which tokens are refreshed.
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Set the secret store key layout.
    pub fn with_keys(mut self, keys: SecretKeys) -> Self {
        self.keys = keys;
        self
    }

    /// The refresh window in use.
    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    /// Get a record that is outside its refresh window.
    ///
    /// Returns the current record untouched when it is fresh. Otherwise joins
    /// the in-flight refresh or starts one.
    ///
    /// # Errors
    ///
    /// - `NoSession` if no record is held
    /// - `SessionInvalid` if the server rejected the refresh token
    /// - `Transient` on network/server failure; the old record is kept
    #[instrument(skip(self))]
    pub async fn get_valid_token(&self) -> AuthResult<TokenRecord> {
        let record = self.store.get().await.ok_or(AuthError::NoSession)?;
        if !self.needs_refresh(&record) {
            debug!(token = %record.fingerprint(), "Token is fresh");
            return Ok(record);
        }

        let outcome = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(attempt) => {
                    debug!(attempt_id = %attempt.id, "Joining in-flight refresh");
                    attempt.outcome.clone()
                }
                None => {
                    // An attempt may have committed while we waited for the lock
                    let record = self.store.get().await.ok_or(AuthError::NoSession)?;
                    if !self.needs_refresh(&record) {
                        debug!(token = %record.fingerprint(), "Token refreshed by another caller");
                        return Ok(record);
                    }
                    self.start_attempt(&mut slot, record)
                }
            }
        };

        outcome.await
    }

    /// Refresh unconditionally, even if the current token is fresh.
    ///
    /// Any in-flight attempt is superseded: its waiters still get its result,
    /// but it will not commit. Callers of [`get_valid_token`](Self::get_valid_token)
    /// after this returns observe the record it produced or a newer one.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> AuthResult<TokenRecord> {
        let outcome = {
            let mut slot = self.in_flight.lock().await;
            if let Some(previous) = slot.take() {
                debug!(attempt_id = %previous.id, "Superseding in-flight refresh");
            }
            let record = self.store.get().await.ok_or(AuthError::NoSession)?;
            self.start_attempt(&mut slot, record)
        };

        outcome.await
    }

    /// Like [`get_valid_token`](Self::get_valid_token), but tolerates a
    /// transient refresh failure while the old token has not hard-expired.
    pub async fn get_usable_token(&self) -> AuthResult<TokenRecord> {
        match self.get_valid_token().await {
            Err(AuthError::Transient(error)) => match self.store.get().await {
                Some(record) if !record.is_expired_at(self.clock.now()) => {
                    debug!(%error, "Refresh failed; using token inside refresh window");
                    Ok(record)
                }
                _ => Err(AuthError::Transient(error)),
            },
            other => other,
        }
    }

    /// Whether a refresh is currently in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }

    /// Replace the session with a newly issued record.
    ///
    /// Supersedes any in-flight refresh so a refresh from an earlier session
    /// cannot overwrite it.
    pub(crate) async fn install(&self, record: TokenRecord) {
        let mut slot = self.in_flight.lock().await;
        if let Some(previous) = slot.take() {
            debug!(attempt_id = %previous.id, "Discarding refresh from previous session");
        }
        self.store.set(Some(record.clone())).await;
        self.persist_tokens(&record, true).await;
    }

    /// Seed the store with a record read back from secret storage.
    ///
    /// Does nothing if a record is already held. Returns whether the
    /// record was placed.
    pub(crate) async fn restore(&self, record: TokenRecord) -> bool {
        let _slot = self.in_flight.lock().await;
        if self.store.is_present().await {
            return false;
        }
        self.store.set(Some(record)).await;
        true
    }

    /// Clear the session from memory and secret storage.
    ///
    /// Holds the registry lock throughout, so a refresh finishing
    /// concurrently cannot repopulate storage afterwards.
    pub(crate) async fn clear(&self, reason: ClearReason) {
        let mut slot = self.in_flight.lock().await;
        if let Some(previous) = slot.take() {
            debug!(attempt_id = %previous.id, "Discarding in-flight refresh");
        }
        self.clear_locked(reason).await;
    }

    fn needs_refresh(&self, record: &TokenRecord) -> bool {
        record.should_refresh_at(self.clock.now(), self.refresh_window)
    }

    /// Register and spawn a new attempt. Caller holds the registry lock.
    fn start_attempt(&self, slot: &mut Option<RefreshAttempt>, record: TokenRecord) -> SharedOutcome {
        let id = Uuid::now_v7();
        let refresh_token = record.refresh_token().to_string();
        debug!(attempt_id = %id, refresh_token = %fingerprint(&refresh_token), "Starting refresh");

        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.run_attempt(id, record).await });

        let outcome = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(AuthError::Internal(format!("Refresh task failed: {}", e))))
        }
        .boxed()
        .shared();

        *slot = Some(RefreshAttempt {
            id,
            refresh_token,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn run_attempt(&self, id: Uuid, record: TokenRecord) -> AuthResult<TokenRecord> {
        self.observer.refresh_started();
        let response = self.transport.refresh(record.refresh_token()).await;

        let mut slot = self.in_flight.lock().await;
        let is_current = slot.as_ref().map_or(false, |attempt| attempt.id == id);
        if is_current {
            *slot = None;
        }

        let outcome = match response {
            Ok(response) => self.successor(&record, response),
            Err(error) => Err(AuthError::from_refresh_failure(error)),
        };

        if !is_current {
            debug!(attempt_id = %id, "Refresh was superseded; not committing");
            return outcome;
        }

        match &outcome {
            Ok(next) => {
                let rotated = next.refresh_token() != record.refresh_token();
                self.store.set(Some(next.clone())).await;
                self.persist_tokens(next, rotated).await;
                self.observer.refresh_succeeded();
                info!(
                    attempt_id = %id,
                    token = %next.fingerprint(),
                    rotated,
                    "Token refreshed"
                );
            }
            Err(AuthError::SessionInvalid) => {
                warn!(attempt_id = %id, "Refresh token rejected; clearing session");
                self.observer.refresh_failed(&AuthError::SessionInvalid);
                self.clear_locked(ClearReason::RefreshRejected).await;
            }
            Err(error) => {
                warn!(attempt_id = %id, %error, "Refresh failed; keeping current session");
                self.observer.refresh_failed(error);
            }
        }

        drop(slot);
        outcome
    }

    fn successor(&self, record: &TokenRecord, response: RawTokenResponse) -> AuthResult<TokenRecord> {
        let expires_at = match response.expires_in {
            Some(secs) => expiry_after(self.clock.now(), secs).ok_or_else(|| {
                AuthError::MalformedResponse(format!("expires_in out of range: {}", secs))
            })?,
            None => self.decoder.decode(&response.access_token)?.expires_at,
        };
        Ok(record.successor(response.access_token, response.refresh_token, expires_at))
    }

    /// Best effort: memory is canonical, so a failed write is only logged.
    async fn persist_tokens(&self, record: &TokenRecord, include_refresh: bool) {
        if let Err(error) = self
            .secrets
            .save(&self.keys.access_token, record.access_token())
            .await
        {
            warn!(%error, "Failed to persist access token");
        }
        if include_refresh {
            if let Err(error) = self
                .secrets
                .save(&self.keys.refresh_token, record.refresh_token())
                .await
            {
                warn!(%error, "Failed to persist refresh token");
            }
        }
    }

    async fn clear_locked(&self, reason: ClearReason) {
        if let Some(record) = self.store.take().await {
            debug!(token = %record.fingerprint(), ?reason, "Clearing session");
        }
        for key in self
            .keys
            .token_keys()
            .into_iter()
            .chain(self.keys.credential_keys())
        {
            if let Err(error) = self.secrets.delete(key).await {
                warn!(%error, "Failed to delete secret");
            }
        }
        self.observer.session_cleared(reason);
    }
}
