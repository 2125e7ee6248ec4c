//! Shared fixtures for session integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use platform_session::{
    BiometricGate, CredentialTransport, GateError, ManualClock, MemorySecretStore,
    RawTokenResponse, SessionConfig, SessionOrchestrator, TransportError, TransportResult,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ISSUER: &str = "relay-platform";

/// Build an unsigned access token for `subject` expiring in `expires_in` seconds.
pub fn access_token(subject: &str, email: &str, expires_in: i64, nonce: usize) -> String {
    let now = Utc::now();
    let payload = serde_json::json!({
        "sub": subject,
        "email": email,
        "role": "member",
        "iat": now.timestamp(),
        "exp": (now + Duration::seconds(expires_in)).timestamp(),
        "iss": ISSUER,
        "nonce": nonce,
    });
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}

/// Build an unsigned access token for `user-1` with an absolute `exp`.
pub fn access_token_expiring_at(exp: i64) -> String {
    let payload = serde_json::json!({
        "sub": "user-1",
        "email": "a@b.com",
        "role": "member",
        "iat": Utc::now().timestamp(),
        "exp": exp,
        "iss": ISSUER,
    });
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}

/// Transport with scripted responses, an optional delay, and call counters.
///
/// Refreshes with no scripted response succeed with a new access token
/// (distinct per call) and no rotation.
pub struct MockTransport {
    delay: std::time::Duration,
    login_result: Mutex<TransportResult<RawTokenResponse>>,
    refresh_script: Mutex<VecDeque<TransportResult<RawTokenResponse>>>,
    logout_result: Mutex<TransportResult<()>>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    last_login: Mutex<Option<(String, String)>>,
    refreshed_with: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            delay: std::time::Duration::ZERO,
            login_result: Mutex::new(Ok(RawTokenResponse::new(
                access_token("user-1", "a@b.com", 900, 0),
                900,
            )
            .with_refresh_token("r1"))),
            refresh_script: Mutex::new(VecDeque::new()),
            logout_result: Mutex::new(Ok(())),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            last_login: Mutex::new(None),
            refreshed_with: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_login_result(&self, result: TransportResult<RawTokenResponse>) {
        *self.login_result.lock().unwrap() = result;
    }

    pub fn push_refresh(&self, result: TransportResult<RawTokenResponse>) {
        self.refresh_script.lock().unwrap().push_back(result);
    }

    pub fn set_logout_result(&self, result: TransportResult<()>) {
        *self.logout_result.lock().unwrap() = result;
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn last_login(&self) -> Option<(String, String)> {
        self.last_login.lock().unwrap().clone()
    }

    pub fn refreshed_with(&self) -> Vec<String> {
        self.refreshed_with.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl CredentialTransport for MockTransport {
    async fn login(&self, identifier: &str, secret: &str) -> TransportResult<RawTokenResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_login.lock().unwrap() = Some((identifier.to_string(), secret.to_string()));
        self.pause().await;
        self.login_result.lock().unwrap().clone()
    }

    async fn refresh(&self, refresh_token: &str) -> TransportResult<RawTokenResponse> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.refreshed_with
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.pause().await;

        let scripted = self.refresh_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(RawTokenResponse::new(
                access_token("user-1", "a@b.com", 900, n),
                900,
            ))
        })
    }

    async fn logout(&self, _refresh_token: &str) -> TransportResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.logout_result.lock().unwrap().clone()
    }
}

/// Biometric gate with a switchable outcome.
pub struct MockGate {
    available: bool,
    outcome: Mutex<Result<(), GateError>>,
    prompts: AtomicUsize,
}

impl MockGate {
    pub fn new(available: bool, outcome: Result<(), GateError>) -> Self {
        Self {
            available,
            outcome: Mutex::new(outcome),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: Result<(), GateError>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricGate for MockGate {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn authenticate(&self, _reason: &str) -> Result<(), GateError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.outcome.lock().unwrap()
    }
}

/// A wired-up orchestrator plus handles to its collaborators.
pub struct Harness {
    pub sessions: SessionOrchestrator,
    pub transport: Arc<MockTransport>,
    pub secrets: Arc<MemorySecretStore>,
    pub gate: Arc<MockGate>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_transport(MockTransport::new())
    }

    pub fn with_transport(transport: MockTransport) -> Self {
        Self::build(transport, MockGate::new(true, Ok(())), SessionConfig::default())
    }

    pub fn build(transport: MockTransport, gate: MockGate, config: SessionConfig) -> Self {
        let transport = Arc::new(transport);
        let secrets = Arc::new(MemorySecretStore::new());
        let gate = Arc::new(gate);
        let clock = Arc::new(ManualClock::starting_now());

        let sessions = SessionOrchestrator::new(
            config,
            transport.clone(),
            secrets.clone(),
            gate.clone(),
        )
        .unwrap()
        .with_clock(clock.clone());

        Self {
            sessions,
            transport,
            secrets,
            gate,
            clock,
        }
    }

    /// Move the clock into the refresh window of a 900 s token.
    pub fn age_into_refresh_window(&self) {
        self.clock.advance(Duration::seconds(601));
    }

    pub fn unauthorized() -> TransportResult<RawTokenResponse> {
        Err(TransportError::Unauthorized)
    }
}
