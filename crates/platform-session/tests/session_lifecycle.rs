//! Session lifecycle tests.
//!
//! Login, logout, restore at launch, biometric login, and the identity
//! queries the app uses to decide whether it is signed in.

mod common;

use common::{access_token, access_token_expiring_at, Harness, MockGate, MockTransport};
use platform_session::{
    AuthError, GateError, RawTokenResponse, SecretKeys, SecretStore, SessionConfig,
    SessionMetrics, SessionState, TransportError,
};
use std::sync::Arc;

#[tokio::test]
async fn test_login_then_refresh_scenario() {
    let harness = Harness::new();

    let identity = harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    assert_eq!(identity.user_id, "user-1");
    assert_eq!(identity.email, "a@b.com");
    assert_eq!(
        harness.transport.last_login(),
        Some(("a@b.com".to_string(), "hunter2".to_string()))
    );

    assert!(harness.sessions.has_active_session().await);
    assert_eq!(harness.sessions.session_state().await, SessionState::Fresh);
    assert_eq!(harness.transport.refresh_calls(), 0);

    harness.age_into_refresh_window();
    assert_eq!(harness.sessions.session_state().await, SessionState::NeedsRefresh);

    let refreshed = harness.sessions.get_current_identity().await.unwrap();
    assert_eq!(harness.transport.refresh_calls(), 1);
    assert_eq!(refreshed.user_id, "user-1");

    let record = harness.sessions.current_record().await.unwrap();
    assert_eq!(record.refresh_token(), "r1");
    assert_eq!(harness.sessions.session_state().await, SessionState::Fresh);

    // Fresh again: no further network calls
    harness.sessions.get_current_identity().await.unwrap();
    assert_eq!(harness.transport.refresh_calls(), 1);
}

#[tokio::test]
async fn test_login_persists_tokens_and_credentials() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();

    let keys = SecretKeys::default();
    let record = harness.sessions.current_record().await.unwrap();
    assert_eq!(
        harness.secrets.get(&keys.access_token).await.unwrap(),
        Some(record.access_token().to_string())
    );
    assert_eq!(
        harness.secrets.get(&keys.refresh_token).await.unwrap(),
        Some("r1".to_string())
    );
    assert!(harness.sessions.has_stored_credentials().await.unwrap());
}

#[tokio::test]
async fn test_login_succeeds_when_credential_save_fails() {
    let harness = Harness::new();
    harness.secrets.set_fail_writes(true);

    let identity = harness.sessions.login("a@b.com", "hunter2").await;

    assert!(identity.is_ok());
    assert!(harness.sessions.current_record().await.is_some());
    assert!(!harness.sessions.has_stored_credentials().await.unwrap());
}

#[tokio::test]
async fn test_login_without_remembering_credentials() {
    let config = SessionConfig::default().with_remember_credentials(false);
    let harness = Harness::build(MockTransport::new(), MockGate::new(true, Ok(())), config);

    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    assert!(!harness.sessions.has_stored_credentials().await.unwrap());
}

#[tokio::test]
async fn test_login_rejected() {
    let harness = Harness::new();
    harness.transport.set_login_result(Err(TransportError::Unauthorized));

    let result = harness.sessions.login("a@b.com", "wrong").await;

    assert_eq!(result, Err(AuthError::InvalidCredentials));
    assert!(result.unwrap_err().requires_login());
    assert_eq!(harness.sessions.session_state().await, SessionState::LoggedOut);
    assert!(harness.secrets.is_empty().await);
}

#[tokio::test]
async fn test_login_network_failure_is_transient() {
    let harness = Harness::new();
    harness
        .transport
        .set_login_result(Err(TransportError::Network("offline".to_string())));

    let result = harness.sessions.login("a@b.com", "hunter2").await;
    assert!(result.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_login_response_without_refresh_token() {
    let harness = Harness::new();
    harness.transport.set_login_result(Ok(RawTokenResponse::new(
        access_token("user-1", "a@b.com", 900, 0),
        900,
    )));

    let result = harness.sessions.login("a@b.com", "hunter2").await;
    assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
    assert_eq!(harness.sessions.current_record().await, None);
}

#[tokio::test]
async fn test_login_with_untrusted_issuer() {
    let config = SessionConfig::default().with_allowed_issuers(["some-other-issuer"]);
    let harness = Harness::build(MockTransport::new(), MockGate::new(true, Ok(())), config);

    let result = harness.sessions.login("a@b.com", "hunter2").await;
    assert!(matches!(
        result,
        Err(AuthError::Decode(platform_session::DecodeError::UntrustedIssuer(_)))
    ));
    assert_eq!(harness.sessions.current_record().await, None);
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();

    harness.sessions.logout().await;

    assert_eq!(harness.transport.logout_calls(), 1);
    assert_eq!(harness.sessions.current_record().await, None);
    assert!(harness.secrets.is_empty().await);
    assert!(!harness.sessions.has_active_session().await);
    assert_eq!(
        harness.sessions.get_current_identity().await,
        Err(AuthError::NoSession)
    );
}

#[tokio::test]
async fn test_logout_succeeds_when_server_unreachable() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    harness
        .transport
        .set_logout_result(Err(TransportError::Network("offline".to_string())));

    harness.sessions.logout().await;

    assert_eq!(harness.sessions.session_state().await, SessionState::LoggedOut);
    assert!(harness.secrets.is_empty().await);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let harness = Harness::new();

    harness.sessions.logout().await;
    harness.sessions.logout().await;

    assert_eq!(harness.transport.logout_calls(), 0);
    assert_eq!(harness.sessions.session_state().await, SessionState::LoggedOut);

    // Can log in again afterwards
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    assert!(harness.sessions.has_active_session().await);
}

#[tokio::test]
async fn test_expired_session_with_rejected_refresh() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    harness.transport.push_refresh(Harness::unauthorized());
    harness.clock.advance(chrono::Duration::hours(2));

    assert_eq!(harness.sessions.session_state().await, SessionState::Expired);
    assert!(!harness.sessions.has_active_session().await);
    assert_eq!(harness.sessions.session_state().await, SessionState::LoggedOut);
}

#[tokio::test]
async fn test_restore_persisted_session() {
    let first = Harness::new();
    first.sessions.login("a@b.com", "hunter2").await.unwrap();
    let record = first.sessions.current_record().await.unwrap();

    // A second orchestrator over the same secret store, as after a relaunch
    let sessions = platform_session::SessionOrchestrator::new(
        SessionConfig::default(),
        first.transport.clone(),
        first.secrets.clone(),
        first.gate.clone(),
    )
    .unwrap();

    assert_eq!(sessions.session_state().await, SessionState::LoggedOut);
    assert!(sessions.restore().await.unwrap());

    let restored = sessions.current_record().await.unwrap();
    assert_eq!(restored.access_token(), record.access_token());
    assert_eq!(restored.refresh_token(), "r1");

    let identity = sessions.get_current_identity().await.unwrap();
    assert_eq!(identity.user_id, "user-1");
    assert_eq!(first.transport.refresh_calls(), 0);
}

#[tokio::test]
async fn test_restore_with_unusable_access_token_refreshes() {
    let harness = Harness::new();
    let keys = SecretKeys::default();
    harness.secrets.save(&keys.access_token, "garbage").await.unwrap();
    harness.secrets.save(&keys.refresh_token, "r9").await.unwrap();

    assert!(harness.sessions.restore().await.unwrap());
    assert_eq!(harness.sessions.session_state().await, SessionState::Expired);

    let identity = harness.sessions.get_current_identity().await.unwrap();
    assert_eq!(identity.user_id, "user-1");
    assert_eq!(harness.transport.refreshed_with(), vec!["r9"]);
}

#[tokio::test]
async fn test_restore_with_nothing_persisted() {
    let harness = Harness::new();
    assert!(!harness.sessions.restore().await.unwrap());
    assert_eq!(
        harness.sessions.get_current_identity().await,
        Err(AuthError::NoSession)
    );
}

#[tokio::test]
async fn test_biometric_login_replays_saved_credentials() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    harness.sessions.logout().await;

    // Logout forgets saved credentials too
    let result = harness.sessions.login_with_biometrics().await;
    assert_eq!(result, Err(AuthError::NoStoredCredentials));

    let keys = SecretKeys::default();
    harness.secrets.save(&keys.identifier, "a@b.com").await.unwrap();
    harness.secrets.save(&keys.secret, "hunter2").await.unwrap();

    let identity = harness.sessions.login_with_biometrics().await.unwrap();
    assert_eq!(identity.email, "a@b.com");
    assert_eq!(harness.transport.login_calls(), 2);
    assert_eq!(harness.gate.prompts(), 2);
}

#[tokio::test]
async fn test_biometric_unavailable() {
    let harness = Harness::build(
        MockTransport::new(),
        MockGate::new(false, Ok(())),
        SessionConfig::default(),
    );

    let result = harness.sessions.login_with_biometrics().await;
    assert_eq!(result, Err(AuthError::Biometric(GateError::NotAvailable)));
    assert_eq!(harness.gate.prompts(), 0);
}

#[tokio::test]
async fn test_biometric_cancel_is_distinct_from_failure() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    harness.gate.set_outcome(Err(GateError::UserCancelled));

    let cancelled = harness.sessions.login_with_biometrics().await.unwrap_err();
    assert!(cancelled.is_user_cancelled());

    harness.gate.set_outcome(Err(GateError::Locked));
    let locked = harness.sessions.login_with_biometrics().await.unwrap_err();
    assert_eq!(locked, AuthError::Biometric(GateError::Locked));
    assert!(!locked.is_user_cancelled());

    // Biometric failures never block a standard login
    assert_eq!(harness.transport.login_calls(), 1);
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    assert_eq!(harness.transport.login_calls(), 2);
}

#[tokio::test]
async fn test_forget_stored_credentials() {
    let harness = Harness::new();
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    assert!(harness.sessions.has_stored_credentials().await.unwrap());

    harness.sessions.forget_stored_credentials().await.unwrap();

    assert!(!harness.sessions.has_stored_credentials().await.unwrap());
    // The session itself is untouched
    assert!(harness.sessions.has_active_session().await);
}

#[tokio::test]
async fn test_metrics_observer() {
    let metrics = Arc::new(SessionMetrics::new());
    let harness = Harness::new();
    let sessions = platform_session::SessionOrchestrator::new(
        SessionConfig::default(),
        harness.transport.clone(),
        harness.secrets.clone(),
        harness.gate.clone(),
    )
    .unwrap()
    .with_clock(harness.clock.clone())
    .with_observer(metrics.clone());

    sessions.login("a@b.com", "hunter2").await.unwrap();
    harness.age_into_refresh_window();
    sessions.valid_access_token().await.unwrap();
    sessions.logout().await;

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.logins, 1);
    assert_eq!(snapshot.refreshes_started, 1);
    assert_eq!(snapshot.refresh_successes, 1);
    assert_eq!(snapshot.refresh_failures, 0);
    assert_eq!(snapshot.sessions_cleared, 1);
}

#[tokio::test]
async fn test_login_with_out_of_range_expires_in() {
    let harness = Harness::new();
    harness.transport.set_login_result(Ok(RawTokenResponse::new(
        access_token("user-1", "a@b.com", 900, 0),
        i64::MAX,
    )
    .with_refresh_token("r1")));

    let result = harness.sessions.login("a@b.com", "hunter2").await;

    assert!(matches!(result, Err(AuthError::MalformedResponse(_))));
    assert_eq!(harness.sessions.current_record().await, None);
    assert!(harness.secrets.is_empty().await);
}

#[tokio::test]
async fn test_restore_token_expiring_at_earliest_instant() {
    let harness = Harness::new();
    let keys = SecretKeys::default();
    let exp = chrono::DateTime::<chrono::Utc>::MIN_UTC.timestamp();
    harness
        .secrets
        .save(&keys.access_token, &access_token_expiring_at(exp))
        .await
        .unwrap();
    harness.secrets.save(&keys.refresh_token, "r9").await.unwrap();

    assert!(harness.sessions.restore().await.unwrap());
    assert_eq!(harness.sessions.session_state().await, SessionState::Expired);

    let identity = harness.sessions.get_current_identity().await.unwrap();
    assert_eq!(identity.user_id, "user-1");
    assert_eq!(harness.transport.refreshed_with(), vec!["r9"]);
}

#[tokio::test]
async fn test_restore_token_with_unrepresentable_exp() {
    let harness = Harness::new();
    let keys = SecretKeys::default();
    harness
        .secrets
        .save(&keys.access_token, &access_token_expiring_at(i64::MAX))
        .await
        .unwrap();
    harness.secrets.save(&keys.refresh_token, "r9").await.unwrap();

    // Treated as undecodable, so restored as already expired
    assert!(harness.sessions.restore().await.unwrap());
    assert_eq!(harness.sessions.session_state().await, SessionState::Expired);

    harness.sessions.get_current_identity().await.unwrap();
    assert_eq!(harness.transport.refresh_calls(), 1);
}

#[tokio::test]
async fn test_expired_claims_on_live_record_force_refresh() {
    let harness = Harness::new();
    // The server declares 900 s but the token's own exp has already passed
    harness.transport.set_login_result(Ok(RawTokenResponse::new(
        access_token("user-1", "a@b.com", -60, 0),
        900,
    )
    .with_refresh_token("r1")));
    harness.sessions.login("a@b.com", "hunter2").await.unwrap();
    assert_eq!(harness.sessions.session_state().await, SessionState::Fresh);

    let identity = harness.sessions.get_current_identity().await.unwrap();

    assert_eq!(harness.transport.refresh_calls(), 1);
    assert!(identity.expires_at > chrono::Utc::now());
}
