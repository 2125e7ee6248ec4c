//! Observability hooks for session events
//!
//! Components report lifecycle events to an injected [`SessionObserver`].
//! [`SessionMetrics`] is a counting observer whose snapshot can be exported
//! by whatever metrics sink the app uses.

use crate::error::AuthError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why a session was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// The user logged out
    Logout,
    /// The server rejected the refresh token
    RefreshRejected,
}

/// Receives session lifecycle events. All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// A login completed.
    fn login_succeeded(&self) {}

    /// A login failed.
    fn login_failed(&self, _error: &AuthError) {}

    /// A refresh call was issued to the transport.
    fn refresh_started(&self) {}

    /// A refresh call completed and its record was committed.
    fn refresh_succeeded(&self) {}

    /// A refresh call failed.
    fn refresh_failed(&self, _error: &AuthError) {}

    /// The session was cleared.
    fn session_cleared(&self, _reason: ClearReason) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Counting observer.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    logins: AtomicU64,
    login_failures: AtomicU64,
    refreshes_started: AtomicU64,
    refresh_successes: AtomicU64,
    refresh_failures: AtomicU64,
    sessions_cleared: AtomicU64,
}

/// Point-in-time copy of [`SessionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetricsSnapshot {
    /// Successful logins
    pub logins: u64,
    /// Failed logins
    pub login_failures: u64,
    /// Transport refresh calls issued
    pub refreshes_started: u64,
    /// Refreshes committed
    pub refresh_successes: u64,
    /// Refreshes failed
    pub refresh_failures: u64,
    /// Sessions cleared (logout or rejected refresh)
    pub sessions_cleared: u64,
}

impl SessionMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            logins: self.logins.load(Ordering::Relaxed),
            login_failures: self.login_failures.load(Ordering::Relaxed),
            refreshes_started: self.refreshes_started.load(Ordering::Relaxed),
            refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            sessions_cleared: self.sessions_cleared.load(Ordering::Relaxed),
        }
    }
}

impl SessionObserver for SessionMetrics {
    fn login_succeeded(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    fn login_failed(&self, _error: &AuthError) {
        self.login_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn refresh_started(&self) {
        self.refreshes_started.fetch_add(1, Ordering::Relaxed);
    }

    fn refresh_succeeded(&self) {
        self.refresh_successes.fetch_add(1, Ordering::Relaxed);
    }

    fn refresh_failed(&self, _error: &AuthError) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn session_cleared(&self, _reason: ClearReason) {
        self.sessions_cleared.fetch_add(1, Ordering::Relaxed);
    }
}
