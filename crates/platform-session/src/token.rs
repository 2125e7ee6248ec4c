//! Token records and the raw token response returned by a transport
//!
//! A [`TokenRecord`] is an immutable access/refresh pair with its expiry.
//! Refreshing never edits a record; it produces a new one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lead time before hard expiry at which a token is considered stale.
pub const DEFAULT_REFRESH_WINDOW_SECS: i64 = 300;

/// Default refresh window as a [`Duration`].
pub fn default_refresh_window() -> Duration {
    Duration::seconds(DEFAULT_REFRESH_WINDOW_SECS)
}

/// One access/refresh credential pair.
///
/// All expiry predicates are computed from `expires_at`; nothing derived
/// is stored.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &fingerprint(&self.access_token))
            .field("refresh_token", &fingerprint(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenRecord {
    /// Create a record with an absolute expiry.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Create a record from a declared lifetime.
    ///
    /// A lifetime beyond the representable range saturates at the
    /// earliest or latest instant. Use [`expiry_after`] to reject it instead.
    ///
    /// # Arguments
    ///
    /// * `expires_in_secs` - Lifetime in seconds, counted from `issued_at`
    /// * `issued_at` - The instant the response was received
    pub fn from_expires_in(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = expiry_after(issued_at, expires_in_secs).unwrap_or(if expires_in_secs < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        Self::new(access_token, refresh_token, expires_at)
    }

    /// The bearer access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The refresh token.
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Hard expiry of the access token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the access token is past hard expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the access token is inside its refresh window at `now`.
    pub fn should_refresh_at(&self, now: DateTime<Utc>, refresh_window: Duration) -> bool {
        match self.expires_at.checked_sub_signed(refresh_window) {
            Some(threshold) => now >= threshold,
            // Threshold lies before the earliest instant, or after the latest
            None => refresh_window > Duration::zero(),
        }
    }

    /// Time until hard expiry at `now`, clamped at zero.
    pub fn time_remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Check if the access token is past hard expiry.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check if the access token is inside the default refresh window.
    pub fn should_refresh(&self) -> bool {
        self.should_refresh_at(Utc::now(), default_refresh_window())
    }

    /// Time until hard expiry, clamped at zero.
    pub fn time_remaining(&self) -> Duration {
        self.time_remaining_at(Utc::now())
    }

    /// Build the successor record from a refresh response.
    ///
    /// The refresh token carries over unless the response rotates it.
    pub(crate) fn successor(&self, access_token: String, rotated: Option<String>, expires_at: DateTime<Utc>) -> Self {
        Self::new(
            access_token,
            rotated.unwrap_or_else(|| self.refresh_token.clone()),
            expires_at,
        )
    }

    /// Short fingerprint of the access token for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.access_token)
    }
}

/// Instant `secs` seconds after `issued_at`, or `None` if out of range.
pub fn expiry_after(issued_at: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(secs).and_then(|lifetime| issued_at.checked_add_signed(lifetime))
}

/// Token response as returned by a credential transport.
///
/// `refresh_token` being present is the explicit rotation signal: on a
/// refresh, `None` means "keep using the current refresh token".
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawTokenResponse {
    /// New access token
    pub access_token: String,

    /// New refresh token, if issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// Token type (usually "Bearer")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for RawTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawTokenResponse")
            .field("access_token", &fingerprint(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(fingerprint))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl RawTokenResponse {
    /// Create a response with a declared lifetime and no rotation.
    pub fn new(access_token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: Some(expires_in),
            token_type: Some("Bearer".to_string()),
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Drop the declared lifetime so expiry comes from the token's claims.
    pub fn without_expires_in(mut self) -> Self {
        self.expires_in = None;
        self
    }
}

/// First 8 hex chars of the SHA-256 of a token.
///
/// Used to correlate tokens in logs without writing them out.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}
