//! Identity claims decoded from access tokens
//!
//! This module turns a compact three-segment token (`header.payload.signature`)
//! into [`IdentityClaims`]. It validates structure, payload encoding, required
//! claims, and the issuer allow-list.
//!
//! Signature verification is not performed unless a [`SignatureVerifier`] is
//! configured on the decoder. Without one the decoder is a structural and
//! claims validator only, and trusts the server that issued the token.

use crate::error::DecodeError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// URL-safe alphabet, accepting payloads with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried by an access token.
///
/// Recomputed every time a token is decoded; never cached apart from the
/// token it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (user ID)
    #[serde(rename = "sub")]
    pub subject_id: String,

    /// User email
    pub email: String,

    /// User role
    pub role: String,

    /// Issued at
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration time
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    /// Issuer
    #[serde(rename = "iss")]
    pub issuer: String,
}

impl IdentityClaims {
    /// Check if the claims are past expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The signed-in user, as presented to the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID
    pub user_id: String,

    /// User email
    pub email: String,

    /// User role
    pub role: String,

    /// When the access token backing this identity expires
    pub expires_at: DateTime<Utc>,
}

impl From<IdentityClaims> for Identity {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.subject_id,
            email: claims.email,
            role: claims.role,
            expires_at: claims.expires_at,
        }
    }
}

/// Verifies the signature segment of a token.
///
/// Plug one into [`ClaimsDecoder::with_verifier`] to reject tokens whose
/// signature does not match. Without a verifier the decoder accepts any
/// signature.
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` (base64url, unpadded) over `signing_input`
    /// (`header.payload`, exactly as it appears in the token).
    fn verify(&self, signing_input: &str, signature: &str) -> Result<(), DecodeError>;
}

/// Decodes access tokens into identity claims.
#[derive(Clone)]
pub struct ClaimsDecoder {
    allowed_issuers: Vec<String>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl std::fmt::Debug for ClaimsDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsDecoder")
            .field("allowed_issuers", &self.allowed_issuers)
            .field("verifies_signature", &self.verifier.is_some())
            .finish()
    }
}

impl ClaimsDecoder {
    /// Create a decoder that accepts tokens from the given issuers.
    pub fn new<I, S>(allowed_issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_issuers: allowed_issuers.into_iter().map(Into::into).collect(),
            verifier: None,
        }
    }

    /// Require tokens to pass signature verification.
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Issuers this decoder trusts.
    pub fn allowed_issuers(&self) -> &[String] {
        &self.allowed_issuers
    }

    /// Decode and validate a token.
    ///
    /// # Errors
    ///
    /// - `MalformedStructure` unless there are exactly three non-empty segments
    /// - `MalformedEncoding` if the payload is not base64url JSON
    /// - `MissingClaims` listing every absent required claim
    /// - `UntrustedIssuer` if `iss` is not allow-listed
    /// - `InvalidSignature` if a configured verifier rejects the token
    pub fn decode(&self, token: &str) -> Result<IdentityClaims, DecodeError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(DecodeError::MalformedStructure);
        }

        let payload = decode_segment(segments[1])?;
        let claims = parse_claims(&payload)?;

        if !self.allowed_issuers.iter().any(|iss| iss == &claims.issuer) {
            return Err(DecodeError::UntrustedIssuer(claims.issuer));
        }

        if let Some(ref verifier) = self.verifier {
            let signing_input_len = segments[0].len() + 1 + segments[1].len();
            verifier.verify(&token[..signing_input_len], segments[2])?;
        }

        Ok(claims)
    }
}

fn decode_segment(segment: &str) -> Result<JsonValue, DecodeError> {
    let bytes = URL_SAFE_LENIENT
        .decode(segment)
        .map_err(|e| DecodeError::MalformedEncoding(e.to_string()))?;

    let value: JsonValue = serde_json::from_slice(&bytes)
        .map_err(|e| DecodeError::MalformedEncoding(e.to_string()))?;

    if !value.is_object() {
        return Err(DecodeError::MalformedEncoding(
            "payload is not a JSON object".to_string(),
        ));
    }

    Ok(value)
}

fn parse_claims(payload: &JsonValue) -> Result<IdentityClaims, DecodeError> {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    // NumericDate may be fractional; sub-second precision is dropped
    let timestamp = |key: &'static str| -> Result<Option<DateTime<Utc>>, DecodeError> {
        let Some(secs) = payload
            .get(key)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        else {
            return Ok(None);
        };
        DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| DecodeError::MalformedEncoding(format!("{} out of range: {}", key, secs)))
    };

    let subject_id = text("sub");
    let email = text("email");
    let role = text("role");
    let expires_at = timestamp("exp")?;
    let issued_at = timestamp("iat")?;
    let issuer = text("iss");

    match (subject_id, email, role, expires_at, issued_at, issuer) {
        (Some(subject_id), Some(email), Some(role), Some(expires_at), Some(issued_at), Some(issuer)) => {
            Ok(IdentityClaims {
                subject_id,
                email,
                role,
                issued_at,
                expires_at,
                issuer,
            })
        }
        (sub, email, role, exp, iat, iss) => {
            let mut missing = Vec::new();
            if sub.is_none() {
                missing.push("sub");
            }
            if email.is_none() {
                missing.push("email");
            }
            if role.is_none() {
                missing.push("role");
            }
            if exp.is_none() {
                missing.push("exp");
            }
            if iat.is_none() {
                missing.push("iat");
            }
            if iss.is_none() {
                missing.push("iss");
            }
            Err(DecodeError::MissingClaims(missing))
        }
    }
}
