//! JWT signature verification
//!
//! This module provides a [`SignatureVerifier`] backed by the jsonwebtoken
//! crate. It supports RS256, RS384, RS512, ES256, ES384, and HS256 algorithms.
//!
//! Configuring a verifier is opt-in: a [`ClaimsDecoder`](crate::ClaimsDecoder)
//! without one accepts any signature.

use crate::claims::SignatureVerifier;
use crate::config::ConfigError;
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};

use jsonwebtoken::{Algorithm, DecodingKey};

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
}

impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
            JwtAlgorithm::RS256 => Algorithm::RS256,
            JwtAlgorithm::RS384 => Algorithm::RS384,
            JwtAlgorithm::RS512 => Algorithm::RS512,
            JwtAlgorithm::ES256 => Algorithm::ES256,
            JwtAlgorithm::ES384 => Algorithm::ES384,
        }
    }
}

/// Verifies token signatures with a fixed key and algorithm.
pub struct JwtSignatureVerifier {
    algorithm: JwtAlgorithm,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSignatureVerifier")
            .field("algorithm", &self.algorithm)
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtSignatureVerifier {
    /// Create a verifier for an HMAC secret.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `algorithm` is not an HMAC algorithm.
    pub fn with_secret(algorithm: JwtAlgorithm, secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        match algorithm {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => Ok(Self {
                algorithm,
                decoding_key: DecodingKey::from_secret(secret.as_ref()),
            }),
            _ => Err(ConfigError::InvalidValue {
                key: "algorithm".to_string(),
                message: "Secret verification requires an HMAC algorithm".to_string(),
            }),
        }
    }

    /// Create a verifier for an RSA or EC public key in PEM format.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key cannot be parsed or
    /// `algorithm` is an HMAC algorithm.
    pub fn with_public_key_pem(algorithm: JwtAlgorithm, pem: &str) -> Result<Self, ConfigError> {
        let decoding_key = match algorithm {
            JwtAlgorithm::RS256 | JwtAlgorithm::RS384 | JwtAlgorithm::RS512 => {
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| ConfigError::InvalidValue {
                    key: "public_key".to_string(),
                    message: format!("Invalid RSA public key: {}", e),
                })?
            }
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => {
                DecodingKey::from_ec_pem(pem.as_bytes()).map_err(|e| ConfigError::InvalidValue {
                    key: "public_key".to_string(),
                    message: format!("Invalid EC public key: {}", e),
                })?
            }
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => {
                return Err(ConfigError::InvalidValue {
                    key: "algorithm".to_string(),
                    message: "Public key verification requires an RSA or EC algorithm".to_string(),
                });
            }
        };

        Ok(Self {
            algorithm,
            decoding_key,
        })
    }

    /// The algorithm signatures are checked against.
    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }
}

impl SignatureVerifier for JwtSignatureVerifier {
    fn verify(&self, signing_input: &str, signature: &str) -> Result<(), DecodeError> {
        match jsonwebtoken::crypto::verify(
            signature,
            signing_input.as_bytes(),
            &self.decoding_key,
            self.algorithm.into(),
        ) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(DecodeError::InvalidSignature),
        }
    }
}
