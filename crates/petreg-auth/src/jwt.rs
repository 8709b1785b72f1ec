//! Bearer token issuance and verification.
//!
//! One `TokenIssuer` exists per principal kind. Each has its own secret and
//! default lifetime, and stamps its kind marker into the claims.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use petreg_core::{ClientId, SigningAlgorithm, UserId};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// A kind of principal that can hold bearer tokens.
pub trait PrincipalKind: Send + Sync + 'static {
    /// Identifier type the token subject must parse to.
    type Id: FromStr + Display + Send + Sync;

    /// Marker written to the `typ` claim.
    const MARKER: &'static str;
}

/// API clients. Subjects are integers.
#[derive(Debug, Clone, Copy)]
pub struct ClientKind;

impl PrincipalKind for ClientKind {
    type Id = ClientId;
    const MARKER: &'static str = "client";
}

/// End users. Subjects are UUIDs.
#[derive(Debug, Clone, Copy)]
pub struct UserKind;

impl PrincipalKind for UserKind {
    type Id = UserId;
    const MARKER: &'static str = "user";
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal identifier).
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Principal kind marker.
    #[serde(rename = "typ")]
    pub kind: String,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// The encoded token.
    pub access_token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
    /// Token type (always "Bearer").
    pub token_type: String,
}

/// Signs and verifies tokens for one principal kind.
pub struct TokenIssuer<K> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    default_ttl: Duration,
    kind: PhantomData<K>,
}

impl<K> Clone for TokenIssuer<K> {
    fn clone(&self) -> Self {
        Self {
            encoding_key: self.encoding_key.clone(),
            decoding_key: self.decoding_key.clone(),
            algorithm: self.algorithm,
            default_ttl: self.default_ttl,
            kind: PhantomData,
        }
    }
}

impl<K: PrincipalKind> TokenIssuer<K> {
    /// Create an issuer from a raw secret.
    ///
    /// The secret should be at least 32 bytes.
    #[must_use]
    pub fn new(secret: &[u8], algorithm: SigningAlgorithm, default_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: to_jwt_algorithm(algorithm),
            default_ttl,
            kind: PhantomData,
        }
    }

    /// Create an issuer from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails.
    pub fn from_hex_secret(
        hex_secret: &str,
        algorithm: SigningAlgorithm,
        default_ttl: Duration,
    ) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret).map_err(|e| {
            AuthError::Config(format!("Invalid hex secret for {} tokens: {e}", K::MARKER))
        })?;
        Ok(Self::new(&secret, algorithm, default_ttl))
    }

    /// Default lifetime of tokens from this issuer.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `subject`.
    ///
    /// Falls back to the issuer's default lifetime when `ttl` is `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the lifetime overflows or encoding fails.
    pub fn issue(&self, subject: &K::Id, ttl: Option<Duration>) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl.unwrap_or(self.default_ttl))
            .map_err(|e| AuthError::Config(format!("Token lifetime out of range: {e}")))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Config("Token lifetime out of range".to_string()))?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            kind: K::MARKER.to_string(),
        };

        Ok(IssuedToken {
            access_token: self.encode_claims(&claims)?,
            expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenInvalid(format!("Encoding failed: {e}")))
    }

    /// Check signature and expiry and return the claims.
    ///
    /// A token whose `exp` is not strictly in the future is expired.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` for bad signatures or structure, `TokenExpired`
    /// once `exp` has passed.
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below with zero leeway so it maps to its own error kind.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?
            .claims;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Verify a token and return its parsed subject.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` or `TokenExpired` from [`Self::decode_claims`],
    /// and `InvalidSubjectFormat` if the token belongs to another principal
    /// kind or its subject doesn't parse as `K::Id`.
    pub fn verify(&self, token: &str) -> Result<K::Id, AuthError> {
        let claims = self.decode_claims(token)?;

        if claims.kind != K::MARKER {
            return Err(AuthError::InvalidSubjectFormat);
        }

        claims
            .sub
            .parse::<K::Id>()
            .map_err(|_| AuthError::InvalidSubjectFormat)
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }
}

impl<K: PrincipalKind> std::fmt::Debug for TokenIssuer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("kind", &K::MARKER)
            .field("algorithm", &self.algorithm)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

const fn to_jwt_algorithm(algorithm: SigningAlgorithm) -> Algorithm {
    match algorithm {
        SigningAlgorithm::HS256 => Algorithm::HS256,
        SigningAlgorithm::HS384 => Algorithm::HS384,
        SigningAlgorithm::HS512 => Algorithm::HS512,
    }
}

/// Extract token from Authorization header.
///
/// Expects format: "Bearer <token>"
#[must_use]
pub fn extract_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
