//! Plaintext secret handling.
//!
//! - `PlainSecret`: wrapper that prevents accidental logging
//! - `generate_token_hex`: random identifiers and secrets

use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use zeroize::Zeroize;

/// Plaintext secret wrapper that prevents accidental logging.
///
/// Used for freshly issued client secrets, which are shown exactly once
/// and never persisted in clear.
#[derive(Clone)]
pub struct PlainSecret(SecretBox<str>);

impl PlainSecret {
    /// Wrap a plaintext secret.
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(SecretBox::new(secret.into_boxed_str()))
    }

    /// Generate a random secret of `bytes` random bytes, hex-encoded.
    #[must_use]
    pub fn generate(bytes: usize) -> Self {
        Self::new(generate_token_hex(bytes))
    }

    /// Expose the secret.
    ///
    /// Use sparingly - only to hash it or hand it to the operator.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for PlainSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PlainSecret([REDACTED])")
    }
}

impl std::fmt::Display for PlainSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Generate `bytes` random bytes and hex-encode them.
#[must_use]
pub fn generate_token_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    let encoded = hex::encode(&buf);
    buf.zeroize();
    encoded
}
