//! Credential hashing for client secrets and user passwords.

use std::sync::OnceLock;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use petreg_core::HashingConfig;

use super::AuthError;

/// One-way Argon2id hasher.
///
/// Hashes are PHC strings embedding algorithm, parameters and salt, so
/// verification works across cost changes without extra storage.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: OnceLock<String>,
}

/// Plaintext behind the decoy hash.
const DECOY_PLAINTEXT: &str = "petreg-decoy-credential";

impl CredentialHasher {
    /// Create a hasher with the given cost parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the parameters are out of Argon2's accepted range.
    pub fn new(cost: &HashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AuthError::Config(format!("Invalid hashing parameters: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: OnceLock::new(),
        })
    }

    /// Hash a plaintext secret.
    ///
    /// # Errors
    ///
    /// Returns error if hashing fails.
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Config(format!("Hashing failed: {e}")))
    }

    /// Verify a plaintext secret against a stored hash.
    ///
    /// Malformed hashes verify as `false`. The digest comparison is constant-time.
    #[must_use]
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Run a verification against a decoy hash made with this hasher's cost.
    ///
    /// Login paths call this when no account matches, keeping a miss as
    /// slow as a wrong secret.
    pub fn verify_decoy(&self, plaintext: &str) {
        let decoy = self
            .decoy
            .get_or_init(|| self.hash(DECOY_PLAINTEXT).unwrap_or_default());
        std::hint::black_box(self.verify(plaintext, decoy));
    }

    #[cfg(test)]
    pub(crate) fn decoy_hash(&self) -> Option<&str> {
        self.decoy.get().map(String::as_str)
    }
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
            decoy: OnceLock::new(),
        }
    }
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_hash_and_verify() {
        let hasher = testing::hasher();
        let hash = hasher.hash("password123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("password123", &hash));
        assert!(!hasher.verify("wrongpassword", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = testing::hasher();
        let a = hasher.hash("same-secret").unwrap();
        let b = hasher.hash("same-secret").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify("same-secret", &a));
        assert!(hasher.verify("same-secret", &b));
    }

    #[test]
    fn test_malformed_hash_is_false() {
        let hasher = testing::hasher();
        assert!(!hasher.verify("anything", "not-a-phc-string"));
        assert!(!hasher.verify("anything", ""));
        assert!(!hasher.verify("anything", "$2b$12$bcryptlookingbutnotparsable"));
    }

    #[test]
    fn test_verify_across_cost_change() {
        let cheap = testing::hasher();
        let hash = cheap.hash("rotate-me").unwrap();

        let costlier = CredentialHasher::new(&HashingConfig {
            memory_kib: 2048,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        assert!(costlier.verify("rotate-me", &hash));
    }

    #[test]
    fn test_decoy_hash_is_real_argon2() {
        let hasher = testing::hasher();
        assert!(hasher.decoy_hash().is_none());

        hasher.verify_decoy("anything");
        let decoy = hasher.decoy_hash().unwrap();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(hasher.verify(DECOY_PLAINTEXT, decoy));
        assert!(!hasher.verify("anything", decoy));
    }

    #[test]
    fn test_invalid_params() {
        let result = CredentialHasher::new(&HashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(matches!(result, Err(AuthError::Config(_))));
    }
}
