//! # petreg auth
//!
//! Authentication and permission-group authorization for the pet registry.
//!
//! This crate provides:
//! - Argon2 credential hashing for client secrets and user passwords
//! - Independent JWT issuers for client and user principals
//! - Principal resolution (token to live, active entity)
//! - Permission resolution (superuser, direct grants, group grants)
//! - A request-time guard plus axum extractors built on it
//! - Client, user and grant administration, and catalog seeding

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Client registration, secret rotation and client login.
pub mod clients;
mod guard;
mod jwt;
mod middleware;
/// Entity types.
pub mod models;
mod password;
mod permissions;
mod principal;
/// Catalog seeding and first-run bootstrap.
pub mod setup;
/// Persistence of principals and grants.
pub mod store;
/// User registration, login and administration.
pub mod users;

pub use guard::AuthGuard;
pub use jwt::{
    Claims, ClientKind, IssuedToken, PrincipalKind, TokenIssuer, UserKind, extract_from_header,
};
pub use middleware::{AuthState, CurrentClient, CurrentUser, RequireSuperuser};
pub use models::{AuthContentType, AuthGroup, AuthPermission, Client, PublicUser, User};
pub use password::CredentialHasher;
pub use permissions::{PermissionResolver, Requirement};
pub use principal::PrincipalResolver;
pub use store::{AuthStore, SledAuthStore};

use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token signature or structure is malformed.
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    /// Token signature is valid but it has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token subject doesn't match the identifier type of this principal kind.
    #[error("Token subject has the wrong format for this principal kind")]
    InvalidSubjectFormat,

    /// No active principal matches the token subject.
    #[error("Principal not found or inactive")]
    PrincipalNotFound,

    /// Principal lacks the required capability. Carries the missing codename.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Login identifier or secret is wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Credentials are correct but the principal is deactivated.
    #[error("Principal is inactive")]
    PrincipalInactive,

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violated.
    #[error("Already exists: {0}")]
    Conflict(String),

    /// Operation not allowed in the entity's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Input rejected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether the caller should obtain a fresh token and retry.
    ///
    /// Only expiry qualifies; every other failure is a final rejection.
    #[must_use]
    pub const fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Whether this is a failure to establish who the caller is.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalid(_)
                | Self::TokenExpired
                | Self::InvalidSubjectFormat
                | Self::PrincipalNotFound
        )
    }
}

impl From<petreg_core::ValidationError> for AuthError {
    fn from(e: petreg_core::ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for unit tests.

    use std::sync::Arc;

    use petreg_core::{AuthConfig, HashingConfig};
    use tempfile::TempDir;

    use super::{AuthState, CredentialHasher, SledAuthStore};

    /// Cheap Argon2 parameters so tests don't spend seconds hashing.
    pub fn fast_hashing() -> HashingConfig {
        HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    pub fn hasher() -> CredentialHasher {
        CredentialHasher::new(&fast_hashing()).unwrap()
    }

    pub fn store() -> (TempDir, Arc<SledAuthStore>) {
        let dir = TempDir::new().unwrap();
        let store = SledAuthStore::open(dir.path()).unwrap();
        (dir, Arc::new(store))
    }

    pub fn state() -> (TempDir, Arc<AuthState>) {
        let (dir, store) = store();
        let config = AuthConfig::builder().hashing(fast_hashing()).build();
        let state = AuthState::new(config, store).unwrap();
        (dir, Arc::new(state))
    }
}
