//! Principals and permission-grant entities.

use chrono::{DateTime, Utc};
use petreg_core::{ClientId, UserId};
use serde::{Deserialize, Serialize};

/// An API-consuming application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Integer ID, used as the token subject.
    pub id: ClientId,
    /// Public client identifier presented at login.
    pub client_id: String,
    /// Argon2 hash of the client secret.
    pub client_secret_hash: String,
    /// Whether the client may authenticate.
    pub is_active: bool,
    /// When the client was created.
    pub created_at: DateTime<Utc>,
    /// When the client was last modified.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Client {
    /// Create an active client.
    #[must_use]
    pub fn new(id: ClientId, client_id: impl Into<String>, client_secret_hash: String) -> Self {
        Self {
            id,
            client_id: client_id.into(),
            client_secret_hash,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Stamp the modification time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// An end-user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Normalized email address, unique.
    pub email: String,
    /// Argon2 password hash (never exposed in public API).
    pub password_hash: String,
    /// Whether the account may authenticate.
    pub is_active: bool,
    /// Bypasses every permission check.
    pub is_superuser: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last modified.
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create an active, non-superuser account.
    #[must_use]
    pub fn new(email: impl Into<String>, password_hash: String) -> Self {
        Self {
            id: UserId::generate(),
            email: email.into(),
            password_hash,
            is_active: true,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Stamp the modification time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// Create a safe version of user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            is_active: self.is_active,
            is_superuser: self.is_superuser,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user ID.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Whether active.
    pub is_active: bool,
    /// Whether superuser.
    pub is_superuser: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGroup {
    /// Group ID.
    pub id: u64,
    /// Unique group name.
    pub name: String,
}

/// A single grantable capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPermission {
    /// Permission ID.
    pub id: u64,
    /// Human-readable name.
    pub name: String,
    /// Globally unique codename checked at authorization time.
    pub codename: String,
    /// Descriptive classification.
    pub content_type_id: u64,
}

/// Classification of a permission by app label and model.
///
/// Organizational only; authorization never consults it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContentType {
    /// Content type ID.
    pub id: u64,
    /// Domain area, e.g. `pet`.
    pub app_label: String,
    /// Model or action, e.g. `add_pet`.
    pub model: String,
}
