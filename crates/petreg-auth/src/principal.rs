//! Turns a verified bearer token into a live principal.

use std::sync::Arc;

use super::AuthError;
use super::jwt::{ClientKind, TokenIssuer, UserKind};
use super::models::{Client, User};
use super::store::AuthStore;

/// Resolves tokens to active clients and users.
///
/// Read-only: never mutates the store or refreshes tokens.
#[derive(Clone)]
pub struct PrincipalResolver {
    client_tokens: TokenIssuer<ClientKind>,
    user_tokens: TokenIssuer<UserKind>,
    store: Arc<dyn AuthStore>,
}

impl PrincipalResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(
        client_tokens: TokenIssuer<ClientKind>,
        user_tokens: TokenIssuer<UserKind>,
        store: Arc<dyn AuthStore>,
    ) -> Self {
        Self {
            client_tokens,
            user_tokens,
            store,
        }
    }

    /// Resolve a client token.
    ///
    /// # Errors
    ///
    /// Token failures pass through unchanged. A missing or inactive client is
    /// `PrincipalNotFound`.
    pub fn resolve_client(&self, token: &str) -> Result<Client, AuthError> {
        let id = self.client_tokens.verify(token)?;

        self.store
            .get_client(id)?
            .filter(|c| c.is_active)
            .ok_or(AuthError::PrincipalNotFound)
    }

    /// Resolve a user token.
    ///
    /// # Errors
    ///
    /// Token failures pass through unchanged. A missing or inactive user is
    /// `PrincipalNotFound`.
    pub fn resolve_user(&self, token: &str) -> Result<User, AuthError> {
        let id = self.user_tokens.verify(token)?;

        self.store
            .get_user(id)?
            .filter(|u| u.is_active)
            .ok_or(AuthError::PrincipalNotFound)
    }
}

impl std::fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalResolver")
            .field("client_tokens", &self.client_tokens)
            .field("user_tokens", &self.user_tokens)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::SledAuthStore;
    use crate::testing;
    use petreg_core::{ClientId, SigningAlgorithm, UserId};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<SledAuthStore>, PrincipalResolver) {
        let (dir, store) = testing::store();
        let ttl = Duration::from_secs(600);
        let resolver = PrincipalResolver::new(
            TokenIssuer::new(
                &TokenIssuer::<ClientKind>::generate_secret(),
                SigningAlgorithm::HS256,
                ttl,
            ),
            TokenIssuer::new(
                &TokenIssuer::<UserKind>::generate_secret(),
                SigningAlgorithm::HS256,
                ttl,
            ),
            store.clone(),
        );
        (dir, store, resolver)
    }

    #[test]
    fn test_resolve_active_user() {
        let (_dir, store, resolver) = setup();
        let user = User::new("a@example.com", "hash".to_string());
        store.insert_user(&user).unwrap();

        let token = resolver.user_tokens.issue(&user.id, None).unwrap();
        let resolved = resolver.resolve_user(&token.access_token).unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[test]
    fn test_deactivated_user_not_found() {
        let (_dir, store, resolver) = setup();
        let mut user = User::new("a@example.com", "hash".to_string());
        store.insert_user(&user).unwrap();
        let token = resolver.user_tokens.issue(&user.id, None).unwrap();

        user.is_active = false;
        store.update_user(&user).unwrap();

        assert!(matches!(
            resolver.resolve_user(&token.access_token),
            Err(AuthError::PrincipalNotFound)
        ));
    }

    #[test]
    fn test_unknown_user_not_found() {
        let (_dir, _store, resolver) = setup();
        let token = resolver.user_tokens.issue(&UserId::generate(), None).unwrap();

        assert!(matches!(
            resolver.resolve_user(&token.access_token),
            Err(AuthError::PrincipalNotFound)
        ));
    }

    #[test]
    fn test_resolve_client() {
        let (_dir, store, resolver) = setup();
        let mut client = Client::new(store.next_client_id().unwrap(), "pub", "h".to_string());
        store.insert_client(&client).unwrap();

        let token = resolver.client_tokens.issue(&client.id, None).unwrap();
        assert_eq!(
            resolver.resolve_client(&token.access_token).unwrap().id,
            client.id
        );

        client.is_active = false;
        store.update_client(&client).unwrap();
        assert!(matches!(
            resolver.resolve_client(&token.access_token),
            Err(AuthError::PrincipalNotFound)
        ));

        let ghost = resolver.client_tokens.issue(&ClientId::new(9999), None).unwrap();
        assert!(matches!(
            resolver.resolve_client(&ghost.access_token),
            Err(AuthError::PrincipalNotFound)
        ));
    }

    #[test]
    fn test_token_kinds_not_interchangeable() {
        let (_dir, store, resolver) = setup();
        let user = User::new("a@example.com", "hash".to_string());
        store.insert_user(&user).unwrap();
        let client = Client::new(store.next_client_id().unwrap(), "pub", "h".to_string());
        store.insert_client(&client).unwrap();

        let user_token = resolver.user_tokens.issue(&user.id, None).unwrap();
        let client_token = resolver.client_tokens.issue(&client.id, None).unwrap();

        assert!(resolver.resolve_client(&user_token.access_token).is_err());
        assert!(resolver.resolve_user(&client_token.access_token).is_err());
    }

    #[test]
    fn test_expired_token_passes_through() {
        let (_dir, store, resolver) = setup();
        let user = User::new("a@example.com", "hash".to_string());
        store.insert_user(&user).unwrap();
        let token = resolver
            .user_tokens
            .issue(&user.id, Some(Duration::ZERO))
            .unwrap();

        let err = resolver.resolve_user(&token.access_token).unwrap_err();
        assert!(err.requires_reauthentication());
    }
}
