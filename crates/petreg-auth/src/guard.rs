//! Request-time authorization gate.

use super::AuthError;
use super::models::{Client, User};
use super::permissions::{PermissionResolver, Requirement};
use super::principal::PrincipalResolver;

/// Combines principal and permission resolution into one check per request.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    principals: PrincipalResolver,
    permissions: PermissionResolver,
}

impl AuthGuard {
    /// Create a guard.
    #[must_use]
    pub const fn new(principals: PrincipalResolver, permissions: PermissionResolver) -> Self {
        Self {
            principals,
            permissions,
        }
    }

    /// Principal resolver used by this guard.
    #[must_use]
    pub const fn principals(&self) -> &PrincipalResolver {
        &self.principals
    }

    /// Permission resolver used by this guard.
    #[must_use]
    pub const fn permissions(&self) -> &PermissionResolver {
        &self.permissions
    }

    /// Admit an active client.
    ///
    /// # Errors
    ///
    /// Returns the token or resolution failure.
    pub fn authorize_client(&self, token: &str) -> Result<Client, AuthError> {
        self.principals.resolve_client(token).inspect_err(|e| {
            tracing::debug!(error = %e, "Client authorization failed");
        })
    }

    /// Admit an active user meeting `requirement`.
    ///
    /// # Errors
    ///
    /// Returns the token or resolution failure, or `PermissionDenied`.
    pub fn authorize_user(&self, token: &str, requirement: &Requirement) -> Result<User, AuthError> {
        let user = self.principals.resolve_user(token).inspect_err(|e| {
            tracing::debug!(error = %e, "User authorization failed");
        })?;

        if let Err(e) = self.permissions.check(&user, requirement) {
            if let AuthError::PermissionDenied(codename) = &e {
                tracing::debug!(user_id = %user.id, codename = %codename, "Permission denied");
            }
            return Err(e);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_authorize_user_requirements() {
        let (_dir, state) = testing::state();
        let user = state.users().create("a@example.com", "password123", false).unwrap();
        let admin = state.users().create("root@example.com", "password123", true).unwrap();

        let token = state.user_tokens.issue(&user.id, None).unwrap().access_token;
        let admin_token = state.user_tokens.issue(&admin.id, None).unwrap().access_token;
        let guard = &state.guard;

        assert!(guard.authorize_user(&token, &Requirement::Authenticated).is_ok());
        assert!(matches!(
            guard.authorize_user(&token, &Requirement::permission("delete_pet")),
            Err(AuthError::PermissionDenied(_))
        ));
        assert!(matches!(
            guard.authorize_user(&token, &Requirement::Superuser),
            Err(AuthError::PermissionDenied(_))
        ));
        assert!(
            guard
                .authorize_user(&admin_token, &Requirement::permission("uncatalogued_thing"))
                .is_ok()
        );
    }

    #[test]
    fn test_authorize_client() {
        let (_dir, state) = testing::state();
        let issued = state.clients().create().unwrap();
        let token = state
            .clients()
            .login(&issued.client_id, issued.client_secret.expose(), None)
            .unwrap();

        let client = state.guard.authorize_client(&token.access_token).unwrap();
        assert_eq!(client.client_id, issued.client_id);

        assert!(matches!(
            state.guard.authorize_client("garbage"),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn test_user_token_rejected_at_client_gate() {
        let (_dir, state) = testing::state();
        let user = state.users().create("a@example.com", "password123", false).unwrap();
        let token = state.user_tokens.issue(&user.id, None).unwrap().access_token;

        assert!(state.guard.authorize_client(&token).is_err());
    }
}
