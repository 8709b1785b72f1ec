//! Permission resolution over direct and group grants.

use std::sync::Arc;

use super::AuthError;
use super::models::User;
use super::store::AuthStore;

/// What a user-gated operation demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Any active user.
    Authenticated,
    /// A user holding the codename (superusers always pass).
    Permission(String),
    /// Superusers only, regardless of grants.
    Superuser,
    /// Superuser, or a user holding the codename.
    PermissionOrSuperuser(String),
}

impl Requirement {
    /// Require a codename.
    #[must_use]
    pub fn permission(codename: impl Into<String>) -> Self {
        Self::Permission(codename.into())
    }
}

/// Decides whether a user holds a capability.
///
/// Holds no state of its own; each check reads grants from the store.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn AuthStore>,
}

impl PermissionResolver {
    /// Create a resolver over a store.
    #[must_use]
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    /// Whether `user` holds `codename`.
    ///
    /// Superusers hold everything, including codenames absent from the
    /// catalog. Otherwise the user's direct grants and the grants of every
    /// group they belong to are unioned.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub fn has_permission(&self, user: &User, codename: &str) -> Result<bool, AuthError> {
        if user.is_superuser {
            return Ok(true);
        }

        if self
            .store
            .direct_permission_codenames(user.id)?
            .iter()
            .any(|c| c == codename)
        {
            return Ok(true);
        }

        for group_id in self.store.group_ids_for_user(user.id)? {
            if self
                .store
                .group_permission_codenames(group_id)?
                .iter()
                .any(|c| c == codename)
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Fail unless `user` holds `codename`.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` carrying the codename.
    pub fn require_permission(&self, user: &User, codename: &str) -> Result<(), AuthError> {
        if self.has_permission(user, codename)? {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(codename.to_string()))
        }
    }

    /// Fail unless `user` is a superuser.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied("superuser")`.
    pub fn require_superuser(&self, user: &User) -> Result<(), AuthError> {
        if user.is_superuser {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied("superuser".to_string()))
        }
    }

    /// Same outcome as [`Self::require_permission`], spelled out for call sites
    /// where the superuser bypass is the point.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` carrying the codename.
    pub fn require_permission_or_superuser(
        &self,
        user: &User,
        codename: &str,
    ) -> Result<(), AuthError> {
        if user.is_superuser {
            return Ok(());
        }
        self.require_permission(user, codename)
    }

    /// Evaluate a requirement against `user`.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the requirement isn't met.
    pub fn check(&self, user: &User, requirement: &Requirement) -> Result<(), AuthError> {
        match requirement {
            Requirement::Authenticated => Ok(()),
            Requirement::Permission(codename) => self.require_permission(user, codename),
            Requirement::Superuser => self.require_superuser(user),
            Requirement::PermissionOrSuperuser(codename) => {
                self.require_permission_or_superuser(user, codename)
            }
        }
    }
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledAuthStore;
    use petreg_core::UserId;
    use crate::testing;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<SledAuthStore>,
        resolver: PermissionResolver,
    }

    impl Fixture {
        fn new() -> Self {
            let (dir, store) = testing::store();
            let resolver = PermissionResolver::new(store.clone());
            Self {
                _dir: dir,
                store,
                resolver,
            }
        }

        fn user(&self, superuser: bool) -> User {
            let mut user = User::new(
                format!("{}@example.com", UserId::generate()),
                "hash".to_string(),
            );
            user.is_superuser = superuser;
            self.store.insert_user(&user).unwrap();
            user
        }

        fn permission(&self, codename: &str) -> u64 {
            let (ct, _) = self
                .store
                .get_or_create_content_type("pet", codename)
                .unwrap();
            self.store
                .create_permission(codename, &format!("Can {codename}"), ct.id)
                .unwrap()
                .id
        }
    }

    #[test]
    fn test_superuser_holds_everything() {
        let fx = Fixture::new();
        let admin = fx.user(true);

        assert!(fx.resolver.has_permission(&admin, "delete_pet").unwrap());
        assert!(fx.resolver.has_permission(&admin, "not_in_catalog").unwrap());
        assert!(fx.resolver.require_superuser(&admin).is_ok());
    }

    #[test]
    fn test_default_deny() {
        let fx = Fixture::new();
        let user = fx.user(false);
        fx.permission("add_pet");

        assert!(!fx.resolver.has_permission(&user, "add_pet").unwrap());
        assert!(matches!(
            fx.resolver.require_permission(&user, "add_pet"),
            Err(AuthError::PermissionDenied(c)) if c == "add_pet"
        ));
    }

    #[test]
    fn test_group_grant() {
        let fx = Fixture::new();
        let user = fx.user(false);
        let list = fx.permission("list_pets");
        let group = fx.store.create_group("user").unwrap();
        fx.store.grant_group_permission(group.id, list).unwrap();
        fx.store.add_user_to_group(user.id, group.id).unwrap();

        assert!(fx.resolver.has_permission(&user, "list_pets").unwrap());
        assert!(!fx.resolver.has_permission(&user, "delete_pet").unwrap());
    }

    #[test]
    fn test_union_of_direct_and_groups() {
        let fx = Fixture::new();
        let user = fx.user(false);
        let a = fx.permission("add_pet");
        let b = fx.permission("list_pets");
        let c = fx.permission("delete_pet");

        let g1 = fx.store.create_group("g1").unwrap();
        let g2 = fx.store.create_group("g2").unwrap();
        fx.store.grant_group_permission(g1.id, a).unwrap();
        fx.store.grant_group_permission(g2.id, b).unwrap();
        fx.store.add_user_to_group(user.id, g1.id).unwrap();
        fx.store.add_user_to_group(user.id, g2.id).unwrap();
        fx.store.grant_user_permission(user.id, c).unwrap();

        for codename in ["add_pet", "list_pets", "delete_pet"] {
            assert!(fx.resolver.has_permission(&user, codename).unwrap());
        }
    }

    #[test]
    fn test_direct_grant_is_immediate() {
        let fx = Fixture::new();
        let user = fx.user(false);
        let delete = fx.permission("delete_pet");

        assert!(!fx.resolver.has_permission(&user, "delete_pet").unwrap());
        fx.store.grant_user_permission(user.id, delete).unwrap();
        assert!(fx.resolver.has_permission(&user, "delete_pet").unwrap());
        fx.store.revoke_user_permission(user.id, delete).unwrap();
        assert!(!fx.resolver.has_permission(&user, "delete_pet").unwrap());
    }

    #[test]
    fn test_superuser_requirement_ignores_grants() {
        let fx = Fixture::new();
        let user = fx.user(false);
        let perm = fx.permission("superuser");
        fx.store.grant_user_permission(user.id, perm).unwrap();

        assert!(matches!(
            fx.resolver.require_superuser(&user),
            Err(AuthError::PermissionDenied(c)) if c == "superuser"
        ));
    }

    #[test]
    fn test_check_requirements() {
        let fx = Fixture::new();
        let user = fx.user(false);
        let admin = fx.user(true);
        let add = fx.permission("add_pet");
        fx.store.grant_user_permission(user.id, add).unwrap();

        let r = &fx.resolver;
        assert!(r.check(&user, &Requirement::Authenticated).is_ok());
        assert!(r.check(&user, &Requirement::permission("add_pet")).is_ok());
        assert!(r.check(&user, &Requirement::permission("list_pets")).is_err());
        assert!(r.check(&user, &Requirement::Superuser).is_err());
        assert!(
            r.check(&user, &Requirement::PermissionOrSuperuser("add_pet".into()))
                .is_ok()
        );
        assert!(
            r.check(&admin, &Requirement::PermissionOrSuperuser("anything".into()))
                .is_ok()
        );
        assert!(r.check(&admin, &Requirement::Superuser).is_ok());
    }
}
