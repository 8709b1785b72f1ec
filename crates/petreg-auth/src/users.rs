//! User registration, login and account administration.

use petreg_core::{SortOrder, UserId, normalize_email, validate_password};
use serde::Deserialize;

use super::AuthError;
use super::jwt::IssuedToken;
use super::middleware::AuthState;
use super::models::{PublicUser, User};
use super::store::AuthStore;

/// Changes a user may make to their own account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelfUpdate {
    /// New email.
    pub email: Option<String>,
    /// New password. Requires `current_password`.
    pub password: Option<String>,
    /// Current password, checked whenever present.
    pub current_password: Option<String>,
}

/// Changes an administrator may make to any account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    /// New email.
    pub email: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New superuser flag.
    pub is_superuser: Option<bool>,
}

/// User registration, login and administration.
#[derive(Debug, Clone, Copy)]
pub struct UserManager<'a> {
    state: &'a AuthState,
}

impl<'a> UserManager<'a> {
    pub(crate) const fn new(state: &'a AuthState) -> Self {
        Self { state }
    }

    /// Self-service registration.
    ///
    /// The account joins the configured default group, which must already be seeded.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad email or password, `Conflict` if the
    /// email is taken, `Config` if the default group is missing.
    pub fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let group_name = &self.state.config.default_user_group;
        let group = self
            .state
            .store
            .get_group_by_name(group_name)?
            .ok_or_else(|| {
                AuthError::Config(format!(
                    "Group '{group_name}' not found; seed the catalog first"
                ))
            })?;

        let user = self.insert(email, password, false, Some(group.id))?;

        tracing::info!(user_id = %user.id, email = %user.email, "Registered user");
        Ok(user)
    }

    /// Administrative account creation.
    ///
    /// Joins the default group when it exists.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad email or password, `Conflict` if the email is taken.
    pub fn create(&self, email: &str, password: &str, superuser: bool) -> Result<User, AuthError> {
        let group = self
            .state
            .store
            .get_group_by_name(&self.state.config.default_user_group)?;
        let user = self.insert(email, password, superuser, group.map(|g| g.id))?;

        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            superuser,
            "Created user"
        );
        Ok(user)
    }

    fn insert(
        &self,
        email: &str,
        password: &str,
        superuser: bool,
        group_id: Option<u64>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let mut user = User::new(email, self.state.hasher.hash(password)?);
        user.is_superuser = superuser;
        match group_id {
            Some(group_id) => self.state.store.insert_user_in_group(&user, group_id)?,
            None => self.state.store.insert_user(&user)?,
        }
        Ok(user)
    }

    /// Exchange email and password for a user token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown, inactive or
    /// wrong-password account, without saying which.
    pub fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let user = normalize_email(email)
            .ok()
            .map(|email| self.state.store.get_user_by_email(&email))
            .transpose()?
            .flatten();

        let Some(user) = user.filter(|u| u.is_active) else {
            self.state.hasher.verify_decoy(password);
            tracing::warn!(email, "User login for unknown or inactive account");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.state.hasher.verify(password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "User login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.state.user_tokens.issue(&user.id, None)
    }

    /// All users ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied("superuser")` unless `requester` is a superuser.
    pub fn list(&self, requester: &User, order: SortOrder) -> Result<Vec<PublicUser>, AuthError> {
        self.state.permissions().require_superuser(requester)?;

        let mut users = self.state.store.list_users()?;
        users.sort_by_key(|u| u.created_at);
        if order == SortOrder::Desc {
            users.reverse();
        }

        Ok(users.iter().map(User::to_public).collect())
    }

    /// Look up a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown user.
    pub fn get(&self, id: UserId) -> Result<User, AuthError> {
        self.state
            .store
            .get_user(id)?
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))
    }

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed email, `NotFound` for an unknown one.
    pub fn get_by_email(&self, email: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        self.state
            .store
            .get_user_by_email(&email)?
            .ok_or_else(|| AuthError::NotFound(format!("user {email}")))
    }

    /// Apply a self-service update.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a new password comes without the current one,
    /// `InvalidCredentials` if the current password is wrong, `Conflict` if
    /// the new email is taken.
    pub fn update_self(&self, id: UserId, update: SelfUpdate) -> Result<User, AuthError> {
        let mut user = self.get(id)?;

        if update.password.is_some() && update.current_password.is_none() {
            return Err(AuthError::Validation(
                "Changing the password requires the current password".to_string(),
            ));
        }
        if let Some(current) = &update.current_password {
            if !self.state.hasher.verify(current, &user.password_hash) {
                tracing::warn!(user_id = %id, "Self update with wrong current password");
                return Err(AuthError::InvalidCredentials);
            }
        }

        self.apply_credentials(&mut user, update.email.as_deref(), update.password.as_deref())?;
        user.touch();
        self.state.store.update_user(&user)?;

        tracing::info!(user_id = %id, "User updated own account");
        Ok(user)
    }

    /// Apply an administrative patch.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown user, `Validation` for bad input,
    /// `Conflict` if the new email is taken.
    pub fn update_user(&self, id: UserId, patch: UserPatch) -> Result<User, AuthError> {
        let mut user = self.get(id)?;

        self.apply_credentials(&mut user, patch.email.as_deref(), patch.password.as_deref())?;
        if let Some(active) = patch.is_active {
            user.is_active = active;
        }
        if let Some(superuser) = patch.is_superuser {
            user.is_superuser = superuser;
        }
        user.touch();
        self.state.store.update_user(&user)?;

        tracing::info!(user_id = %id, "Updated user");
        Ok(user)
    }

    fn apply_credentials(
        &self,
        user: &mut User,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), AuthError> {
        if let Some(email) = email {
            user.email = normalize_email(email)?;
        }
        if let Some(password) = password {
            validate_password(password)?;
            user.password_hash = self.state.hasher.hash(password)?;
        }
        Ok(())
    }

    /// Deactivate an account. Its tokens stop resolving immediately.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if already inactive.
    pub fn deactivate(&self, id: UserId) -> Result<User, AuthError> {
        self.set_active(id, false)
    }

    /// Reactivate an account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if already active.
    pub fn reactivate(&self, id: UserId) -> Result<User, AuthError> {
        self.set_active(id, true)
    }

    fn set_active(&self, id: UserId, active: bool) -> Result<User, AuthError> {
        let mut user = self.get(id)?;
        if user.is_active == active {
            let current = if active { "active" } else { "inactive" };
            return Err(AuthError::InvalidState(format!("user {id} is already {current}")));
        }

        user.is_active = active;
        user.touch();
        self.state.store.update_user(&user)?;

        tracing::info!(user_id = %id, active, "Changed user status");
        Ok(user)
    }

    /// Remove a user with all memberships and direct grants.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown user.
    pub fn delete_permanently(&self, id: UserId) -> Result<(), AuthError> {
        if !self.state.store.delete_user(id)? {
            return Err(AuthError::NotFound(format!("user {id}")));
        }
        tracing::info!(user_id = %id, "Deleted user");
        Ok(())
    }
}
