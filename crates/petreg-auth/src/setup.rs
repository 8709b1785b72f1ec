//! Catalog seeding and first-superuser bootstrap.

use petreg_core::catalog::{default_catalog, default_group_grants};
use serde::Serialize;

use super::AuthError;
use super::middleware::AuthState;
use super::models::User;
use super::store::SledAuthStore;

/// Env var naming the first superuser's email.
pub const ADMIN_EMAIL_ENV: &str = "PETREG_ADMIN_EMAIL";

/// Env var holding the first superuser's password.
pub const ADMIN_PASSWORD_ENV: &str = "PETREG_ADMIN_PASSWORD";

/// What a seeding run created and what was already there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Groups created.
    pub groups_created: usize,
    /// Groups already present.
    pub groups_existing: usize,
    /// Content types created.
    pub content_types_created: usize,
    /// Permissions created.
    pub permissions_created: usize,
    /// Permissions already present.
    pub permissions_existing: usize,
    /// Group grants added.
    pub grants_created: usize,
}

impl SeedReport {
    /// Whether the run changed anything.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.groups_created == 0
            && self.content_types_created == 0
            && self.permissions_created == 0
            && self.grants_created == 0
    }
}

/// Bring the store up to the default catalog: groups, content types,
/// permissions and the default group grants.
///
/// Safe to rerun; existing entries are left untouched.
///
/// # Errors
///
/// Returns error if storage fails.
pub fn seed_catalog(store: &SledAuthStore) -> Result<SeedReport, AuthError> {
    let mut report = SeedReport::default();

    for entry in default_catalog() {
        let (content_type, created) =
            store.get_or_create_content_type(&entry.app_label, &entry.codename)?;
        if created {
            report.content_types_created += 1;
        }

        if store.get_permission_by_codename(&entry.codename)?.is_some() {
            report.permissions_existing += 1;
        } else {
            store.create_permission(&entry.codename, &entry.display_name(), content_type.id)?;
            report.permissions_created += 1;
        }
    }

    for (name, codenames) in default_group_grants() {
        let group = if let Some(group) = store.get_group_by_name(name)? {
            report.groups_existing += 1;
            group
        } else {
            report.groups_created += 1;
            store.create_group(name)?
        };

        for codename in codenames {
            let permission = store.get_permission_by_codename(&codename)?.ok_or_else(|| {
                AuthError::Config(format!("Grant for {name} names unknown permission {codename}"))
            })?;
            if store.grant_group_permission(group.id, permission.id)? {
                report.grants_created += 1;
            }
        }
    }

    if report.is_noop() {
        tracing::debug!("Permission catalog already seeded");
    } else {
        tracing::info!(
            groups = report.groups_created,
            permissions = report.permissions_created,
            grants = report.grants_created,
            "Seeded permission catalog"
        );
    }

    Ok(report)
}

/// Create the first superuser from `PETREG_ADMIN_EMAIL` and
/// `PETREG_ADMIN_PASSWORD` when the store has no users yet.
///
/// Returns `None` when users already exist or either variable is unset.
///
/// # Errors
///
/// Returns error if the credentials are rejected or storage fails.
pub fn bootstrap_superuser_from_env(state: &AuthState) -> Result<Option<User>, AuthError> {
    let email = std::env::var(ADMIN_EMAIL_ENV).ok();
    let password = std::env::var(ADMIN_PASSWORD_ENV).ok();
    bootstrap_superuser(state, email.as_deref(), password.as_deref())
}

fn bootstrap_superuser(
    state: &AuthState,
    email: Option<&str>,
    password: Option<&str>,
) -> Result<Option<User>, AuthError> {
    if state.store.has_users()? {
        return Ok(None);
    }

    let (Some(email), Some(password)) = (email, password) else {
        tracing::warn!(
            "No users exist; set {ADMIN_EMAIL_ENV} and {ADMIN_PASSWORD_ENV} to create a superuser"
        );
        return Ok(None);
    };

    let user = state.users().create(email, password, true)?;
    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrapped superuser");
    Ok(Some(user))
}
