//! Permission grants and group membership.

use anyhow::Context as _;
use petreg_auth::{AuthGroup, AuthPermission, SledAuthStore};

use super::Context;
use crate::ui;

/// Grant and membership actions.
pub enum GrantAction {
    /// Grant a permission to a group.
    GrantGroup { group: String, codename: String },
    /// Grant a permission directly to a user.
    GrantUser { email: String, codename: String },
    /// Revoke a direct user permission.
    RevokeUser { email: String, codename: String },
    /// Add a user to a group.
    AddMember { email: String, group: String },
    /// Remove a user from a group.
    RemoveMember { email: String, group: String },
}

/// Run a grant command.
///
/// # Errors
///
/// Returns error if a named user, group or permission doesn't exist, or storage fails.
pub fn run_grant(ctx: &Context, action: GrantAction) -> anyhow::Result<()> {
    let state = ctx.open()?;
    let store = &state.store;

    match action {
        GrantAction::GrantGroup { group, codename } => {
            let group = find_group(store, &group)?;
            let permission = find_permission(store, &codename)?;
            report(
                store.grant_group_permission(group.id, permission.id)?,
                &format!("Granted '{codename}' to group '{}'", group.name),
                &format!("Group '{}' already holds '{codename}'", group.name),
            );
        }
        GrantAction::GrantUser { email, codename } => {
            let user = state.users().get_by_email(&email)?;
            let permission = find_permission(store, &codename)?;
            report(
                store.grant_user_permission(user.id, permission.id)?,
                &format!("Granted '{codename}' to '{}'", user.email),
                &format!("'{}' already holds '{codename}' directly", user.email),
            );
        }
        GrantAction::RevokeUser { email, codename } => {
            let user = state.users().get_by_email(&email)?;
            let permission = find_permission(store, &codename)?;
            report(
                store.revoke_user_permission(user.id, permission.id)?,
                &format!("Revoked '{codename}' from '{}'", user.email),
                &format!("'{}' held no direct '{codename}' grant", user.email),
            );
            if state.permissions().has_permission(&user, &codename)? {
                ui::warning("The user still holds this permission through a group or superuser status.");
            }
        }
        GrantAction::AddMember { email, group } => {
            let user = state.users().get_by_email(&email)?;
            let group = find_group(store, &group)?;
            report(
                store.add_user_to_group(user.id, group.id)?,
                &format!("Added '{}' to group '{}'", user.email, group.name),
                &format!("'{}' is already in group '{}'", user.email, group.name),
            );
        }
        GrantAction::RemoveMember { email, group } => {
            let user = state.users().get_by_email(&email)?;
            let group = find_group(store, &group)?;
            report(
                store.remove_user_from_group(user.id, group.id)?,
                &format!("Removed '{}' from group '{}'", user.email, group.name),
                &format!("'{}' was not in group '{}'", user.email, group.name),
            );
        }
    }

    Ok(())
}

fn find_group(store: &SledAuthStore, name: &str) -> anyhow::Result<AuthGroup> {
    store
        .get_group_by_name(name)?
        .with_context(|| format!("Group not found: {name}. Run 'petreg seed' first?"))
}

fn find_permission(store: &SledAuthStore, codename: &str) -> anyhow::Result<AuthPermission> {
    store
        .get_permission_by_codename(codename)?
        .with_context(|| format!("Permission not found: {codename}"))
}

fn report(changed: bool, done: &str, unchanged: &str) {
    if changed {
        ui::success(done);
    } else {
        ui::info(unchanged);
    }
}
