//! Permission check.

use super::Context;
use crate::ui;

/// Print whether a user holds a permission.
///
/// # Errors
///
/// Returns error if the user doesn't exist or storage fails.
pub fn run_check(ctx: &Context, email: &str, codename: &str) -> anyhow::Result<()> {
    let state = ctx.open()?;
    let user = state.users().get_by_email(email)?;

    ui::kv("user", &user.email);
    ui::kv("active", if user.is_active { "yes" } else { "no" });
    ui::kv("superuser", if user.is_superuser { "yes" } else { "no" });

    let groups = state.store.user_groups(user.id)?;
    let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
    ui::kv("groups", &names.join(", "));

    if state.permissions().has_permission(&user, codename)? {
        ui::success(&format!("'{}' holds '{codename}'", user.email));
    } else {
        ui::error(&format!("'{}' lacks '{codename}'", user.email));
    }

    Ok(())
}
