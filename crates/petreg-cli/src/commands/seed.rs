//! Catalog seeding and superuser bootstrap.

use petreg_auth::setup::{bootstrap_superuser_from_env, seed_catalog};

use super::Context;
use crate::ui;

/// Run the seed command.
///
/// # Errors
///
/// Returns error if seeding or bootstrap fails.
pub fn run_seed(ctx: &Context) -> anyhow::Result<()> {
    let state = ctx.open()?;

    let report = seed_catalog(&state.store)?;
    if report.is_noop() {
        ui::info("Catalog already up to date.");
    } else {
        ui::success(&format!(
            "Seeded {} group(s), {} permission(s), {} grant(s)",
            report.groups_created, report.permissions_created, report.grants_created
        ));
    }

    if let Some(admin) = bootstrap_superuser_from_env(&state)? {
        ui::success(&format!("Created superuser '{}'", admin.email));
    } else if !state.store.has_users()? {
        ui::warning("No users exist yet. Run 'petreg user create --superuser' to add one.");
    }

    Ok(())
}
