//! User management commands.

use petreg_core::SortOrder;

use super::Context;
use crate::ui;

/// User actions.
pub enum UserAction {
    /// Create a user.
    Create {
        email: String,
        password: String,
        superuser: bool,
    },
    /// List all users.
    List { order: String },
    /// Enable or disable a user.
    SetActive { email: String, active: bool },
    /// Delete a user permanently.
    Delete { email: String },
}

/// Run a user command.
///
/// # Errors
///
/// Returns error if the operation fails.
pub fn run_user(ctx: &Context, action: UserAction) -> anyhow::Result<()> {
    let state = ctx.open()?;
    let users = state.users();

    match action {
        UserAction::Create {
            email,
            password,
            superuser,
        } => {
            let user = users.create(&email, &password, superuser)?;
            let kind = if superuser { "superuser" } else { "user" };
            ui::success(&format!("Created {kind} '{}' ({})", user.email, user.id));
        }
        UserAction::List { order } => {
            let order: SortOrder = order
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid order: {order}. Use: asc or desc"))?;

            let mut all = state.store.list_users()?;
            all.sort_by_key(|u| u.created_at);
            if order == SortOrder::Desc {
                all.reverse();
            }

            if all.is_empty() {
                ui::info("No users configured.");
                ui::info("Run 'petreg user create --email <email> --superuser' to add one.");
                return Ok(());
            }

            ui::info(&format!("Users ({}):", all.len()));
            println!();
            println!(
                "{:<32} {:<10} {:<8} {:<24}",
                "EMAIL", "SUPERUSER", "ACTIVE", "CREATED"
            );
            println!("{}", "-".repeat(76));
            for user in all {
                let created = user.created_at.format("%Y-%m-%d %H:%M:%S");
                let superuser = if user.is_superuser { "yes" } else { "no" };
                let active = if user.is_active { "yes" } else { "no" };
                println!(
                    "{:<32} {:<10} {:<8} {:<24}",
                    user.email, superuser, active, created
                );
            }
        }
        UserAction::SetActive { email, active } => {
            let user = users.get_by_email(&email)?;
            if active {
                users.reactivate(user.id)?;
            } else {
                users.deactivate(user.id)?;
            }
            let status = if active { "enabled" } else { "disabled" };
            ui::success(&format!("User '{}' {status}", user.email));
        }
        UserAction::Delete { email } => {
            let user = users.get_by_email(&email)?;

            if user.is_superuser {
                let remaining = state
                    .store
                    .list_users()?
                    .iter()
                    .filter(|u| u.is_superuser && u.is_active && u.id != user.id)
                    .count();
                if remaining == 0 {
                    anyhow::bail!("Cannot delete the last active superuser");
                }
            }

            users.delete_permanently(user.id)?;
            ui::success(&format!("Deleted user '{}'", user.email));
        }
    }

    Ok(())
}
