//! API client management commands.

use petreg_core::config::days_to_duration;

use super::Context;
use crate::ui;

/// Client actions.
pub enum ClientAction {
    /// Create a client.
    Create,
    /// List clients.
    List,
    /// Rotate a client's secret.
    Rotate { client_id: String },
    /// Enable or disable a client.
    SetActive { client_id: String, active: bool },
    /// Issue a client token.
    Token {
        client_id: String,
        secret: String,
        ttl_days: Option<u64>,
    },
}

/// Run a client command.
///
/// # Errors
///
/// Returns error if the operation fails.
pub fn run_client(ctx: &Context, action: ClientAction) -> anyhow::Result<()> {
    let state = ctx.open()?;
    let clients = state.clients();

    match action {
        ClientAction::Create => {
            let issued = clients.create()?;
            ui::success(&format!("Created client {}", issued.id));
            ui::kv("client_id", &issued.client_id);
            ui::kv("client_secret", issued.client_secret.expose());
            ui::warning("Store the secret now; it cannot be shown again.");
        }
        ClientAction::List => {
            let all = clients.list()?;
            if all.is_empty() {
                ui::info("No clients registered.");
                ui::info("Run 'petreg client create' to add one.");
                return Ok(());
            }

            ui::info(&format!("Clients ({}):", all.len()));
            println!();
            println!("{:<8} {:<34} {:<8}", "ID", "CLIENT_ID", "ACTIVE");
            println!("{}", "-".repeat(52));
            for client in all {
                let active = if client.is_active { "yes" } else { "no" };
                println!(
                    "{:<8} {:<34} {:<8}",
                    client.id.to_string(),
                    client.client_id,
                    active
                );
            }
        }
        ClientAction::Rotate { client_id } => {
            let secret = clients.rotate_secret(&client_id)?;
            ui::success(&format!("Rotated secret for client '{client_id}'"));
            ui::kv("client_secret", secret.expose());
        }
        ClientAction::SetActive { client_id, active } => {
            if active {
                clients.reactivate(&client_id)?;
            } else {
                clients.deactivate(&client_id)?;
            }
            let status = if active { "enabled" } else { "disabled" };
            ui::success(&format!("Client '{client_id}' {status}"));
        }
        ClientAction::Token {
            client_id,
            secret,
            ttl_days,
        } => {
            let ttl = ttl_days.map(days_to_duration).transpose()?;
            let token = clients.login(&client_id, &secret, ttl)?;
            ui::kv("access_token", &token.access_token);
            ui::kv("expires_at", &token.expires_at.to_rfc3339());
        }
    }

    Ok(())
}
