//! petreg CLI - administration for the pet registry auth store.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use petreg_core::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "petreg")]
#[command(about = "petreg - pet registry authorization admin")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory override
    #[arg(long, global = true, env = "PETREG_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file override
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed groups and permissions, and bootstrap a superuser from the environment
    Seed,

    /// API client management
    Client {
        #[command(subcommand)]
        action: ClientCommands,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Grant a permission
    Grant {
        #[command(subcommand)]
        target: GrantCommands,
    },

    /// Revoke a direct permission
    Revoke {
        #[command(subcommand)]
        target: RevokeCommands,
    },

    /// Group membership
    Member {
        #[command(subcommand)]
        action: MemberCommands,
    },

    /// Check whether a user holds a permission
    Check {
        /// User email
        #[arg(long)]
        email: String,

        /// Permission codename
        #[arg(long)]
        codename: String,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Create a client and print its credentials
    Create,

    /// List clients
    List,

    /// Replace a client's secret
    Rotate {
        /// Public client ID
        client_id: String,
    },

    /// Disable a client
    Disable {
        /// Public client ID
        client_id: String,
    },

    /// Enable a client
    Enable {
        /// Public client ID
        client_id: String,
    },

    /// Issue a client token
    Token {
        /// Public client ID
        client_id: String,

        /// Client secret
        #[arg(long, env = "PETREG_CLIENT_SECRET")]
        secret: String,

        /// Lifetime in days (defaults to the configured expiry)
        #[arg(long)]
        ttl_days: Option<u64>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user
    Create {
        /// Email address
        #[arg(long)]
        email: String,

        /// Password
        #[arg(long, env = "PETREG_USER_PASSWORD")]
        password: String,

        /// Make the user a superuser
        #[arg(long)]
        superuser: bool,
    },

    /// List users by creation time
    List {
        /// Sort order: asc or desc
        #[arg(long, default_value = "desc")]
        order: String,
    },

    /// Enable a user account
    Enable {
        /// Email address
        #[arg(long)]
        email: String,
    },

    /// Disable a user account
    Disable {
        /// Email address
        #[arg(long)]
        email: String,
    },

    /// Delete a user with all grants
    Delete {
        /// Email address
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum GrantCommands {
    /// Grant a permission to a group
    Group {
        /// Group name
        #[arg(long)]
        group: String,

        /// Permission codename
        #[arg(long)]
        codename: String,
    },

    /// Grant a permission directly to a user
    User {
        /// User email
        #[arg(long)]
        email: String,

        /// Permission codename
        #[arg(long)]
        codename: String,
    },
}

#[derive(Subcommand)]
enum RevokeCommands {
    /// Revoke a direct user permission
    User {
        /// User email
        #[arg(long)]
        email: String,

        /// Permission codename
        #[arg(long)]
        codename: String,
    },
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Add a user to a group
    Add {
        /// User email
        #[arg(long)]
        email: String,

        /// Group name
        #[arg(long)]
        group: String,
    },

    /// Remove a user from a group
    Remove {
        /// User email
        #[arg(long)]
        email: String,

        /// Group name
        #[arg(long)]
        group: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ctx = commands::Context::load(cli.config, cli.data_dir)?;

    // Setup logging
    let filter = if cli.verbose || ctx.config.settings.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    match ctx.config.settings.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    dispatch(&ctx, cli.command)
}

fn dispatch(ctx: &commands::Context, command: Commands) -> anyhow::Result<()> {
    use commands::{client::ClientAction, grant::GrantAction, user::UserAction};

    match command {
        Commands::Seed => commands::run_seed(ctx),

        Commands::Client { action } => {
            let action = match action {
                ClientCommands::Create => ClientAction::Create,
                ClientCommands::List => ClientAction::List,
                ClientCommands::Rotate { client_id } => ClientAction::Rotate { client_id },
                ClientCommands::Disable { client_id } => ClientAction::SetActive {
                    client_id,
                    active: false,
                },
                ClientCommands::Enable { client_id } => ClientAction::SetActive {
                    client_id,
                    active: true,
                },
                ClientCommands::Token {
                    client_id,
                    secret,
                    ttl_days,
                } => ClientAction::Token {
                    client_id,
                    secret,
                    ttl_days,
                },
            };
            commands::run_client(ctx, action)
        }

        Commands::User { action } => {
            let action = match action {
                UserCommands::Create {
                    email,
                    password,
                    superuser,
                } => UserAction::Create {
                    email,
                    password,
                    superuser,
                },
                UserCommands::List { order } => UserAction::List { order },
                UserCommands::Enable { email } => UserAction::SetActive {
                    email,
                    active: true,
                },
                UserCommands::Disable { email } => UserAction::SetActive {
                    email,
                    active: false,
                },
                UserCommands::Delete { email } => UserAction::Delete { email },
            };
            commands::run_user(ctx, action)
        }

        Commands::Grant { target } => {
            let action = match target {
                GrantCommands::Group { group, codename } => {
                    GrantAction::GrantGroup { group, codename }
                }
                GrantCommands::User { email, codename } => {
                    GrantAction::GrantUser { email, codename }
                }
            };
            commands::run_grant(ctx, action)
        }

        Commands::Revoke {
            target: RevokeCommands::User { email, codename },
        } => commands::run_grant(ctx, GrantAction::RevokeUser { email, codename }),

        Commands::Member { action } => {
            let action = match action {
                MemberCommands::Add { email, group } => GrantAction::AddMember { email, group },
                MemberCommands::Remove { email, group } => {
                    GrantAction::RemoveMember { email, group }
                }
            };
            commands::run_grant(ctx, action)
        }

        Commands::Check { email, codename } => commands::run_check(ctx, &email, &codename),
    }
}
