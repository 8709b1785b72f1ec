//! CLI command implementations.

pub mod check;
pub mod client;
pub mod grant;
pub mod seed;
pub mod user;

use std::path::PathBuf;

use anyhow::Context as _;
use petreg_auth::AuthState;
use petreg_core::Config;

use crate::ui;

pub use check::run_check;
pub use client::run_client;
pub use grant::run_grant;
pub use seed::run_seed;
pub use user::run_user;

/// Resolved configuration shared by every command.
pub struct Context {
    /// Effective configuration, environment overrides applied.
    pub config: Config,
    /// Where the configuration lives on disk.
    pub config_path: PathBuf,
    /// Directory holding the auth database.
    pub data_dir: PathBuf,
}

impl Context {
    /// Load configuration and resolve the data directory.
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be loaded.
    pub fn load(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = config_path.unwrap_or_else(Config::default_path);
        let mut config = if config_path.exists() {
            Config::load(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            Config::default()
        };
        config.auth = config.auth.with_env_overrides();
        config.validate()?;

        let data_dir = data_dir.unwrap_or_else(|| config.data_dir());

        Ok(Self {
            config,
            config_path,
            data_dir,
        })
    }

    /// Open the auth store.
    ///
    /// Token secrets generated on first use are written back to the config
    /// file so tokens issued now still verify on the next run.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the config cannot be saved.
    pub fn open(&self) -> anyhow::Result<AuthState> {
        tracing::debug!(data_dir = %self.data_dir.display(), "Opening auth store");
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create {}", self.data_dir.display()))?;

        let state = AuthState::open(self.config.auth.clone(), &self.data_dir)
            .context("Failed to open auth store")?;
        self.persist_generated_secrets(&state)?;

        Ok(state)
    }

    fn persist_generated_secrets(&self, state: &AuthState) -> anyhow::Result<()> {
        let auth = &self.config.auth;
        if auth.client_token_secret.is_some() && auth.user_token_secret.is_some() {
            return Ok(());
        }

        // Start from the file so environment overrides never land on disk.
        let mut on_disk = if self.config_path.exists() {
            Config::load(&self.config_path)?
        } else {
            Config::default()
        };
        if auth.client_token_secret.is_none() {
            on_disk
                .auth
                .client_token_secret
                .clone_from(&state.config.client_token_secret);
        }
        if auth.user_token_secret.is_none() {
            on_disk
                .auth
                .user_token_secret
                .clone_from(&state.config.user_token_secret);
        }

        on_disk
            .save(&self.config_path)
            .with_context(|| format!("Failed to save {}", self.config_path.display()))?;
        ui::info(&format!(
            "Saved generated token secrets to {}",
            self.config_path.display()
        ));
        Ok(())
    }
}
