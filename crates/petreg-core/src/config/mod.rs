//! Configuration loading and validation.
//!
//! Config is JSON5. Location: `~/.petreg/petreg.json`, or
//! `$PETREG_STATE_DIR/petreg.json` when the variable is set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default client token expiry in days.
const DEFAULT_CLIENT_TOKEN_EXPIRY_DAYS: u64 = 30;
/// Default user token expiry in minutes.
const DEFAULT_USER_TOKEN_EXPIRY_MINUTES: u64 = 120;

const SECS_PER_DAY: u64 = 24 * 3600;
const SECS_PER_MINUTE: u64 = 60;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Authentication and token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Falls back to defaults when no config file exists.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        let config = Self {
            auth: config.auth.with_env_overrides(),
            ..config
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// On Unix the file is made owner-only.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;

        // Holds token signing secrets
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("petreg.json")
    }

    /// Get the petreg state directory.
    ///
    /// Uses `PETREG_STATE_DIR` env var if set, otherwise `~/.petreg`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PETREG_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".petreg")
        } else {
            PathBuf::from(".petreg")
        }
    }

    /// Directory holding the auth database.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()
    }
}

/// Signing algorithm for bearer tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    #[default]
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,

    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

const fn default_memory_kib() -> u32 {
    19 * 1024
}

const fn default_iterations() -> u32 {
    2
}

const fn default_parallelism() -> u32 {
    1
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Client token signing secret (hex-encoded). Auto-generated if not set.
    #[serde(default)]
    pub client_token_secret: Option<String>,

    /// User token signing secret (hex-encoded). Auto-generated if not set.
    #[serde(default)]
    pub user_token_secret: Option<String>,

    /// Signing algorithm shared by both issuers.
    #[serde(default)]
    pub algorithm: SigningAlgorithm,

    /// Client token expiry in days.
    #[serde(default = "default_client_expiry")]
    pub client_token_expiry_days: u64,

    /// User token expiry in minutes.
    #[serde(default = "default_user_expiry")]
    pub user_token_expiry_minutes: u64,

    /// Password and client secret hashing cost.
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Group every newly registered user joins.
    #[serde(default = "default_user_group")]
    pub default_user_group: String,
}

const fn default_client_expiry() -> u64 {
    DEFAULT_CLIENT_TOKEN_EXPIRY_DAYS
}

const fn default_user_expiry() -> u64 {
    DEFAULT_USER_TOKEN_EXPIRY_MINUTES
}

fn default_user_group() -> String {
    crate::catalog::USER_GROUP.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_token_secret: None,
            user_token_secret: None,
            algorithm: SigningAlgorithm::default(),
            client_token_expiry_days: default_client_expiry(),
            user_token_expiry_minutes: default_user_expiry(),
            hashing: HashingConfig::default(),
            default_user_group: default_user_group(),
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get client token expiry as Duration.
    ///
    /// Saturates on values `validate` rejects.
    #[must_use]
    pub const fn client_token_expiry(&self) -> Duration {
        Duration::from_secs(self.client_token_expiry_days.saturating_mul(SECS_PER_DAY))
    }

    /// Get user token expiry as Duration.
    ///
    /// Saturates on values `validate` rejects.
    #[must_use]
    pub const fn user_token_expiry(&self) -> Duration {
        Duration::from_secs(self.user_token_expiry_minutes.saturating_mul(SECS_PER_MINUTE))
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("PETREG_CLIENT_JWT_SECRET") {
            self.client_token_secret = Some(secret);
        }
        if let Ok(secret) = std::env::var("PETREG_USER_JWT_SECRET") {
            self.user_token_secret = Some(secret);
        }
        self
    }

    /// Validate the auth section.
    ///
    /// # Errors
    ///
    /// Returns error if an expiry is zero or too large to represent, a hash
    /// cost is zero, the two token secrets are equal, or the default group
    /// is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_token_expiry_days == 0 {
            return Err(ConfigError::Validation(
                "Client token expiry cannot be 0".to_string(),
            ));
        }
        if self.user_token_expiry_minutes == 0 {
            return Err(ConfigError::Validation(
                "User token expiry cannot be 0".to_string(),
            ));
        }
        if expiry_secs(self.client_token_expiry_days, SECS_PER_DAY).is_none() {
            return Err(ConfigError::Validation(format!(
                "Client token expiry of {} days is out of range",
                self.client_token_expiry_days
            )));
        }
        if expiry_secs(self.user_token_expiry_minutes, SECS_PER_MINUTE).is_none() {
            return Err(ConfigError::Validation(format!(
                "User token expiry of {} minutes is out of range",
                self.user_token_expiry_minutes
            )));
        }
        // Both issuers sharing a key would let a client token pass user signature checks.
        if let (Some(client), Some(user)) = (&self.client_token_secret, &self.user_token_secret) {
            if client.eq_ignore_ascii_case(user) {
                return Err(ConfigError::Validation(
                    "Client and user token secrets must differ".to_string(),
                ));
            }
        }
        let h = &self.hashing;
        if h.memory_kib == 0 || h.iterations == 0 || h.parallelism == 0 {
            return Err(ConfigError::Validation(
                "Hashing cost parameters must be non-zero".to_string(),
            ));
        }
        if self.default_user_group.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Default user group cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expiry in seconds, if it fits a signed millisecond timestamp offset.
fn expiry_secs(count: u64, unit_secs: u64) -> Option<u64> {
    count
        .checked_mul(unit_secs)
        .filter(|secs| secs.checked_mul(1000).is_some_and(|ms| i64::try_from(ms).is_ok()))
}

/// Token lifetime in days as a `Duration`.
///
/// # Errors
///
/// Returns `ConfigError::Validation` if the value cannot be represented.
pub fn days_to_duration(days: u64) -> Result<Duration, ConfigError> {
    expiry_secs(days, SECS_PER_DAY)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Validation(format!("Lifetime of {days} days is out of range")))
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the client token secret.
    #[must_use]
    pub fn client_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.client_token_secret = Some(secret.into());
        self
    }

    /// Set the user token secret.
    #[must_use]
    pub fn user_token_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.user_token_secret = Some(secret.into());
        self
    }

    /// Set the signing algorithm.
    #[must_use]
    pub const fn algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Set client token expiry in days.
    #[must_use]
    pub const fn client_token_expiry_days(mut self, days: u64) -> Self {
        self.config.client_token_expiry_days = days;
        self
    }

    /// Set user token expiry in minutes.
    #[must_use]
    pub const fn user_token_expiry_minutes(mut self, minutes: u64) -> Self {
        self.config.user_token_expiry_minutes = minutes;
        self
    }

    /// Set hashing cost parameters.
    #[must_use]
    pub const fn hashing(mut self, hashing: HashingConfig) -> Self {
        self.config.hashing = hashing;
        self
    }

    /// Set the group new users join on registration.
    #[must_use]
    pub fn default_user_group(mut self, group: impl Into<String>) -> Self {
        self.config.default_user_group = group.into();
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Data directory override. Defaults to `<state_dir>/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth.client_token_expiry_days, 30);
        assert_eq!(config.auth.user_token_expiry_minutes, 120);
        assert_eq!(config.auth.default_user_group, "user");
        assert_eq!(config.auth.algorithm, SigningAlgorithm::HS256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_durations() {
        let config = AuthConfig::default();
        assert_eq!(config.client_token_expiry(), Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.user_token_expiry(), Duration::from_secs(120 * 60));
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("petreg.json");

        let config = Config {
            auth: AuthConfig::builder()
                .user_token_expiry_minutes(15)
                .algorithm(SigningAlgorithm::HS512)
                .build(),
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.auth.user_token_expiry_minutes, 15);
        assert_eq!(loaded.auth.algorithm, SigningAlgorithm::HS512);
    }

    #[test]
    fn test_json5_parsing() {
        let json5_content = r#"{
            // token settings
            auth: {
                algorithm: "HS384",
                clientTokenExpiryDays: 7,
                hashing: { memoryKib: 4096 },
            },
            settings: { logFormat: "json" },
        }"#;

        let config: Config = json5::from_str(json5_content).unwrap();
        assert_eq!(config.auth.algorithm, SigningAlgorithm::HS384);
        assert_eq!(config.auth.client_token_expiry_days, 7);
        assert_eq!(config.auth.hashing.memory_kib, 4096);
        assert_eq!(config.auth.hashing.iterations, 2);
        assert_eq!(config.settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let config = Config {
            auth: AuthConfig::builder().user_token_expiry_minutes(0).build(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_oversized_expiry_rejected() {
        let auth = AuthConfig::builder()
            .client_token_expiry_days(300_000_000_000_000)
            .build();
        assert!(matches!(auth.validate(), Err(ConfigError::Validation(_))));
        assert_eq!(auth.client_token_expiry(), Duration::from_secs(u64::MAX));

        let auth = AuthConfig::builder()
            .user_token_expiry_minutes(u64::MAX / 2)
            .build();
        assert!(auth.validate().is_err());

        let auth = AuthConfig::builder()
            .client_token_expiry_days(36_500)
            .build();
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_days_to_duration() {
        assert_eq!(days_to_duration(2).unwrap(), Duration::from_secs(2 * 86400));
        assert!(days_to_duration(u64::MAX).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let path = temp.path().join("petreg.json");
        Config::default().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_shared_secret_rejected() {
        let config = Config {
            auth: AuthConfig::builder()
                .client_token_secret("abcd")
                .user_token_secret("ABCD")
                .build(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_hash_cost_rejected() {
        let config = Config {
            auth: AuthConfig::builder()
                .hashing(HashingConfig {
                    iterations: 0,
                    ..HashingConfig::default()
                })
                .build(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_dir_override() {
        let config = Config {
            storage: StorageConfig {
                data_dir: Some(PathBuf::from("/tmp/petreg-data")),
            },
            ..Config::default()
        };
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/petreg-data"));
    }
}
