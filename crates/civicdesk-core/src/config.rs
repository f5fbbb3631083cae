//! Configuration resolution for civicdesk.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/civicdesk/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (`CIVICDESK_*`)
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{DEFAULT_SESSION_TTL_SECS, DEFAULT_VERIFICATION_TTL_SECS};
use crate::error::{Error, Result};

/// Complete civicdesk configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub images: ImageConfig,
    pub storage: StorageConfig,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session token signing secret. Must be set before services start.
    pub token_secret: Option<String>,
    pub session_ttl_secs: i64,
    pub verification_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            verification_ttl_secs: DEFAULT_VERIFICATION_TTL_SECS,
        }
    }
}

impl AuthConfig {
    /// The signing secret, or a configuration error when missing or empty.
    pub fn require_secret(&self) -> Result<&str> {
        match self.token_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(Error::Config(
                "auth.token_secret is not set (use CIVICDESK_TOKEN_SECRET or --token-secret)"
                    .into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Public base URL verification links point at.
    pub base_url: String,
    pub sender: String,
    /// Delivery endpoint for the webhook mailer. Mail is only logged when unset.
    pub webhook_url: Option<String>,
    /// Upper bound on a single delivery, connection included.
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            sender: "no-reply@civicdesk.local".to_string(),
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

impl MailConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ImageConfig {
    /// Directory uploads are written to. Defaults under the data directory.
    pub root_dir: Option<PathBuf>,
    /// URL prefix for stored images. `file://` URLs are used when unset.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            load_config_file(&global_path)?.apply(&mut config);
        }
    }

    if let Some(path) = explicit {
        // An explicitly named file must exist.
        load_config_file(path)?.apply(&mut config);
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("civicdesk").join("settings.json"))
}

/// Default database location.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("civicdesk").join("civicdesk.db"))
}

/// Default directory for locally hosted images.
pub fn default_image_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("civicdesk").join("images"))
}

/// One config file. Every field is optional so a file only overrides the
/// keys it actually names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    auth: AuthLayer,
    mail: MailLayer,
    images: ImageConfig,
    storage: StorageConfig,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthLayer {
    token_secret: Option<String>,
    session_ttl_secs: Option<i64>,
    verification_ttl_secs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MailLayer {
    base_url: Option<String>,
    sender: Option<String>,
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl ConfigLayer {
    fn apply(self, config: &mut Config) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        if self.auth.token_secret.is_some() {
            config.auth.token_secret = self.auth.token_secret;
        }
        set(&mut config.auth.session_ttl_secs, self.auth.session_ttl_secs);
        set(&mut config.auth.verification_ttl_secs, self.auth.verification_ttl_secs);

        set(&mut config.mail.base_url, self.mail.base_url);
        set(&mut config.mail.sender, self.mail.sender);
        if self.mail.webhook_url.is_some() {
            config.mail.webhook_url = self.mail.webhook_url;
        }
        set(&mut config.mail.timeout_secs, self.mail.timeout_secs);

        if self.images.root_dir.is_some() {
            config.images.root_dir = self.images.root_dir;
        }
        if self.images.public_base_url.is_some() {
            config.images.public_base_url = self.images.public_base_url;
        }
        if self.storage.database_path.is_some() {
            config.storage.database_path = self.storage.database_path;
        }
        if self.log_level.is_some() {
            config.log_level = self.log_level;
        }
    }
}

fn load_config_file(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn parse_secs(key: &str, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a number of seconds, got {value:?}")))
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(val) = var("CIVICDESK_TOKEN_SECRET") {
        config.auth.token_secret = Some(val);
    }
    if let Some(val) = var("CIVICDESK_SESSION_TTL_SECS") {
        config.auth.session_ttl_secs = parse_secs("CIVICDESK_SESSION_TTL_SECS", &val)?;
    }
    if let Some(val) = var("CIVICDESK_VERIFICATION_TTL_SECS") {
        config.auth.verification_ttl_secs = parse_secs("CIVICDESK_VERIFICATION_TTL_SECS", &val)?;
    }
    if let Some(val) = var("CIVICDESK_BASE_URL") {
        config.mail.base_url = val;
    }
    if let Some(val) = var("CIVICDESK_MAIL_SENDER") {
        config.mail.sender = val;
    }
    if let Some(val) = var("CIVICDESK_MAIL_WEBHOOK_URL") {
        config.mail.webhook_url = Some(val);
    }
    if let Some(val) = var("CIVICDESK_MAIL_TIMEOUT_SECS") {
        config.mail.timeout_secs = val.parse().map_err(|_| {
            Error::Config(format!(
                "CIVICDESK_MAIL_TIMEOUT_SECS must be a number of seconds, got {val:?}"
            ))
        })?;
    }
    if let Some(val) = var("CIVICDESK_IMAGE_DIR") {
        config.images.root_dir = Some(PathBuf::from(val));
    }
    if let Some(val) = var("CIVICDESK_IMAGE_BASE_URL") {
        config.images.public_base_url = Some(val);
    }
    if let Some(val) = var("CIVICDESK_DB_PATH") {
        config.storage.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("CIVICDESK_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    Ok(())
}
