//! Configuration types for the check-in runner.
//!
//! Loaded from a TOML file with one section per site plus the notification
//! sink. Every field has a default so a partial file is fine; whether a
//! site is actually runnable is checked by `has_credentials` at run time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CheckinError, Result};

/// Top-level configuration for the check-in runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Lightnovel site credentials and endpoint.
    pub lightnovel: LightnovelConfig,
    /// 2DFan site credentials and endpoint.
    pub twodfan: TwodfanConfig,
    /// Telegram notification sink.
    pub telegram: TelegramConfig,
    /// Session cache file path (None = `.checkin-cache.json` next to the config).
    pub cache_file: Option<PathBuf>,
}

/// Lightnovel site configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightnovelConfig {
    /// Pre-obtained security key; used as-is when set, bypassing login.
    pub security_key: String,
    /// Account name for interactive login.
    pub username: String,
    /// Account password for interactive login.
    pub password: String,
    /// API base URL.
    pub base_url: String,
}

impl Default for LightnovelConfig {
    fn default() -> Self {
        Self {
            security_key: String::new(),
            username: String::new(),
            password: String::new(),
            base_url: "https://api.lightnovel.fun".to_owned(),
        }
    }
}

impl LightnovelConfig {
    /// True when the config can authenticate at all (key or account pair).
    pub fn has_credentials(&self) -> bool {
        !self.security_key.is_empty() || self.has_login()
    }

    /// True when an interactive username/password login is possible.
    pub fn has_login(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// 2DFan site configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwodfanConfig {
    /// Account name for login.
    pub username: String,
    /// Account password for login.
    pub password: String,
    /// API base URL.
    pub base_url: String,
}

impl Default for TwodfanConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            base_url: "https://api.acghost.vip".to_owned(),
        }
    }
}

impl TwodfanConfig {
    /// True when the config can authenticate.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Telegram notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from BotFather.
    pub bot_token: String,
    /// Target chat identifier.
    pub chat_id: String,
    /// Bot API base URL.
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_owned(),
        }
    }
}

impl TelegramConfig {
    /// True when both the token and the chat id are set.
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

impl AppConfig {
    /// Load the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`CheckinError::Config`] when the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CheckinError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            CheckinError::Config(format!("failed to parse config {}: {e}", path.display()))
        })
    }

    /// Resolve the session cache file path relative to the config file.
    pub fn cache_path(&self, config_path: &Path) -> PathBuf {
        match &self.cache_file {
            Some(p) => p.clone(),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(".checkin-cache.json"),
        }
    }
}
