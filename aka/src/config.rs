// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlatformConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Multi-tenant deployments key network-wide privilege by login string;
    /// renames then have to move the privilege entry along.
    #[serde(default)]
    pub multi_tenant: bool,
    #[serde(default = "default_settings_slug")]
    pub settings_slug: String,
    #[serde(default = "default_rename_slug")]
    pub rename_slug: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_settings_slug() -> String {
    "settings".to_string()
}

fn default_rename_slug() -> String {
    "change-username".to_string()
}

fn default_locale() -> String {
    "en_US".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            multi_tenant: false,
            settings_slug: default_settings_slug(),
            rename_slug: default_rename_slug(),
            locale: default_locale(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_minutes")]
    pub default_ttl_minutes: i64,
    #[serde(default = "default_remember_ttl_days")]
    pub remember_ttl_days: i64,
}

fn default_session_ttl_minutes() -> i64 {
    120
}

fn default_remember_ttl_days() -> i64 {
    14
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: default_session_ttl_minutes(),
            remember_ttl_days: default_remember_ttl_days(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UsernameConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_reserved")]
    pub reserved: Vec<String>,
}

fn default_min_chars() -> usize {
    3
}

fn default_max_chars() -> usize {
    60
}

fn default_reserved() -> Vec<String> {
    [
        "admin",
        "administrator",
        "moderator",
        "root",
        "support",
        "system",
        "webmaster",
        "www",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

impl Default for UsernameConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            reserved: default_reserved(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub usernames: UsernameConfig,
}

impl Config {
    pub fn load_and_validate(root: &Path) -> Result<ValidatedConfig, ConfigError> {
        let config_path = root.join(CONFIG_FILE_NAME);
        let content = std::fs::read_to_string(&config_path).map_err(|err| {
            ConfigError::LoadError(format!(
                "Failed to read {}: {}",
                config_path.display(),
                err
            ))
        })?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|err| ConfigError::LoadError(format!("Failed to parse config: {}", err)))?;
        config.validate()
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let bind: SocketAddr = self.server.bind.parse().map_err(|err| {
            ConfigError::ValidationError(format!(
                "server.bind '{}' is not a socket address: {}",
                self.server.bind, err
            ))
        })?;

        validate_slug("platform.settings_slug", &self.platform.settings_slug)?;
        validate_slug("platform.rename_slug", &self.platform.rename_slug)?;

        if self.usernames.min_chars == 0 {
            return Err(ConfigError::ValidationError(
                "usernames.min_chars must be at least 1".to_string(),
            ));
        }
        if self.usernames.min_chars > self.usernames.max_chars {
            return Err(ConfigError::ValidationError(format!(
                "usernames.min_chars ({}) exceeds usernames.max_chars ({})",
                self.usernames.min_chars, self.usernames.max_chars
            )));
        }

        if self.sessions.default_ttl_minutes < 1 {
            return Err(ConfigError::ValidationError(
                "sessions.default_ttl_minutes must be at least 1".to_string(),
            ));
        }
        let default_ttl = Duration::minutes(self.sessions.default_ttl_minutes);
        let remember_ttl = Duration::days(self.sessions.remember_ttl_days);
        if remember_ttl <= default_ttl {
            return Err(ConfigError::ValidationError(
                "sessions.remember_ttl_days must exceed the default session lifetime".to_string(),
            ));
        }

        Ok(ValidatedConfig {
            bind,
            base_url: self.platform.base_url.trim_end_matches('/').to_string(),
            multi_tenant: self.platform.multi_tenant,
            settings_slug: self.platform.settings_slug,
            rename_slug: self.platform.rename_slug,
            locale: self.platform.locale,
            session_default_ttl: default_ttl,
            session_remember_ttl: remember_ttl,
            username_min_chars: self.usernames.min_chars,
            username_max_chars: self.usernames.max_chars,
            reserved_usernames: self.usernames.reserved.into_iter().collect(),
        })
    }
}

fn validate_slug(field: &str, slug: &str) -> Result<(), ConfigError> {
    if slug.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} must not be empty",
            field
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ConfigError::ValidationError(format!(
            "{} may only contain lowercase letters, digits and dashes",
            field
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub bind: SocketAddr,
    pub base_url: String,
    pub multi_tenant: bool,
    pub settings_slug: String,
    pub rename_slug: String,
    pub locale: String,
    pub session_default_ttl: Duration,
    pub session_remember_ttl: Duration,
    pub username_min_chars: usize,
    pub username_max_chars: usize,
    pub reserved_usernames: HashSet<String>,
}

impl ValidatedConfig {
    /// `/members/<slug>/`
    pub fn member_path(&self, slug: &str) -> String {
        format!("/members/{}/", urlencoding::encode(slug))
    }

    /// `/members/<slug>/settings/`
    pub fn settings_path(&self, slug: &str) -> String {
        format!("{}{}/", self.member_path(slug), self.settings_slug)
    }

    /// `/members/<slug>/settings/<rename-slug>/`
    pub fn rename_path(&self, slug: &str) -> String {
        format!("{}{}/", self.settings_path(slug), self.rename_slug)
    }

    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
