// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::{CONFIG_FILE_NAME, Config, ConfigError, ValidatedConfig};
use crate::identity::{IdentitiesData, Identity, slugify};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const IDENTITIES_FILE_NAME: &str = "identities.yaml";
pub const LOCALES_DIR_NAME: &str = "locales";

#[derive(Debug)]
pub struct BootstrapResult {
    pub validated_config: ValidatedConfig,
    pub identities_file: PathBuf,
    pub locales_dir: PathBuf,
    pub created_config: bool,
    pub created_identities: bool,
}

#[derive(Debug)]
pub enum BootstrapError {
    Config(ConfigError),
    Io(std::io::Error),
    Serialize(String),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::Config(err) => write!(f, "{}", err),
            BootstrapError::Io(err) => write!(f, "Bootstrap I/O error: {}", err),
            BootstrapError::Serialize(msg) => write!(f, "Bootstrap serialize error: {}", msg),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BootstrapError::Config(err) => Some(err),
            BootstrapError::Io(err) => Some(err),
            BootstrapError::Serialize(_) => None,
        }
    }
}

impl From<ConfigError> for BootstrapError {
    fn from(err: ConfigError) -> Self {
        BootstrapError::Config(err)
    }
}

impl From<std::io::Error> for BootstrapError {
    fn from(err: std::io::Error) -> Self {
        BootstrapError::Io(err)
    }
}

/// Prepare the runtime directory: generate missing defaults, then load and
/// validate the configuration.
pub fn bootstrap_runtime(root: &Path) -> Result<BootstrapResult, BootstrapError> {
    std::fs::create_dir_all(root)?;

    let created_config = ensure_config(root)?;
    let validated_config = Config::load_and_validate(root)?;
    let created_identities = ensure_identities(root)?;

    let locales_dir = root.join(LOCALES_DIR_NAME);
    std::fs::create_dir_all(&locales_dir)?;

    Ok(BootstrapResult {
        validated_config,
        identities_file: root.join(IDENTITIES_FILE_NAME),
        locales_dir,
        created_config,
        created_identities,
    })
}

fn ensure_config(root: &Path) -> Result<bool, BootstrapError> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.is_file() {
        return Ok(false);
    }

    let content = serde_yaml::to_string(&Config::default())
        .map_err(|err| BootstrapError::Serialize(err.to_string()))?;
    std::fs::write(&config_path, content)?;
    log_action(format!("created default {}", CONFIG_FILE_NAME));
    Ok(true)
}

fn ensure_identities(root: &Path) -> Result<bool, BootstrapError> {
    let identities_path = root.join(IDENTITIES_FILE_NAME);
    if identities_path.is_file() {
        return Ok(false);
    }

    let mut data = IdentitiesData::new();
    let admin = Identity {
        id: Uuid::new_v4(),
        login: "admin".to_string(),
        slug: slugify("admin"),
        display_name: "Administrator".to_string(),
    };
    data.network_admins.insert(admin.login.clone());
    data.identities.insert(admin.id, admin);

    let content = serde_yaml::to_string(&data.to_yaml_data())
        .map_err(|err| BootstrapError::Serialize(err.to_string()))?;
    std::fs::write(&identities_path, content)?;
    log_action(format!(
        "created {} with an administrator identity",
        IDENTITIES_FILE_NAME
    ));
    Ok(true)
}

pub(crate) fn log_action(message: impl AsRef<str>) {
    eprintln!("[bootstrap] {}", message.as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{FileIdentityStore, IdentityStore};

    #[test]
    fn bootstrap_creates_defaults_when_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let result = bootstrap_runtime(temp.path()).expect("bootstrap");

        assert!(result.created_config);
        assert!(result.created_identities);
        assert!(temp.path().join(CONFIG_FILE_NAME).is_file());
        assert!(result.identities_file.is_file());
        assert!(result.locales_dir.is_dir());

        let store = FileIdentityStore::new(result.identities_file).expect("store");
        let data = store.load().expect("load");
        assert_eq!(data.identities.len(), 1);
        assert!(data.network_admins.contains("admin"));
    }

    #[test]
    fn bootstrap_leaves_existing_files_alone() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = bootstrap_runtime(temp.path()).expect("bootstrap");
        let second = bootstrap_runtime(temp.path()).expect("bootstrap again");

        assert!(first.created_config && first.created_identities);
        assert!(!second.created_config && !second.created_identities);
    }

    #[test]
    fn bootstrap_rejects_a_broken_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "server:\n  bind: \"nonsense\"\n",
        )
        .expect("write config");

        assert!(bootstrap_runtime(temp.path()).is_err());
    }
}
