// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::types::{IdentitiesData, IdentityError, YamlIdentitiesData};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(test)]
use std::sync::{Arc, RwLock};

pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<IdentitiesData, IdentityError>;
    fn save(&self, data: &IdentitiesData) -> Result<(), IdentityError>;
}

/// YAML-file-backed identity store. Writes go through a temp file in the
/// same directory followed by a rename, so a failed save never corrupts the
/// existing file.
pub struct FileIdentityStore {
    identities_file: PathBuf,
}

impl FileIdentityStore {
    pub fn new(identities_file: PathBuf) -> Result<Self, IdentityError> {
        if identities_file.as_os_str().is_empty() {
            return Err(IdentityError::FileError(
                "Identities file path is empty".to_string(),
            ));
        }

        Ok(Self { identities_file })
    }

    fn write_identities_file(&self, content: &str) -> Result<(), IdentityError> {
        let parent = self.identities_file.parent().ok_or_else(|| {
            IdentityError::FileError("Identities file path has no parent directory".to_string())
        })?;
        let file_name = self.identities_file.file_name().ok_or_else(|| {
            IdentityError::FileError("Identities file path has no file name".to_string())
        })?;
        let (mut file, temp_path) = create_temp_file(parent, file_name)?;

        if let Err(err) = file.write_all(content.as_bytes()) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(IdentityError::FileError(format!(
                "Failed to write identities temp file: {}",
                err
            )));
        }
        if let Err(err) = file.sync_all() {
            let _ = std::fs::remove_file(&temp_path);
            return Err(IdentityError::FileError(format!(
                "Failed to sync identities temp file: {}",
                err
            )));
        }

        if let Err(err) = std::fs::rename(&temp_path, &self.identities_file) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(IdentityError::FileError(format!(
                "Failed to replace identities file: {}",
                err
            )));
        }

        #[cfg(unix)]
        {
            if let Err(err) = sync_parent_dir(parent) {
                log::warn!("Identities directory sync failed: {}", err);
            }
        }

        Ok(())
    }
}

fn create_temp_file(
    dir: &Path,
    file_name: &std::ffi::OsStr,
) -> Result<(std::fs::File, PathBuf), IdentityError> {
    use std::fs::OpenOptions;
    const MAX_ATTEMPTS: u32 = 100;
    let base = file_name.to_string_lossy();
    for attempt in 0..MAX_ATTEMPTS {
        let candidate = dir.join(format!(".{}.tmp.{}.{}", base, std::process::id(), attempt));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((file, candidate)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(IdentityError::FileError(format!(
                    "Failed to create temp identities file: {}",
                    err
                )));
            }
        }
    }
    Err(IdentityError::FileError(
        "Failed to create temp identities file after repeated attempts".to_string(),
    ))
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> Result<(), IdentityError> {
    let dir = std::fs::File::open(parent).map_err(|err| {
        IdentityError::FileError(format!(
            "Failed to open identities directory for sync: {}",
            err
        ))
    })?;
    dir.sync_all().map_err(|err| {
        IdentityError::FileError(format!("Failed to sync identities directory: {}", err))
    })
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<IdentitiesData, IdentityError> {
        let content = std::fs::read_to_string(&self.identities_file).map_err(|err| {
            IdentityError::FileError(format!("Failed to read identities file: {}", err))
        })?;
        let yaml_data: YamlIdentitiesData = serde_yaml::from_str(&content).map_err(|err| {
            IdentityError::ParseError(format!("Failed to parse identities file: {}", err))
        })?;
        Ok(yaml_data.into_data())
    }

    fn save(&self, data: &IdentitiesData) -> Result<(), IdentityError> {
        let content = serde_yaml::to_string(&data.to_yaml_data()).map_err(|err| {
            IdentityError::ParseError(format!("Failed to serialize identities: {}", err))
        })?;
        self.write_identities_file(&content)
    }
}

#[cfg(test)]
pub struct MemoryIdentityStore {
    data: Arc<RwLock<IdentitiesData>>,
}

#[cfg(test)]
impl MemoryIdentityStore {
    pub fn new(initial: IdentitiesData) -> Self {
        Self {
            data: Arc::new(RwLock::new(initial)),
        }
    }
}

#[cfg(test)]
impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<IdentitiesData, IdentityError> {
        match self.data.read() {
            Ok(guard) => Ok(guard.clone()),
            Err(poisoned) => {
                log::error!("MemoryIdentityStore lock poisoned on read; recovering");
                Ok(poisoned.into_inner().clone())
            }
        }
    }

    fn save(&self, data: &IdentitiesData) -> Result<(), IdentityError> {
        match self.data.write() {
            Ok(mut guard) => {
                *guard = data.clone();
                Ok(())
            }
            Err(poisoned) => {
                log::error!("MemoryIdentityStore lock poisoned on write; recovering");
                let mut guard = poisoned.into_inner();
                *guard = data.clone();
                Ok(())
            }
        }
    }
}
