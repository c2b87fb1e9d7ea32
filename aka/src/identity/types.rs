// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A platform account record. The `id` never changes; `login` is unique
/// across all identities at any instant; `slug` is always `slugify(login)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub login: String,
    pub slug: String,
    pub display_name: String,
}

/// Display fields an identity update may carry. The raw login column is
/// deliberately not part of this struct; see `IdentityService::write_login`.
#[derive(Debug, Clone)]
pub struct IdentityProfile {
    pub id: Uuid,
    pub login: String,
    pub display_name: String,
}

// Structure matching the identities.yaml file format
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct YamlIdentitiesData {
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_admins: Vec<String>,
}

impl YamlIdentitiesData {
    pub fn into_data(self) -> IdentitiesData {
        IdentitiesData {
            identities: self
                .identities
                .into_iter()
                .map(|identity| (identity.id, identity))
                .collect(),
            network_admins: self.network_admins.into_iter().collect(),
        }
    }
}

/// In-memory shape of the identity store.
///
/// Network-wide elevated privilege lives in a separate set keyed by login
/// string, not as a field on the identity record. Renaming an identity that
/// holds the privilege therefore has to move the set entry along with it.
#[derive(Debug, Clone, Default)]
pub struct IdentitiesData {
    pub identities: HashMap<Uuid, Identity>,
    pub network_admins: HashSet<String>,
}

impl IdentitiesData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_yaml_data(&self) -> YamlIdentitiesData {
        let mut identities: Vec<Identity> = self.identities.values().cloned().collect();
        identities.sort_by(|a, b| a.login.cmp(&b.login));
        let mut network_admins: Vec<String> = self.network_admins.iter().cloned().collect();
        network_admins.sort();
        YamlIdentitiesData {
            identities,
            network_admins,
        }
    }
}

#[derive(Debug, Clone)]
pub enum IdentityError {
    NotFound(String),
    ServiceNotInitialized,
    FileError(String),
    ParseError(String),
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::NotFound(id) => write!(f, "Identity not found: {}", id),
            IdentityError::ServiceNotInitialized => write!(f, "Identity service not initialized"),
            IdentityError::FileError(msg) => write!(f, "File error: {}", msg),
            IdentityError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for IdentityError {}

// Mutation commands for the background task
#[derive(Debug)]
pub enum IdentityMutation {
    /// The friendly update path: display fields plus a recomputed slug.
    /// Does not touch the raw login column.
    UpdateProfile { profile: IdentityProfile },
    /// Raw write of the login column only.
    WriteLogin { id: Uuid, login: String },
    GrantNetworkAdmin { login: String },
    RevokeNetworkAdmin { login: String },
}

#[derive(Debug)]
pub enum IdentityMutationResult {
    ProfileUpdated,
    LoginWritten,
    Granted,
    Revoked,
}
