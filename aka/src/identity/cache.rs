// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Cache namespace for identity records keyed by id.
pub const IDENTITY_BY_ID: &str = "identity_by_id";
/// Cache namespace for identity records keyed by login. Existence lookups
/// read through this namespace, which is why a rename evicts it up front.
pub const IDENTITY_BY_LOGIN: &str = "identity_by_login";
/// Cache namespace for derived member paths keyed by id.
pub const PROFILE_PATH: &str = "profile_path";

#[derive(Debug, Clone)]
pub enum CacheError {
    Unavailable(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Unavailable(msg) => write!(f, "Cache unavailable: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

/// Keyed cache of derived identity state.
///
/// The identity service populates entries lazily on lookup; the rename
/// transaction only ever evicts, forcing downstream repopulation. Eviction
/// failures are reported but callers are free to ignore them.
pub trait CacheLayer: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;
    fn put(&self, namespace: &str, key: &str, value: Value);
    fn evict(&self, namespace: &str, key: &str) -> Result<(), CacheError>;
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl CacheLayer for InMemoryCache {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        match self.entries.read() {
            Ok(guard) => guard
                .get(&(namespace.to_string(), key.to_string()))
                .cloned(),
            Err(poisoned) => {
                log::error!("Cache lock poisoned on read; recovering");
                poisoned
                    .into_inner()
                    .get(&(namespace.to_string(), key.to_string()))
                    .cloned()
            }
        }
    }

    fn put(&self, namespace: &str, key: &str, value: Value) {
        match self.entries.write() {
            Ok(mut guard) => {
                guard.insert((namespace.to_string(), key.to_string()), value);
            }
            Err(poisoned) => {
                log::error!("Cache lock poisoned on write; recovering");
                poisoned
                    .into_inner()
                    .insert((namespace.to_string(), key.to_string()), value);
            }
        }
    }

    fn evict(&self, namespace: &str, key: &str) -> Result<(), CacheError> {
        match self.entries.write() {
            Ok(mut guard) => {
                guard.remove(&(namespace.to_string(), key.to_string()));
                Ok(())
            }
            Err(poisoned) => {
                log::error!("Cache lock poisoned on evict; recovering");
                poisoned
                    .into_inner()
                    .remove(&(namespace.to_string(), key.to_string()));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_returns_what_put_stored_per_namespace() {
        let cache = InMemoryCache::new();
        cache.put(IDENTITY_BY_LOGIN, "alice", json!({"login": "alice"}));

        assert_eq!(
            cache.get(IDENTITY_BY_LOGIN, "alice"),
            Some(json!({"login": "alice"}))
        );
        assert_eq!(cache.get(IDENTITY_BY_ID, "alice"), None);
    }

    #[test]
    fn evict_removes_only_the_named_entry() {
        let cache = InMemoryCache::new();
        cache.put(IDENTITY_BY_LOGIN, "alice", json!(1));
        cache.put(IDENTITY_BY_LOGIN, "bob", json!(2));

        cache.evict(IDENTITY_BY_LOGIN, "alice").expect("evict");

        assert_eq!(cache.get(IDENTITY_BY_LOGIN, "alice"), None);
        assert_eq!(cache.get(IDENTITY_BY_LOGIN, "bob"), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicting_a_missing_entry_is_not_an_error() {
        let cache = InMemoryCache::new();
        assert!(cache.evict(PROFILE_PATH, "nope").is_ok());
    }
}
