// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::cache::{CacheLayer, IDENTITY_BY_ID, IDENTITY_BY_LOGIN, PROFILE_PATH};
use super::slug::slugify;
use super::store::IdentityStore;
use super::types::{
    IdentitiesData, Identity, IdentityError, IdentityMutation, IdentityMutationResult,
    IdentityProfile,
};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

// Type aliases for complex channel types
type MutationRequest = (
    IdentityMutation,
    oneshot::Sender<Result<IdentityMutationResult, IdentityError>>,
);
type MutationSender = mpsc::UnboundedSender<MutationRequest>;
type MutationReceiver = mpsc::UnboundedReceiver<MutationRequest>;

/// Canonical identity store access: cached reads, serialized writes.
///
/// Lookups read through the cache layer; mutations are funnelled through a
/// background task so writes to the backing file never interleave. Cache
/// entries are never touched by mutations here — eviction is the caller's
/// concern (see `RenameTransaction`).
#[derive(Clone)]
pub struct IdentityService {
    data: Arc<RwLock<IdentitiesData>>,
    mutation_sender: MutationSender,
    store: Arc<dyn IdentityStore>,
    cache: Arc<dyn CacheLayer>,
}

impl IdentityService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        cache: Arc<dyn CacheLayer>,
    ) -> Result<Self, IdentityError> {
        let initial = store.load()?;
        let data = Arc::new(RwLock::new(initial));

        let (mutation_sender, mut mutation_receiver): (MutationSender, MutationReceiver) =
            mpsc::unbounded_channel();

        let data_clone = data.clone();
        let store_clone = store.clone();

        tokio::spawn(async move {
            while let Some((mutation, response_sender)) = mutation_receiver.recv().await {
                let result = Self::handle_mutation(&mutation, &data_clone, &store_clone);
                let _ = response_sender.send(result);
            }
        });

        Ok(IdentityService {
            data,
            mutation_sender,
            store,
            cache,
        })
    }

    fn reload_from_store(
        data: &Arc<RwLock<IdentitiesData>>,
        store: &Arc<dyn IdentityStore>,
    ) -> Result<(), IdentityError> {
        let fresh = store.load()?;
        match data.write() {
            Ok(mut guard) => {
                *guard = fresh;
                data.clear_poison();
                Ok(())
            }
            Err(poisoned) => {
                log::error!("Identities lock poisoned during reload; recovering");
                let mut guard = poisoned.into_inner();
                *guard = fresh;
                data.clear_poison();
                Ok(())
            }
        }
    }

    fn with_read<T>(
        &self,
        f: impl FnOnce(&IdentitiesData) -> Result<T, IdentityError>,
    ) -> Result<T, IdentityError> {
        match self.data.read() {
            Ok(guard) => f(&guard),
            Err(_) => {
                log::error!("Identities lock poisoned on read; reloading from store");
                Self::reload_from_store(&self.data, &self.store)?;
                let guard = self.data.read().map_err(|_| {
                    IdentityError::FileError(
                        "Identities lock poisoned after recovery attempt".to_string(),
                    )
                })?;
                f(&guard)
            }
        }
    }

    fn with_write<T>(
        data: &Arc<RwLock<IdentitiesData>>,
        store: &Arc<dyn IdentityStore>,
        f: impl FnOnce(&mut IdentitiesData) -> Result<T, IdentityError>,
    ) -> Result<T, IdentityError> {
        let mut guard = match data.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("Identities lock poisoned on write; reloading from store");
                let mut guard = poisoned.into_inner();
                *guard = store.load()?;
                data.clear_poison();
                guard
            }
        };

        f(&mut guard)
    }

    /// Handle an identity mutation (runs in the background task). The
    /// in-memory map is only replaced once the store save succeeded.
    fn handle_mutation(
        mutation: &IdentityMutation,
        data: &Arc<RwLock<IdentitiesData>>,
        store: &Arc<dyn IdentityStore>,
    ) -> Result<IdentityMutationResult, IdentityError> {
        match mutation {
            IdentityMutation::UpdateProfile { profile } => {
                Self::with_write(data, store, |data| {
                    let mut updated = data.clone();
                    let identity = match updated.identities.get_mut(&profile.id) {
                        Some(identity) => identity,
                        None => return Err(IdentityError::NotFound(profile.id.to_string())),
                    };
                    // The friendly path recomputes the slug from the submitted
                    // login but never writes the login column itself.
                    identity.display_name = profile.display_name.clone();
                    identity.slug = slugify(&profile.login);

                    store.save(&updated)?;
                    *data = updated;
                    Ok(IdentityMutationResult::ProfileUpdated)
                })
            }
            IdentityMutation::WriteLogin { id, login } => Self::with_write(data, store, |data| {
                let mut updated = data.clone();
                let identity = match updated.identities.get_mut(id) {
                    Some(identity) => identity,
                    None => return Err(IdentityError::NotFound(id.to_string())),
                };
                identity.login = login.clone();

                store.save(&updated)?;
                *data = updated;
                Ok(IdentityMutationResult::LoginWritten)
            }),
            IdentityMutation::GrantNetworkAdmin { login } => {
                Self::with_write(data, store, |data| {
                    let mut updated = data.clone();
                    updated.network_admins.insert(login.clone());

                    store.save(&updated)?;
                    *data = updated;
                    Ok(IdentityMutationResult::Granted)
                })
            }
            IdentityMutation::RevokeNetworkAdmin { login } => {
                Self::with_write(data, store, |data| {
                    let mut updated = data.clone();
                    updated.network_admins.remove(login);

                    store.save(&updated)?;
                    *data = updated;
                    Ok(IdentityMutationResult::Revoked)
                })
            }
        }
    }

    async fn send_mutation(
        &self,
        mutation: IdentityMutation,
    ) -> Result<IdentityMutationResult, IdentityError> {
        let (response_sender, response_receiver) = oneshot::channel();

        self.mutation_sender
            .send((mutation, response_sender))
            .map_err(|_| IdentityError::ServiceNotInitialized)?;

        response_receiver
            .await
            .map_err(|_| IdentityError::ServiceNotInitialized)?
    }

    /// Update display fields through the friendly path. Recomputes the slug
    /// from `profile.login`; callers performing a rename must also call
    /// `write_login`, one call is not sufficient.
    pub async fn update_profile(&self, profile: IdentityProfile) -> Result<(), IdentityError> {
        match self
            .send_mutation(IdentityMutation::UpdateProfile { profile })
            .await?
        {
            IdentityMutationResult::ProfileUpdated => Ok(()),
            _ => Err(IdentityError::FileError("Unexpected result".to_string())),
        }
    }

    /// Raw write of the login column.
    pub async fn write_login(&self, id: Uuid, login: &str) -> Result<(), IdentityError> {
        match self
            .send_mutation(IdentityMutation::WriteLogin {
                id,
                login: login.to_string(),
            })
            .await?
        {
            IdentityMutationResult::LoginWritten => Ok(()),
            _ => Err(IdentityError::FileError("Unexpected result".to_string())),
        }
    }

    pub async fn grant_network_admin(&self, login: &str) -> Result<(), IdentityError> {
        match self
            .send_mutation(IdentityMutation::GrantNetworkAdmin {
                login: login.to_string(),
            })
            .await?
        {
            IdentityMutationResult::Granted => Ok(()),
            _ => Err(IdentityError::FileError("Unexpected result".to_string())),
        }
    }

    pub async fn revoke_network_admin(&self, login: &str) -> Result<(), IdentityError> {
        match self
            .send_mutation(IdentityMutation::RevokeNetworkAdmin {
                login: login.to_string(),
            })
            .await?
        {
            IdentityMutationResult::Revoked => Ok(()),
            _ => Err(IdentityError::FileError("Unexpected result".to_string())),
        }
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<Identity>, IdentityError> {
        let key = id.to_string();
        if let Some(cached) = self.cache.get(IDENTITY_BY_ID, &key) {
            return Ok(decode_cached_identity(cached));
        }

        let found = self.with_read(|data| Ok(data.identities.get(id).cloned()))?;
        self.cache.put(IDENTITY_BY_ID, &key, encode_identity(&found));
        Ok(found)
    }

    /// Cached lookup by login. Misses are cached too; anything that frees or
    /// claims a login must evict this namespace first or lookups will lie.
    pub fn find_by_login(&self, login: &str) -> Result<Option<Identity>, IdentityError> {
        if let Some(cached) = self.cache.get(IDENTITY_BY_LOGIN, login) {
            return Ok(decode_cached_identity(cached));
        }

        let found = self.with_read(|data| {
            Ok(data
                .identities
                .values()
                .find(|identity| identity.login == login)
                .cloned())
        })?;
        self.cache
            .put(IDENTITY_BY_LOGIN, login, encode_identity(&found));
        Ok(found)
    }

    pub fn login_exists(&self, login: &str) -> Result<bool, IdentityError> {
        Ok(self.find_by_login(login)?.is_some())
    }

    pub fn find_by_slug(&self, slug: &str) -> Result<Option<Identity>, IdentityError> {
        self.with_read(|data| {
            Ok(data
                .identities
                .values()
                .find(|identity| identity.slug == slug)
                .cloned())
        })
    }

    pub fn is_network_admin(&self, login: &str) -> Result<bool, IdentityError> {
        self.with_read(|data| Ok(data.network_admins.contains(login)))
    }

    /// Cached derived member path for an identity. The path itself is
    /// computed by the caller so the service stays ignorant of URL layout.
    pub fn profile_path(
        &self,
        id: &Uuid,
        compute: impl FnOnce(&Identity) -> String,
    ) -> Result<Option<String>, IdentityError> {
        let key = id.to_string();
        if let Some(Value::String(path)) = self.cache.get(PROFILE_PATH, &key) {
            return Ok(Some(path));
        }

        let Some(identity) = self.find_by_id(id)? else {
            return Ok(None);
        };
        let path = compute(&identity);
        self.cache
            .put(PROFILE_PATH, &key, Value::String(path.clone()));
        Ok(Some(path))
    }
}

fn encode_identity(found: &Option<Identity>) -> Value {
    match found {
        Some(identity) => serde_json::to_value(identity).unwrap_or(Value::Null),
        None => Value::Null,
    }
}

fn decode_cached_identity(cached: Value) -> Option<Identity> {
    match cached {
        Value::Null => None,
        value => serde_json::from_value(value).ok(),
    }
}
