// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::sync::Arc;

use crate::config::ValidatedConfig;
use crate::i18n::Catalog;
use crate::identity::{CacheLayer, IdentityError, IdentityService, IdentityStore, InMemoryCache};
use crate::rename::{RenameHooks, RenameTransaction};
use crate::security::FormTokenStore;
use crate::session::SessionStore;
use crate::templates::{MiniJinjaEngine, TemplateEngine};
use crate::util::FlashStore;

/// All collaborators of the feature, wired once at startup and shared by
/// reference. No ambient globals anywhere.
pub struct AppState {
    pub templates: Arc<dyn TemplateEngine>,
    pub identities: Arc<IdentityService>,
    pub cache: Arc<dyn CacheLayer>,
    pub sessions: Arc<SessionStore>,
    pub form_tokens: FormTokenStore,
    pub flash: FlashStore,
    pub catalog: Arc<Catalog>,
    pub rename: Arc<RenameTransaction>,
}

impl AppState {
    pub fn new(
        config: &ValidatedConfig,
        store: Arc<dyn IdentityStore>,
        hooks: RenameHooks,
        catalog: Catalog,
    ) -> Result<Self, IdentityError> {
        let cache: Arc<dyn CacheLayer> = Arc::new(InMemoryCache::new());
        let identities = Arc::new(IdentityService::new(store, cache.clone())?);
        let sessions = Arc::new(SessionStore::new(
            config.session_default_ttl,
            config.session_remember_ttl,
        ));
        let catalog = Arc::new(catalog);
        let rename = Arc::new(RenameTransaction::new(
            config,
            identities.clone(),
            cache.clone(),
            sessions.clone(),
            Arc::new(hooks),
            catalog.clone(),
        ));

        Ok(Self {
            templates: Arc::new(MiniJinjaEngine::new()),
            identities,
            cache,
            sessions,
            form_tokens: FormTokenStore::new(),
            flash: FlashStore::new(),
            catalog,
            rename,
        })
    }
}
