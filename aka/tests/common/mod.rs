// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::web;
use aka::app_state::AppState;
use aka::config::{Config, ValidatedConfig};
use aka::i18n::Catalog;
use aka::identity::{FileIdentityStore, IdentitiesData, Identity, IdentityStore, slugify};
use aka::rename::RenameHooks;
use aka::session::SESSION_COOKIE;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Seeded members available in every harness.
pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const ADMIN: &str = "the-admin";

pub struct TestHarness {
    pub config: ValidatedConfig,
    pub state: web::Data<AppState>,
    completed: Arc<Mutex<Vec<(String, String)>>>,
    _temp: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let identities_file = temp.path().join("identities.yaml");

        let mut data = IdentitiesData::new();
        for login in [ALICE, BOB, ADMIN] {
            let identity = Identity {
                id: Uuid::new_v4(),
                login: login.to_string(),
                slug: slugify(login),
                display_name: login.to_string(),
            };
            data.identities.insert(identity.id, identity);
        }
        data.network_admins.insert(ADMIN.to_string());

        let store = FileIdentityStore::new(identities_file).expect("store");
        store.save(&data).expect("seed identities");

        let completed: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let completed_clone = completed.clone();
        let mut hooks = RenameHooks::new();
        hooks.on_rename_completed(move |event| {
            completed_clone
                .lock()
                .expect("completed lock")
                .push((event.previous.login.clone(), event.new_login.clone()));
        });

        let config = Config::default().validate().expect("config");
        let state =
            AppState::new(&config, Arc::new(store), hooks, Catalog::new()).expect("app state");

        Self {
            config,
            state: web::Data::new(state),
            completed,
            _temp: temp,
        }
    }

    /// `(old_login, new_login)` pairs seen by the completion observer.
    pub fn completed_events(&self) -> Vec<(String, String)> {
        self.completed.lock().expect("completed lock").clone()
    }
}

pub fn session_cookie_from(resp: &ServiceResponse) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.into_owned())
}

/// Pull the anti-forgery token out of a rendered form.
pub fn extract_form_token(body: &str) -> String {
    let marker = "name=\"authenticity_token\" value=\"";
    let start = body.find(marker).expect("token field in form") + marker.len();
    let end = body[start..].find('"').expect("token terminator") + start;
    body[start..end].to_string()
}

pub fn location_header(resp: &ServiceResponse) -> String {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .expect("Location header")
        .to_str()
        .expect("Location header utf-8")
        .to_string()
}
