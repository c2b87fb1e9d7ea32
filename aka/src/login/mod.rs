// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Host-shim login. The surrounding platform normally authenticates its
//! members; this passwordless stand-in exists so the settings screens (and
//! the rename feature's session reissue) can be exercised end to end.

use crate::app_state::AppState;
use crate::config::ValidatedConfig;
use crate::session::{SESSION_COOKIE, SessionRecord};
use crate::templates::render_minijinja_template;
use actix_web::cookie::Cookie;
use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use minijinja::context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub login: Option<String>,
    pub remember: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::get().to(login_shell))
        .route("/login", web::post().to(login_submit))
        .route("/logout", web::post().to(handle_logout));
}

pub fn session_cookie(record: &SessionRecord) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, record.session_id.clone())
        .path("/")
        .http_only(true)
        .finish()
}

fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(0))
        .finish()
}

pub async fn login_shell(state: web::Data<AppState>) -> Result<HttpResponse> {
    render_login(&state, None)
}

pub async fn login_submit(
    form: web::Form<LoginForm>,
    config: web::Data<ValidatedConfig>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let login = form.login.unwrap_or_default();

    let identity = state
        .identities
        .find_by_login(login.trim())
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(identity) = identity else {
        return render_login(&state, Some(state.catalog.text("login.error.unknown")));
    };

    let remember = form.remember.is_some();
    let record = state.sessions.issue(&identity, remember);
    log::info!("Issued session for {}", identity.login);

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, config.settings_path(&identity.slug)))
        .cookie(session_cookie(&record))
        .finish())
}

pub async fn handle_logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value());
    }

    Ok(HttpResponse::Found()
        .append_header((header::LOCATION, "/login"))
        .cookie(expired_session_cookie())
        .finish())
}

fn render_login(state: &AppState, error: Option<String>) -> Result<HttpResponse> {
    let body = render_minijinja_template(
        state.templates.as_ref(),
        "login/login_page.html",
        context! {
            title => state.catalog.text("login.title"),
            login_label => state.catalog.text("login.form.login_label"),
            remember_label => state.catalog.text("login.form.remember_label"),
            submit_label => state.catalog.text("login.form.submit"),
            error => error,
        },
    )
    .map_err(|err| {
        log::error!("Failed to render login page: {}", err);
        actix_web::error::ErrorInternalServerError(err)
    })?;

    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}
