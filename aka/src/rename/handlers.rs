// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::nav::settings_nav;
use super::errors::RenameFailure;
use super::transaction::{RenameContext, RenameRequest};
use crate::app_state::AppState;
use crate::config::ValidatedConfig;
use crate::identity::Identity;
use crate::login::session_cookie;
use crate::security::RENAME_ACTION;
use crate::session::{SESSION_COOKIE, SessionRecord};
use crate::templates::render_minijinja_template;
use crate::util::FlashKind;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use minijinja::context;
use serde::Deserialize;

/// Recognized username-change form fields. Presence of
/// `change_username_submit` selects the mutation path; everything else is
/// optional and defaulted.
#[derive(Debug, Deserialize)]
pub struct ChangeUsernameForm {
    pub change_username_submit: Option<String>,
    pub authenticity_token: Option<String>,
    pub new_user_name: Option<String>,
    pub current_user_name: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &ValidatedConfig) {
    let settings_path = format!("/members/{{slug}}/{}", config.settings_slug);
    let rename_path = format!("{}/{}", settings_path, config.rename_slug);
    cfg.route(&settings_path, web::get().to(settings_home))
        .route(&rename_path, web::get().to(change_username_screen))
        .route(&rename_path, web::post().to(change_username_submit));
}

/// The identity whose settings page is being viewed, as resolved by
/// routing. Never taken from a form field.
fn resolve_target(state: &AppState, slug: &str) -> Result<Option<Identity>> {
    state
        .identities
        .find_by_slug(slug)
        .map_err(actix_web::error::ErrorInternalServerError)
}

fn current_actor(req: &HttpRequest, state: &AppState) -> Option<(SessionRecord, Identity)> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    let session = state.sessions.get(cookie.value())?;
    let identity = state.identities.find_by_id(&session.identity_id).ok()??;
    Some((session, identity))
}

fn redirect_to(path: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, path.to_string()))
        .finish()
}

pub async fn settings_home(
    req: HttpRequest,
    path: web::Path<String>,
    config: web::Data<ValidatedConfig>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some((session, actor)) = current_actor(&req, &state) else {
        return Ok(redirect_to("/login"));
    };
    let Some(target) = resolve_target(&state, &path.into_inner())? else {
        return Ok(HttpResponse::NotFound().body("Unknown member"));
    };

    let nav = settings_nav(&state.catalog, &config, &state.rename, &actor, &target);
    let flash = state.flash.take(&session.session_id);
    let body = render_minijinja_template(
        state.templates.as_ref(),
        "rename/settings_home.html",
        context! {
            title => state.catalog.text("settings.title"),
            nav => nav,
            flash => flash.map(|message| context! {
                css_class => message.kind.css_class(),
                text => message.text,
            }),
        },
    )
    .map_err(|err| {
        log::error!("Failed to render settings page: {}", err);
        actix_web::error::ErrorInternalServerError(err)
    })?;

    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}

pub async fn change_username_screen(
    req: HttpRequest,
    path: web::Path<String>,
    config: web::Data<ValidatedConfig>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some((session, actor)) = current_actor(&req, &state) else {
        return Ok(redirect_to("/login"));
    };
    let Some(target) = resolve_target(&state, &path.into_inner())? else {
        return Ok(HttpResponse::NotFound().body("Unknown member"));
    };

    // Same predicate that hides the nav entry; no visibility/enforcement
    // drift.
    if !state.rename.can_rename(&actor, &target).unwrap_or(false) {
        return Ok(redirect_to(&config.settings_path(&target.slug)));
    }

    render_form(&state, &config, &actor, &target, &session)
}

pub async fn change_username_submit(
    req: HttpRequest,
    path: web::Path<String>,
    form: web::Form<ChangeUsernameForm>,
    config: web::Data<ValidatedConfig>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some((session, actor)) = current_actor(&req, &state) else {
        return Ok(redirect_to("/login"));
    };
    let Some(target) = resolve_target(&state, &path.into_inner())? else {
        return Ok(HttpResponse::NotFound().body("Unknown member"));
    };

    if !state.rename.can_rename(&actor, &target).unwrap_or(false) {
        return Ok(redirect_to(&config.settings_path(&target.slug)));
    }

    let form = form.into_inner();

    // No submit field: this is a plain form view, not a mutation attempt.
    if form.change_username_submit.is_none() {
        return render_form(&state, &config, &actor, &target, &session);
    }

    // Failed anti-forgery: re-render the form, touch nothing.
    let token_ok = form
        .authenticity_token
        .as_deref()
        .map(|token| {
            state
                .form_tokens
                .consume(token, RENAME_ACTION, &session.session_id)
        })
        .unwrap_or(false);
    if !token_ok {
        return render_form(&state, &config, &actor, &target, &session);
    }

    let request = RenameRequest {
        actor_id: actor.id,
        target_id: target.id,
        current_login: form
            .current_user_name
            .unwrap_or_else(|| target.login.clone()),
        requested_login: form.new_user_name.unwrap_or_default(),
    };
    let ctx = RenameContext {
        actor,
        target: target.clone(),
        session: Some(session.clone()),
    };

    match state.rename.execute(&ctx, &request).await {
        Ok(success) => {
            let flash_session = success
                .session
                .as_ref()
                .map(|record| record.session_id.clone())
                .unwrap_or_else(|| session.session_id.clone());
            state.flash.set(
                &flash_session,
                FlashKind::Success,
                state.catalog.text("rename.success"),
            );

            let mut response = HttpResponse::Found();
            response.append_header((
                header::LOCATION,
                config.rename_path(&success.identity.slug),
            ));
            if let Some(record) = &success.session {
                response.cookie(session_cookie(record));
            }
            Ok(response.finish())
        }
        Err(RenameFailure::Rejected(errors)) => {
            let message = errors
                .first()
                .map(|rejection| rejection.message.clone())
                .unwrap_or_else(|| state.catalog.text("rename.error.invalid"));
            state
                .flash
                .set(&session.session_id, FlashKind::Error, message);
            Ok(redirect_to(&config.rename_path(&target.slug)))
        }
        Err(RenameFailure::Forbidden) => {
            state.flash.set(
                &session.session_id,
                FlashKind::Error,
                state.catalog.text("rename.error.forbidden"),
            );
            Ok(redirect_to(&config.settings_path(&target.slug)))
        }
        Err(failure @ RenameFailure::Host { .. }) => {
            log::error!("Username change failed: {}", failure);
            state.flash.set(
                &session.session_id,
                FlashKind::Error,
                state.catalog.text("rename.error.host"),
            );
            Ok(redirect_to(&config.rename_path(&target.slug)))
        }
    }
}

fn render_form(
    state: &AppState,
    config: &ValidatedConfig,
    actor: &Identity,
    target: &Identity,
    session: &SessionRecord,
) -> Result<HttpResponse> {
    let token = state.form_tokens.issue(RENAME_ACTION, &session.session_id);
    let nav = settings_nav(&state.catalog, config, &state.rename, actor, target);
    let flash = state.flash.take(&session.session_id);

    let body = render_minijinja_template(
        state.templates.as_ref(),
        "rename/change_username.html",
        context! {
            title => state.catalog.text("rename.title"),
            nav => nav,
            flash => flash.map(|message| context! {
                css_class => message.kind.css_class(),
                text => message.text,
            }),
            current_login => target.login.clone(),
            action_path => config.rename_path(&target.slug),
            token => token,
            current_label => state.catalog.text("rename.form.current_label"),
            new_label => state.catalog.text("rename.form.new_label"),
            hint => state.catalog.text("rename.form.hint"),
            submit_label => state.catalog.text("rename.form.submit"),
        },
    )
    .map_err(|err| {
        log::error!("Failed to render username change form: {}", err);
        actix_web::error::ErrorInternalServerError(err)
    })?;

    Ok(HttpResponse::Ok().content_type("text/html").body(body))
}
