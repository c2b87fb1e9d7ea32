// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

const FORM_TOKEN_EXPIRY_SECONDS: u64 = 3600;

/// Action name binding the username-change form tokens.
pub const RENAME_ACTION: &str = "settings_change_username";

#[derive(Clone, Debug)]
struct FormTokenData {
    created_at: Instant,
    action: String,
    session_id: String,
}

/// Single-use anti-forgery tokens for form posts, bound to an action name
/// and the submitting session. Tokens are consumed on validation, so a
/// replayed form post fails even inside the expiry window.
#[derive(Clone)]
pub struct FormTokenStore {
    sender: mpsc::Sender<FormTokenCommand>,
}

enum FormTokenCommand {
    Issue {
        action: String,
        session_id: String,
        reply: mpsc::Sender<String>,
    },
    Consume {
        token_value: String,
        action: String,
        session_id: String,
        reply: mpsc::Sender<bool>,
    },
}

impl FormTokenStore {
    pub fn new() -> Self {
        FormTokenStore {
            sender: start_form_token_worker(),
        }
    }

    fn request<T>(&self, build: impl FnOnce(mpsc::Sender<T>) -> FormTokenCommand, fallback: T) -> T {
        let (reply, receive) = mpsc::channel();
        if self.sender.send(build(reply)).is_err() {
            log::error!("FormTokenStore channel closed");
            return fallback;
        }
        receive.recv().unwrap_or(fallback)
    }

    /// Issue a fresh token for a form render.
    pub fn issue(&self, action: &str, session_id: &str) -> String {
        self.request(
            |reply| FormTokenCommand::Issue {
                action: action.to_string(),
                session_id: session_id.to_string(),
                reply,
            },
            String::new(),
        )
    }

    /// Validate and consume a submitted token. Returns false for unknown,
    /// expired, replayed or cross-session/cross-action tokens.
    pub fn consume(&self, token_value: &str, action: &str, session_id: &str) -> bool {
        self.request(
            |reply| FormTokenCommand::Consume {
                token_value: token_value.to_string(),
                action: action.to_string(),
                session_id: session_id.to_string(),
                reply,
            },
            false,
        )
    }
}

impl Default for FormTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

fn start_form_token_worker() -> mpsc::Sender<FormTokenCommand> {
    let (sender, receiver) = mpsc::channel();
    let thread = thread::Builder::new().name("form-token-store".to_string());
    if let Err(err) = thread.spawn(move || run_form_token_worker(receiver)) {
        log::error!("FormTokenStore worker failed to start: {}", err);
    }
    sender
}

fn run_form_token_worker(receiver: mpsc::Receiver<FormTokenCommand>) {
    let mut tokens: HashMap<String, FormTokenData> = HashMap::new();
    while let Ok(command) = receiver.recv() {
        let now = Instant::now();
        cleanup_expired_tokens(&mut tokens, now);
        match command {
            FormTokenCommand::Issue {
                action,
                session_id,
                reply,
            } => {
                let token_value = Uuid::new_v4().to_string();
                tokens.insert(
                    token_value.clone(),
                    FormTokenData {
                        created_at: now,
                        action,
                        session_id,
                    },
                );
                let _ = reply.send(token_value);
            }
            FormTokenCommand::Consume {
                token_value,
                action,
                session_id,
                reply,
            } => {
                let is_valid = match tokens.remove(&token_value) {
                    Some(data) => {
                        if data.action == action && data.session_id == session_id {
                            true
                        } else {
                            log::warn!(
                                "Form token binding mismatch for action {}; discarding",
                                action
                            );
                            false
                        }
                    }
                    None => false,
                };
                let _ = reply.send(is_valid);
            }
        }
    }
}

fn cleanup_expired_tokens(tokens: &mut HashMap<String, FormTokenData>, now: Instant) {
    tokens.retain(|_, data| {
        now.duration_since(data.created_at) < Duration::from_secs(FORM_TOKEN_EXPIRY_SECONDS)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_once() {
        let store = FormTokenStore::new();
        let token = store.issue(RENAME_ACTION, "session-1");
        assert!(!token.is_empty());

        assert!(store.consume(&token, RENAME_ACTION, "session-1"));
        // Consumed on use; a replay fails.
        assert!(!store.consume(&token, RENAME_ACTION, "session-1"));
    }

    #[test]
    fn token_is_bound_to_its_session() {
        let store = FormTokenStore::new();
        let token = store.issue(RENAME_ACTION, "session-1");

        assert!(!store.consume(&token, RENAME_ACTION, "session-2"));
        // The mismatch discarded the token entirely.
        assert!(!store.consume(&token, RENAME_ACTION, "session-1"));
    }

    #[test]
    fn token_is_bound_to_its_action() {
        let store = FormTokenStore::new();
        let token = store.issue(RENAME_ACTION, "session-1");

        assert!(!store.consume(&token, "settings_delete_account", "session-1"));
    }

    #[test]
    fn unknown_tokens_fail() {
        let store = FormTokenStore::new();
        assert!(!store.consume("not-a-token", RENAME_ACTION, "session-1"));
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let store = FormTokenStore::new();
        let first = store.issue(RENAME_ACTION, "session-1");
        let second = store.issue(RENAME_ACTION, "session-1");
        assert_ne!(first, second);
    }
}
