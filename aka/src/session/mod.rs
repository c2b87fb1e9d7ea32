// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::identity::Identity;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "aka_session";

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub identity_id: Uuid,
    pub login: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum SessionError {
    UnknownSession,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::UnknownSession => write!(f, "Session is unknown or expired"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Cookie-backed session records.
///
/// A session is bound to the login it was issued against. Renaming an
/// identity therefore reissues the active session (new id, new login) while
/// preserving the remember-me window the user previously had.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    default_ttl: Duration,
    remember_ttl: Duration,
}

impl SessionStore {
    pub fn new(default_ttl: Duration, remember_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_ttl,
            remember_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn with_sessions_read<T>(&self, f: impl FnOnce(&HashMap<String, SessionRecord>) -> T) -> T {
        match self.sessions.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => {
                log::error!("Session lock poisoned on read; recovering");
                f(&poisoned.into_inner())
            }
        }
    }

    fn with_sessions_write<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, SessionRecord>) -> T,
    ) -> T {
        match self.sessions.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => {
                log::error!("Session lock poisoned on write; recovering");
                f(&mut poisoned.into_inner())
            }
        }
    }

    pub fn issue(&self, identity: &Identity, remember: bool) -> SessionRecord {
        let now = Utc::now();
        let ttl = if remember {
            self.remember_ttl
        } else {
            self.default_ttl
        };
        let record = SessionRecord {
            session_id: Uuid::new_v4().to_string(),
            identity_id: identity.id,
            login: identity.login.clone(),
            issued_at: now,
            expires_at: now + ttl,
        };
        self.with_sessions_write(|sessions| {
            sessions.insert(record.session_id.clone(), record.clone());
        });
        record
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        let now = Utc::now();
        self.with_sessions_read(|sessions| {
            sessions
                .get(session_id)
                .filter(|record| record.expires_at > now)
                .cloned()
        })
    }

    pub fn revoke(&self, session_id: &str) {
        self.with_sessions_write(|sessions| {
            sessions.remove(session_id);
        });
    }

    /// Replace a session after its identity was renamed.
    ///
    /// The new record carries the new login under a fresh id. The prior
    /// remember-me choice is preserved by comparison: a remaining lifetime
    /// beyond the platform default means the long-lived option was active.
    pub fn reissue_after_rename(
        &self,
        session_id: &str,
        identity: &Identity,
    ) -> Result<SessionRecord, SessionError> {
        let now = Utc::now();
        self.with_sessions_write(|sessions| {
            let old = sessions
                .remove(session_id)
                .filter(|record| record.expires_at > now)
                .ok_or(SessionError::UnknownSession)?;

            let remember = old.expires_at - now > self.default_ttl;
            let ttl = if remember {
                self.remember_ttl
            } else {
                self.default_ttl
            };
            let record = SessionRecord {
                session_id: Uuid::new_v4().to_string(),
                identity_id: identity.id,
                login: identity.login.clone(),
                issued_at: now,
                expires_at: now + ttl,
            };
            sessions.insert(record.session_id.clone(), record.clone());
            Ok(record)
        })
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.with_sessions_read(|sessions| sessions.len())
    }
}
