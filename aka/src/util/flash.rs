// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashKind::Success => "flash-success",
            FlashKind::Error => "flash-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub text: String,
}

/// One-shot user-visible messages, keyed by session. A message survives
/// exactly one redirect: `take` clears it while handing it to the renderer.
#[derive(Default)]
pub struct FlashStore {
    messages: RwLock<HashMap<String, FlashMessage>>,
}

impl FlashStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session_id: &str, kind: FlashKind, text: impl Into<String>) {
        let message = FlashMessage {
            kind,
            text: text.into(),
        };
        match self.messages.write() {
            Ok(mut guard) => {
                guard.insert(session_id.to_string(), message);
            }
            Err(poisoned) => {
                log::error!("Flash lock poisoned on set; recovering");
                poisoned
                    .into_inner()
                    .insert(session_id.to_string(), message);
            }
        }
    }

    pub fn take(&self, session_id: &str) -> Option<FlashMessage> {
        match self.messages.write() {
            Ok(mut guard) => guard.remove(session_id),
            Err(poisoned) => {
                log::error!("Flash lock poisoned on take; recovering");
                poisoned.into_inner().remove(session_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_the_message_exactly_once() {
        let store = FlashStore::new();
        store.set("s1", FlashKind::Success, "Username Changed Successfully!");

        let first = store.take("s1").expect("message");
        assert_eq!(first.kind, FlashKind::Success);
        assert_eq!(first.text, "Username Changed Successfully!");
        assert!(store.take("s1").is_none());
    }

    #[test]
    fn messages_are_scoped_to_their_session() {
        let store = FlashStore::new();
        store.set("s1", FlashKind::Error, "nope");

        assert!(store.take("s2").is_none());
        assert!(store.take("s1").is_some());
    }

    #[test]
    fn a_second_set_replaces_the_pending_message() {
        let store = FlashStore::new();
        store.set("s1", FlashKind::Error, "first");
        store.set("s1", FlashKind::Success, "second");

        let message = store.take("s1").expect("message");
        assert_eq!(message.text, "second");
    }
}
