// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::collections::HashMap;
use std::path::Path;

/// Built-in English strings. A locale file only needs to override the keys
/// it translates; everything else falls back to these.
const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    ("rename.title", "Change Username"),
    ("rename.form.current_label", "Current User name"),
    ("rename.form.new_label", "New User name"),
    ("rename.form.hint", "Enter the new Username of your choice"),
    ("rename.form.submit", "Save Changes"),
    ("rename.success", "Username Changed Successfully!"),
    ("rename.error.invalid", "Please enter a valid Username!"),
    ("rename.error.unchanged", "Please enter a different Username!"),
    (
        "rename.error.taken",
        "The Username {name} already exists. Please use a different username!",
    ),
    (
        "rename.error.reserved",
        "The Username {name} is reserved. Please choose a different username!",
    ),
    (
        "rename.error.forbidden",
        "You are not allowed to change this username.",
    ),
    (
        "rename.error.host",
        "Something went wrong while changing the username. Please try again.",
    ),
    ("settings.title", "Settings"),
    ("nav.settings.general", "General"),
    ("nav.settings.change_username", "Change Username"),
    ("login.title", "Log in"),
    ("login.form.login_label", "User name"),
    ("login.form.remember_label", "Keep me signed in"),
    ("login.form.submit", "Log In"),
    ("login.error.unknown", "Unknown user name."),
];

/// Message catalog: English defaults plus optional per-locale overrides
/// loaded from `<root>/locales/<locale>.yaml`.
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        let messages = DEFAULT_MESSAGES
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { messages }
    }

    /// Load the catalog for a locale. A missing locale file is not an
    /// error; an unreadable one is logged and skipped.
    pub fn load(locales_dir: &Path, locale: &str) -> Self {
        let mut catalog = Self::new();
        let locale_file = locales_dir.join(format!("{}.yaml", locale));
        if !locale_file.is_file() {
            return catalog;
        }

        match std::fs::read_to_string(&locale_file) {
            Ok(content) => match serde_yaml::from_str::<HashMap<String, String>>(&content) {
                Ok(overrides) => {
                    log::info!(
                        "Loaded {} message override(s) for locale {}",
                        overrides.len(),
                        locale
                    );
                    catalog.messages.extend(overrides);
                }
                Err(err) => {
                    log::warn!("Ignoring malformed locale file {}: {}", locale, err);
                }
            },
            Err(err) => {
                log::warn!("Failed to read locale file {}: {}", locale, err);
            }
        }

        catalog
    }

    pub fn text(&self, key: &str) -> String {
        match self.messages.get(key) {
            Some(message) => message.clone(),
            None => {
                log::warn!("Missing catalog message: {}", key);
                key.to_string()
            }
        }
    }

    /// Render a message with `{placeholder}` substitutions.
    pub fn format(&self, key: &str, vars: &[(&str, &str)]) -> String {
        let mut message = self.text(key);
        for (name, value) in vars {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        message
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_rename_strings() {
        let catalog = Catalog::new();
        assert_eq!(catalog.text("rename.success"), "Username Changed Successfully!");
        assert_eq!(
            catalog.format("rename.error.taken", &[("name", "alice")]),
            "The Username alice already exists. Please use a different username!"
        );
    }

    #[test]
    fn missing_keys_fall_back_to_the_key_itself() {
        let catalog = Catalog::new();
        assert_eq!(catalog.text("no.such.key"), "no.such.key");
    }

    #[test]
    fn locale_file_overrides_only_its_keys() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join("de_DE.yaml"),
            "rename.title: \"Benutzernamen \u{00e4}ndern\"\n",
        )
        .expect("write locale");

        let catalog = Catalog::load(temp.path(), "de_DE");
        assert_eq!(catalog.text("rename.title"), "Benutzernamen ändern");
        assert_eq!(catalog.text("rename.success"), "Username Changed Successfully!");
    }

    #[test]
    fn missing_locale_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let catalog = Catalog::load(temp.path(), "fr_FR");
        assert_eq!(catalog.text("rename.title"), "Change Username");
    }
}
