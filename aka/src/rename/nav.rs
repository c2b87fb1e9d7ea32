// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::transaction::RenameTransaction;
use crate::config::ValidatedConfig;
use crate::i18n::Catalog;
use crate::identity::Identity;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct NavItem {
    pub title: String,
    pub path: String,
    pub position: i32,
}

/// Settings sub-navigation for the displayed identity.
///
/// The Change Username entry appears iff `can_rename` grants the actor
/// access — the same predicate the transaction enforces, so a visible entry
/// can never lead to a forbidden submit (nor the other way around). The nav
/// pre-hook runs before the items are sorted and registered.
pub fn settings_nav(
    catalog: &Catalog,
    config: &ValidatedConfig,
    transaction: &RenameTransaction,
    actor: &Identity,
    target: &Identity,
) -> Vec<NavItem> {
    let mut items = vec![NavItem {
        title: catalog.text("nav.settings.general"),
        path: config.settings_path(&target.slug),
        position: 10,
    }];

    if transaction.can_rename(actor, target).unwrap_or(false) {
        items.push(NavItem {
            title: catalog.text("nav.settings.change_username"),
            path: config.rename_path(&target.slug),
            position: 30,
        });
    }

    transaction.hooks().run_nav_hooks(&mut items);
    items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.title.cmp(&b.title)));
    items
}
