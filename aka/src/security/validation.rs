// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

/// Validate a requested login against the platform's identifier rules.
/// Allows letters, numbers, spaces, underscores, hyphens, periods and `@`,
/// within the configured length bounds. Returns the trimmed login.
pub fn validate_username(login: &str, min_chars: usize, max_chars: usize) -> Result<String, String> {
    let trimmed = login.trim();
    if trimmed.is_empty() {
        return Err("Username is required".to_string());
    }

    let length = trimmed.chars().count();
    if length < min_chars || length > max_chars {
        return Err(format!(
            "Username must be between {} and {} characters",
            min_chars, max_chars
        ));
    }

    for c in trimmed.chars() {
        if !c.is_ascii_alphanumeric() && !" _-.@".contains(c) {
            return Err(format!("Username contains an invalid character: '{}'", c));
        }
    }

    Ok(trimmed.to_string())
}
