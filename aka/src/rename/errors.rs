// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

/// Why a requested login was turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionCode {
    EmptyOrMalformed,
    Unchanged,
    AlreadyTaken,
    Reserved,
    /// Appended by an extension validation filter.
    Custom(String),
}

impl RejectionCode {
    pub fn code(&self) -> &str {
        match self {
            RejectionCode::EmptyOrMalformed => "empty_or_malformed",
            RejectionCode::Unchanged => "unchanged",
            RejectionCode::AlreadyTaken => "already_taken",
            RejectionCode::Reserved => "reserved",
            RejectionCode::Custom(code) => code,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenameRejection {
    pub code: RejectionCode,
    pub message: String,
}

impl RenameRejection {
    pub fn new(code: RejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Accumulating validation error container.
///
/// Several rejections can be registered in one pass (an extension filter may
/// add one after a built-in check already has), but only the first is ever
/// shown to the user.
#[derive(Debug, Clone, Default)]
pub struct RenameErrors {
    rejections: Vec<RenameRejection>,
}

impl RenameErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rejection: RenameRejection) {
        self.rejections.push(rejection);
    }

    pub fn is_empty(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rejections.len()
    }

    /// The rejection surfaced to the user: the first one registered.
    pub fn first(&self) -> Option<&RenameRejection> {
        self.rejections.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenameRejection> {
        self.rejections.iter()
    }
}

/// Stage names of the rename state machine, carried by host failures so a
/// partial application is at least attributable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStage {
    Validating,
    Mutating,
    CacheInvalidating,
    SessionUpdating,
    PrivilegeRestoring,
    Notifying,
}

impl RenameStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenameStage::Validating => "validating",
            RenameStage::Mutating => "mutating",
            RenameStage::CacheInvalidating => "cache_invalidating",
            RenameStage::SessionUpdating => "session_updating",
            RenameStage::PrivilegeRestoring => "privilege_restoring",
            RenameStage::Notifying => "notifying",
        }
    }
}

#[derive(Debug)]
pub enum RenameFailure {
    /// The actor may not rename this identity at all.
    Forbidden,
    /// Validation turned the request down; nothing was mutated.
    Rejected(RenameErrors),
    /// A collaborator failed after validation had already passed. Distinct
    /// from a rejection: state may have been partially applied.
    Host {
        stage: RenameStage,
        message: String,
    },
}

impl std::fmt::Display for RenameFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenameFailure::Forbidden => write!(f, "Rename not permitted"),
            RenameFailure::Rejected(errors) => match errors.first() {
                Some(rejection) => write!(f, "{}", rejection.message),
                None => write!(f, "Rename rejected"),
            },
            RenameFailure::Host { stage, message } => {
                write!(f, "Rename failed while {}: {}", stage.as_str(), message)
            }
        }
    }
}

impl std::error::Error for RenameFailure {}
