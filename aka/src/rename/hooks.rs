// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::errors::{RenameErrors, RenameRejection};
use super::nav::NavItem;
use super::transaction::{RenameCompleted, RenameRequest};
use crate::identity::Identity;

type AccessFilter = Box<dyn Fn(&Identity, &Identity, bool) -> bool + Send + Sync>;
type ValidationFilter = Box<dyn Fn(&RenameRequest, &Identity) -> Option<RenameRejection> + Send + Sync>;
type ReservedOverride = Box<dyn Fn(&str, bool) -> bool + Send + Sync>;
type NavHook = Box<dyn Fn(&mut Vec<NavItem>) + Send + Sync>;
type BeforeObserver = Box<dyn Fn(&RenameRequest) + Send + Sync>;
type RejectedObserver = Box<dyn Fn(&RenameRequest, &RenameErrors) + Send + Sync>;
type CompletedObserver = Box<dyn Fn(&RenameCompleted) + Send + Sync>;

/// Extension seams for the rename feature.
///
/// Collaborators register typed callbacks at wiring time; the registry is
/// then shared read-only. Filters transform a verdict and run in
/// registration order; observers are fire-and-forget.
#[derive(Default)]
pub struct RenameHooks {
    access_filters: Vec<AccessFilter>,
    validation_filters: Vec<ValidationFilter>,
    reserved_overrides: Vec<ReservedOverride>,
    nav_hooks: Vec<NavHook>,
    before_observers: Vec<BeforeObserver>,
    rejected_observers: Vec<RejectedObserver>,
    completed_observers: Vec<CompletedObserver>,
}

impl RenameHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow or widen who may rename whom. Receives (actor, target,
    /// verdict-so-far) and returns the new verdict.
    pub fn filter_access(
        &mut self,
        filter: impl Fn(&Identity, &Identity, bool) -> bool + Send + Sync + 'static,
    ) {
        self.access_filters.push(Box::new(filter));
    }

    /// Append extra rejections after the built-in validation checks.
    pub fn filter_validation(
        &mut self,
        filter: impl Fn(&RenameRequest, &Identity) -> Option<RenameRejection> + Send + Sync + 'static,
    ) {
        self.validation_filters.push(Box::new(filter));
    }

    /// Override the final reserved verdict for a requested login.
    pub fn override_reserved(
        &mut self,
        filter: impl Fn(&str, bool) -> bool + Send + Sync + 'static,
    ) {
        self.reserved_overrides.push(Box::new(filter));
    }

    /// Adjust the settings sub-navigation before it is registered.
    pub fn on_nav_setup(&mut self, hook: impl Fn(&mut Vec<NavItem>) + Send + Sync + 'static) {
        self.nav_hooks.push(Box::new(hook));
    }

    pub fn on_before_rename(&mut self, observer: impl Fn(&RenameRequest) + Send + Sync + 'static) {
        self.before_observers.push(Box::new(observer));
    }

    pub fn on_rename_rejected(
        &mut self,
        observer: impl Fn(&RenameRequest, &RenameErrors) + Send + Sync + 'static,
    ) {
        self.rejected_observers.push(Box::new(observer));
    }

    pub fn on_rename_completed(
        &mut self,
        observer: impl Fn(&RenameCompleted) + Send + Sync + 'static,
    ) {
        self.completed_observers.push(Box::new(observer));
    }

    pub fn apply_access_filters(&self, actor: &Identity, target: &Identity, verdict: bool) -> bool {
        self.access_filters
            .iter()
            .fold(verdict, |verdict, filter| filter(actor, target, verdict))
    }

    pub fn run_validation_filters(
        &self,
        request: &RenameRequest,
        target: &Identity,
        errors: &mut RenameErrors,
    ) {
        for filter in &self.validation_filters {
            if let Some(rejection) = filter(request, target) {
                errors.add(rejection);
            }
        }
    }

    pub fn apply_reserved_overrides(&self, requested: &str, verdict: bool) -> bool {
        self.reserved_overrides
            .iter()
            .fold(verdict, |verdict, filter| filter(requested, verdict))
    }

    pub fn run_nav_hooks(&self, items: &mut Vec<NavItem>) {
        for hook in &self.nav_hooks {
            hook(items);
        }
    }

    pub fn notify_before(&self, request: &RenameRequest) {
        for observer in &self.before_observers {
            observer(request);
        }
    }

    pub fn notify_rejected(&self, request: &RenameRequest, errors: &RenameErrors) {
        for observer in &self.rejected_observers {
            observer(request, errors);
        }
    }

    pub fn notify_completed(&self, event: &RenameCompleted) {
        for observer in &self.completed_observers {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::slugify;
    use crate::rename::errors::RejectionCode;
    use uuid::Uuid;

    fn identity(login: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            login: login.to_string(),
            slug: slugify(login),
            display_name: login.to_string(),
        }
    }

    fn request(target: &Identity, requested: &str) -> RenameRequest {
        RenameRequest {
            actor_id: target.id,
            target_id: target.id,
            current_login: target.login.clone(),
            requested_login: requested.to_string(),
        }
    }

    #[test]
    fn access_filters_chain_on_the_previous_verdict() {
        let mut hooks = RenameHooks::new();
        hooks.filter_access(|_, _, _| true);
        hooks.filter_access(|actor, _, verdict| verdict && actor.login != "mallory");

        let alice = identity("alice");
        let mallory = identity("mallory");

        assert!(hooks.apply_access_filters(&alice, &alice, false));
        assert!(!hooks.apply_access_filters(&mallory, &alice, false));
    }

    #[test]
    fn validation_filters_append_rejections() {
        let mut hooks = RenameHooks::new();
        hooks.filter_validation(|request, _| {
            if request.requested_login.contains("bad") {
                Some(RenameRejection::new(
                    RejectionCode::Custom("profanity".to_string()),
                    "That name is not allowed.",
                ))
            } else {
                None
            }
        });

        let alice = identity("alice");
        let mut errors = RenameErrors::new();
        hooks.run_validation_filters(&request(&alice, "bad-name"), &alice, &mut errors);
        assert_eq!(errors.len(), 1);

        let mut clean = RenameErrors::new();
        hooks.run_validation_filters(&request(&alice, "fine"), &alice, &mut clean);
        assert!(clean.is_empty());
    }

    #[test]
    fn reserved_overrides_can_flip_the_verdict_both_ways() {
        let mut hooks = RenameHooks::new();
        hooks.override_reserved(|requested, verdict| {
            if requested == "vip" { true } else { verdict }
        });

        assert!(hooks.apply_reserved_overrides("vip", false));
        assert!(hooks.apply_reserved_overrides("admin", true));
        assert!(!hooks.apply_reserved_overrides("alice", false));
    }
}
