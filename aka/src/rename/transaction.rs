// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::errors::{
    RejectionCode, RenameErrors, RenameFailure, RenameRejection, RenameStage,
};
use super::hooks::RenameHooks;
use super::policy::RenamePolicy;
use crate::config::ValidatedConfig;
use crate::i18n::Catalog;
use crate::identity::{
    CacheLayer, IDENTITY_BY_ID, IDENTITY_BY_LOGIN, Identity, IdentityProfile, IdentityService,
    PROFILE_PATH,
};
use crate::security::validate_username;
use crate::session::{SessionRecord, SessionStore};
use std::sync::Arc;
use uuid::Uuid;

/// One rename attempt, built from untrusted input at the start of a request
/// and discarded at the end. The target id is resolved from the displayed
/// profile by the caller, never from a request field.
#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub actor_id: Uuid,
    pub target_id: Uuid,
    /// As asserted by the caller; only used to pre-evict lookup caches.
    pub current_login: String,
    pub requested_login: String,
}

/// Payload handed to completion observers.
#[derive(Debug, Clone)]
pub struct RenameCompleted {
    pub new_login: String,
    pub previous: Identity,
    pub current: Identity,
}

/// Actor, target and active session as resolved by the caller before the
/// transaction runs. No ambient request state is consulted.
#[derive(Debug, Clone)]
pub struct RenameContext {
    pub actor: Identity,
    pub target: Identity,
    pub session: Option<SessionRecord>,
}

#[derive(Debug)]
pub struct RenameSuccess {
    pub identity: Identity,
    /// Present when the actor renamed themself and the session was reissued.
    pub session: Option<SessionRecord>,
}

/// The rename transaction: a single guarded state transition over the
/// identity store.
///
/// Per invocation: `Validating → {Rejected | Mutating → CacheInvalidating →
/// SessionUpdating? → PrivilegeRestoring? → Notifying → Completed}`. There
/// is no retry and no partial-completion resumption; concurrent renames of
/// the same identity are a known race the surrounding request model is
/// expected to avoid.
pub struct RenameTransaction {
    identities: Arc<IdentityService>,
    cache: Arc<dyn CacheLayer>,
    sessions: Arc<SessionStore>,
    policy: RenamePolicy,
    hooks: Arc<RenameHooks>,
    catalog: Arc<Catalog>,
    username_min_chars: usize,
    username_max_chars: usize,
}

impl RenameTransaction {
    pub fn new(
        config: &ValidatedConfig,
        identities: Arc<IdentityService>,
        cache: Arc<dyn CacheLayer>,
        sessions: Arc<SessionStore>,
        hooks: Arc<RenameHooks>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            identities,
            cache,
            sessions,
            policy: RenamePolicy::from_config(config),
            hooks,
            catalog,
            username_min_chars: config.username_min_chars,
            username_max_chars: config.username_max_chars,
        }
    }

    pub fn hooks(&self) -> &RenameHooks {
        &self.hooks
    }

    /// Whether `actor` may rename `target`. The navigation entry point and
    /// the transaction itself share this predicate, so visibility and
    /// enforcement cannot drift apart.
    pub fn can_rename(&self, actor: &Identity, target: &Identity) -> Result<bool, RenameFailure> {
        let base = actor.id == target.id
            || self
                .identities
                .is_network_admin(&actor.login)
                .map_err(|err| host_failure(RenameStage::Validating, err))?;
        Ok(self.hooks.apply_access_filters(actor, target, base))
    }

    pub async fn execute(
        &self,
        ctx: &RenameContext,
        request: &RenameRequest,
    ) -> Result<RenameSuccess, RenameFailure> {
        if !self.can_rename(&ctx.actor, &ctx.target)? {
            return Err(RenameFailure::Forbidden);
        }

        self.hooks.notify_before(request);

        let actor_is_admin = self
            .identities
            .is_network_admin(&ctx.actor.login)
            .map_err(|err| host_failure(RenameStage::Validating, err))?;

        let requested = request.requested_login.trim().to_string();
        let mut errors = RenameErrors::new();
        if let Some(rejection) =
            self.first_builtin_rejection(&requested, &request.current_login, &ctx.target, actor_is_admin)?
        {
            errors.add(rejection);
        }

        // Extension rejections run after the built-in checks and may stack
        // on top of an existing one; the first registered error is surfaced.
        self.hooks
            .run_validation_filters(request, &ctx.target, &mut errors);

        if !errors.is_empty() {
            self.hooks.notify_rejected(request, &errors);
            return Err(RenameFailure::Rejected(errors));
        }

        let previous = ctx.target.clone();

        // Login-keyed privilege must be parked before the record mutates or
        // the entry would detach from the renamed identity.
        let held_privilege = self.policy.multi_tenant()
            && self
                .identities
                .is_network_admin(&previous.login)
                .map_err(|err| host_failure(RenameStage::Mutating, err))?;
        if held_privilege {
            self.identities
                .revoke_network_admin(&previous.login)
                .await
                .map_err(|err| host_failure(RenameStage::Mutating, err))?;
        }

        // Two-path mutation: the friendly update recomputes the slug but
        // does not carry the login column, so the raw write must follow.
        let profile = IdentityProfile {
            id: previous.id,
            login: requested.clone(),
            display_name: previous.display_name.clone(),
        };
        if let Err(err) = self.identities.update_profile(profile).await {
            return self
                .abort_after_revoke(held_privilege, &previous.login, RenameStage::Mutating, err)
                .await;
        }
        if let Err(err) = self.identities.write_login(previous.id, &requested).await {
            return self
                .abort_after_revoke(held_privilege, &previous.login, RenameStage::Mutating, err)
                .await;
        }

        // Derived caches are stale now; eviction is fire-and-forget.
        let id_key = previous.id.to_string();
        let evictions = [
            (IDENTITY_BY_ID, id_key.as_str()),
            (IDENTITY_BY_LOGIN, previous.login.as_str()),
            (IDENTITY_BY_LOGIN, requested.as_str()),
            (PROFILE_PATH, id_key.as_str()),
        ];
        for (namespace, key) in evictions {
            if let Err(err) = self.cache.evict(namespace, key) {
                log::debug!(
                    "Ignoring cache eviction failure for {}/{}: {}",
                    namespace,
                    key,
                    err
                );
            }
        }

        let current = match self.identities.find_by_id(&previous.id) {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                return self
                    .abort_after_revoke(
                        held_privilege,
                        &requested,
                        RenameStage::SessionUpdating,
                        "renamed identity disappeared from the store",
                    )
                    .await;
            }
            Err(err) => {
                return self
                    .abort_after_revoke(held_privilege, &requested, RenameStage::SessionUpdating, err)
                    .await;
            }
        };

        // Session continuity applies to self-renames only; a target renamed
        // by an admin keeps their session until it expires naturally.
        let mut reissued = None;
        if ctx.actor.id == ctx.target.id {
            if let Some(session) = &ctx.session {
                match self.sessions.reissue_after_rename(&session.session_id, &current) {
                    Ok(record) => reissued = Some(record),
                    Err(err) => {
                        return self
                            .abort_after_revoke(
                                held_privilege,
                                &current.login,
                                RenameStage::SessionUpdating,
                                err,
                            )
                            .await;
                    }
                }
            }
        }

        if held_privilege {
            if let Err(err) = self.identities.grant_network_admin(&current.login).await {
                log::error!(
                    "Network privilege not restored for {} after rename: {}",
                    current.login,
                    err
                );
                return Err(host_failure(RenameStage::PrivilegeRestoring, err));
            }
        }

        let event = RenameCompleted {
            new_login: current.login.clone(),
            previous: previous.clone(),
            current: current.clone(),
        };
        self.hooks.notify_completed(&event);
        log::info!(
            "Identity {} renamed from {} to {}",
            current.id,
            previous.login,
            current.login
        );

        Ok(RenameSuccess {
            identity: current,
            session: reissued,
        })
    }

    /// Built-in validation pipeline, strictly ordered, first failure wins.
    fn first_builtin_rejection(
        &self,
        requested: &str,
        asserted_current: &str,
        target: &Identity,
        actor_is_admin: bool,
    ) -> Result<Option<RenameRejection>, RenameFailure> {
        if validate_username(requested, self.username_min_chars, self.username_max_chars).is_err() {
            return Ok(Some(RenameRejection::new(
                RejectionCode::EmptyOrMalformed,
                self.catalog.text("rename.error.invalid"),
            )));
        }

        if requested == target.login {
            return Ok(Some(RenameRejection::new(
                RejectionCode::Unchanged,
                self.catalog.text("rename.error.unchanged"),
            )));
        }

        // Stale existence lookups would turn this check into a coin flip;
        // evict both keys before asking.
        for key in [requested, asserted_current] {
            if let Err(err) = self.cache.evict(IDENTITY_BY_LOGIN, key) {
                log::debug!("Ignoring cache eviction failure for login {}: {}", key, err);
            }
        }
        let taken = self
            .identities
            .login_exists(requested)
            .map_err(|err| host_failure(RenameStage::Validating, err))?;
        if taken {
            return Ok(Some(RenameRejection::new(
                RejectionCode::AlreadyTaken,
                self.catalog
                    .format("rename.error.taken", &[("name", requested)]),
            )));
        }

        let verdict = self.policy.is_reserved(requested, actor_is_admin);
        let verdict = self.hooks.apply_reserved_overrides(requested, verdict);
        if verdict {
            return Ok(Some(RenameRejection::new(
                RejectionCode::Reserved,
                self.catalog
                    .format("rename.error.reserved", &[("name", requested)]),
            )));
        }

        Ok(None)
    }

    /// Compensation for host failures past the revocation point: put the
    /// privilege back under whichever login is current, then surface the
    /// original failure as a host error.
    async fn abort_after_revoke(
        &self,
        held_privilege: bool,
        current_login: &str,
        stage: RenameStage,
        err: impl std::fmt::Display,
    ) -> Result<RenameSuccess, RenameFailure> {
        if held_privilege {
            match self.identities.grant_network_admin(current_login).await {
                Ok(()) => log::warn!(
                    "Rename failed while {}; network privilege re-granted to {}",
                    stage.as_str(),
                    current_login
                ),
                Err(grant_err) => log::error!(
                    "Rename failed while {} and privilege re-grant for {} also failed: {}",
                    stage.as_str(),
                    current_login,
                    grant_err
                ),
            }
        }
        log::error!("Rename failed while {}: {}", stage.as_str(), err);
        Err(host_failure(stage, err))
    }
}

fn host_failure(stage: RenameStage, err: impl std::fmt::Display) -> RenameFailure {
    RenameFailure::Host {
        stage,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::identity::cache::{CacheError, InMemoryCache};
    use crate::identity::store::{IdentityStore, MemoryIdentityStore};
    use crate::identity::types::{IdentitiesData, IdentityError};
    use crate::identity::slugify;
    use chrono::Duration;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CacheOp {
        Get(String, String),
        Evict(String, String),
    }

    /// Cache double that records lookups and evictions in call order.
    struct RecordingCache {
        inner: InMemoryCache,
        ops: Mutex<Vec<CacheOp>>,
    }

    impl RecordingCache {
        fn new() -> Self {
            Self {
                inner: InMemoryCache::new(),
                ops: Mutex::new(Vec::new()),
            }
        }

        fn ops(&self) -> Vec<CacheOp> {
            self.ops.lock().expect("ops lock").clone()
        }
    }

    impl CacheLayer for RecordingCache {
        fn get(&self, namespace: &str, key: &str) -> Option<serde_json::Value> {
            self.ops
                .lock()
                .expect("ops lock")
                .push(CacheOp::Get(namespace.to_string(), key.to_string()));
            self.inner.get(namespace, key)
        }

        fn put(&self, namespace: &str, key: &str, value: serde_json::Value) {
            self.inner.put(namespace, key, value);
        }

        fn evict(&self, namespace: &str, key: &str) -> Result<(), CacheError> {
            self.ops
                .lock()
                .expect("ops lock")
                .push(CacheOp::Evict(namespace.to_string(), key.to_string()));
            self.inner.evict(namespace, key)
        }
    }

    #[derive(Debug, Clone)]
    struct StoreSnapshot {
        logins: Vec<String>,
        slugs: Vec<String>,
        admins: HashSet<String>,
    }

    /// Store double that snapshots every successful save, so call order
    /// (revoke, profile update, login write, re-grant) is observable.
    struct RecordingStore {
        inner: MemoryIdentityStore,
        saves: Mutex<Vec<StoreSnapshot>>,
        fail_on_save: AtomicUsize,
        save_count: AtomicUsize,
    }

    impl RecordingStore {
        fn new(initial: IdentitiesData) -> Self {
            Self {
                inner: MemoryIdentityStore::new(initial),
                saves: Mutex::new(Vec::new()),
                fail_on_save: AtomicUsize::new(usize::MAX),
                save_count: AtomicUsize::new(0),
            }
        }

        fn fail_on_save(&self, call: usize) {
            self.fail_on_save.store(call, Ordering::SeqCst);
        }

        fn saves(&self) -> Vec<StoreSnapshot> {
            self.saves.lock().expect("saves lock").clone()
        }
    }

    impl IdentityStore for RecordingStore {
        fn load(&self) -> Result<IdentitiesData, IdentityError> {
            self.inner.load()
        }

        fn save(&self, data: &IdentitiesData) -> Result<(), IdentityError> {
            let call = self.save_count.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on_save.load(Ordering::SeqCst) {
                return Err(IdentityError::FileError(
                    "Simulated save failure".to_string(),
                ));
            }
            self.inner.save(data)?;
            let mut logins: Vec<String> = data
                .identities
                .values()
                .map(|identity| identity.login.clone())
                .collect();
            logins.sort();
            let mut slugs: Vec<String> = data
                .identities
                .values()
                .map(|identity| identity.slug.clone())
                .collect();
            slugs.sort();
            self.saves.lock().expect("saves lock").push(StoreSnapshot {
                logins,
                slugs,
                admins: data.network_admins.clone(),
            });
            Ok(())
        }
    }

    struct Scenario {
        transaction: RenameTransaction,
        identities: Arc<IdentityService>,
        sessions: Arc<SessionStore>,
        cache: Arc<RecordingCache>,
        store: Arc<RecordingStore>,
    }

    fn identity(login: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            login: login.to_string(),
            slug: slugify(login),
            display_name: login.to_string(),
        }
    }

    fn scenario_with_hooks(
        identities: &[&Identity],
        admins: &[&str],
        multi_tenant: bool,
        hooks: RenameHooks,
    ) -> Scenario {
        let mut data = IdentitiesData::new();
        for entry in identities {
            data.identities.insert(entry.id, (*entry).clone());
        }
        for admin in admins {
            data.network_admins.insert(admin.to_string());
        }

        let mut config = Config::default().validate().expect("config");
        config.multi_tenant = multi_tenant;

        let store = Arc::new(RecordingStore::new(data));
        let cache = Arc::new(RecordingCache::new());
        let service =
            Arc::new(IdentityService::new(store.clone(), cache.clone()).expect("service"));
        let sessions = Arc::new(SessionStore::new(
            Duration::minutes(120),
            Duration::days(14),
        ));
        let transaction = RenameTransaction::new(
            &config,
            service.clone(),
            cache.clone(),
            sessions.clone(),
            Arc::new(hooks),
            Arc::new(Catalog::new()),
        );

        Scenario {
            transaction,
            identities: service,
            sessions,
            cache,
            store,
        }
    }

    fn scenario(identities: &[&Identity], admins: &[&str], multi_tenant: bool) -> Scenario {
        scenario_with_hooks(identities, admins, multi_tenant, RenameHooks::new())
    }

    fn self_rename(target: &Identity, requested: &str) -> (RenameContext, RenameRequest) {
        let ctx = RenameContext {
            actor: target.clone(),
            target: target.clone(),
            session: None,
        };
        let request = RenameRequest {
            actor_id: target.id,
            target_id: target.id,
            current_login: target.login.clone(),
            requested_login: requested.to_string(),
        };
        (ctx, request)
    }

    fn rejection_code(failure: RenameFailure) -> RejectionCode {
        match failure {
            RenameFailure::Rejected(errors) => {
                errors.first().expect("at least one rejection").code.clone()
            }
            other => panic!("Expected a rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn successful_rename_updates_login_and_slug() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &[], false);
        let (ctx, request) = self_rename(&alice, "alice2");

        let success = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        assert_eq!(success.identity.login, "alice2");
        assert_eq!(success.identity.slug, slugify("alice2"));
        let stored = scenario
            .identities
            .find_by_id(&alice.id)
            .expect("find")
            .expect("identity");
        assert_eq!(stored.login, "alice2");
        assert_eq!(stored.slug, "alice2");
        assert_eq!(stored.id, alice.id);
    }

    #[tokio::test]
    async fn malformed_wins_over_taken_in_rejection_order() {
        // "bo" is both below the length floor and the login of another
        // identity; the earlier check must win.
        let alice = identity("alice");
        let bo = identity("bo");
        let scenario = scenario(&[&alice, &bo], &[], false);
        let (ctx, request) = self_rename(&alice, "bo");

        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("rejection");

        assert_eq!(rejection_code(failure), RejectionCode::EmptyOrMalformed);
    }

    #[tokio::test]
    async fn empty_request_is_rejected_as_malformed() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &[], false);
        let (ctx, request) = self_rename(&alice, "   ");

        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("rejection");

        assert_eq!(rejection_code(failure), RejectionCode::EmptyOrMalformed);
    }

    #[tokio::test]
    async fn submitting_the_current_login_is_always_unchanged() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &[], false);
        let (ctx, request) = self_rename(&alice, "alice");

        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("rejection");

        assert_eq!(rejection_code(failure), RejectionCode::Unchanged);
    }

    #[tokio::test]
    async fn taken_logins_are_rejected_case_sensitively() {
        let alice = identity("alice");
        let bob = identity("bob");
        let scenario = scenario(&[&alice, &bob], &[], false);

        let (ctx, request) = self_rename(&alice, "bob");
        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("rejection");
        assert_eq!(rejection_code(failure), RejectionCode::AlreadyTaken);

        // Exact-match semantics: a different casing is a different login.
        let (ctx, request) = self_rename(&alice, "Bob");
        assert!(scenario.transaction.execute(&ctx, &request).await.is_ok());
    }

    #[tokio::test]
    async fn reserved_names_bypass_applies_to_network_admins_only() {
        let root = identity("root-user");
        let admin_scenario = scenario(&[&root], &["root-user"], false);
        let (ctx, request) = self_rename(&root, "admin");
        let success = admin_scenario.transaction.execute(&ctx, &request).await;
        assert!(success.is_ok(), "admin alias must bypass the reserved list");

        let alice = identity("alice");
        let scenario = scenario(&[&alice], &[], false);
        let (ctx, request) = self_rename(&alice, "admin");
        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("rejection");
        assert_eq!(rejection_code(failure), RejectionCode::Reserved);
    }

    #[tokio::test]
    async fn existence_cache_is_evicted_before_the_uniqueness_lookup() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &[], false);
        let (ctx, request) = self_rename(&alice, "alice2");

        scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        let ops = scenario.cache.ops();
        let evict_requested = ops
            .iter()
            .position(|op| {
                *op == CacheOp::Evict(IDENTITY_BY_LOGIN.to_string(), "alice2".to_string())
            })
            .expect("requested login evicted");
        let evict_current = ops
            .iter()
            .position(|op| {
                *op == CacheOp::Evict(IDENTITY_BY_LOGIN.to_string(), "alice".to_string())
            })
            .expect("asserted current login evicted");
        let uniqueness_lookup = ops
            .iter()
            .position(|op| {
                *op == CacheOp::Get(IDENTITY_BY_LOGIN.to_string(), "alice2".to_string())
            })
            .expect("uniqueness lookup issued");

        assert!(evict_requested < uniqueness_lookup);
        assert!(evict_current < uniqueness_lookup);
    }

    #[tokio::test]
    async fn privilege_is_revoked_then_regranted_around_the_mutation() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &["alice"], true);
        let (ctx, request) = self_rename(&alice, "alice2");

        scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        assert!(scenario
            .identities
            .is_network_admin("alice2")
            .expect("check"));
        assert!(!scenario.identities.is_network_admin("alice").expect("check"));

        let saves = scenario.store.saves();
        let revoke = saves
            .iter()
            .position(|snapshot| !snapshot.admins.contains("alice"))
            .expect("revoke save");
        let login_write = saves
            .iter()
            .position(|snapshot| snapshot.logins.contains(&"alice2".to_string()))
            .expect("login write save");
        let regrant = saves
            .iter()
            .position(|snapshot| snapshot.admins.contains("alice2"))
            .expect("re-grant save");
        assert!(revoke < login_write, "revoke must precede the mutation");
        assert!(login_write < regrant, "re-grant must follow the mutation");
    }

    #[tokio::test]
    async fn single_tenant_platforms_skip_the_privilege_dance() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &["alice"], false);
        let (ctx, request) = self_rename(&alice, "alice2");

        scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        // The set entry is left untouched (and now stale) on purpose: the
        // revoke/re-grant dance is multi-tenant behavior.
        assert!(scenario.identities.is_network_admin("alice").expect("check"));
    }

    #[tokio::test]
    async fn session_is_reissued_for_self_rename_only() {
        // Admin renames bob: bob's session must not move.
        let admin = identity("the-admin");
        let bob = identity("bob");
        let admin_scenario = scenario(&[&admin, &bob], &["the-admin"], false);
        let bob_session = admin_scenario.sessions.issue(&bob, false);

        let ctx = RenameContext {
            actor: admin.clone(),
            target: bob.clone(),
            session: Some(admin_scenario.sessions.issue(&admin, false)),
        };
        let request = RenameRequest {
            actor_id: admin.id,
            target_id: bob.id,
            current_login: bob.login.clone(),
            requested_login: "robert".to_string(),
        };
        let success = admin_scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        assert!(success.session.is_none());
        let untouched = admin_scenario
            .sessions
            .get(&bob_session.session_id)
            .expect("bob session");
        assert_eq!(untouched.login, "bob");

        // Self-rename: the session moves to the new login under a new id.
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &[], false);
        let session = scenario.sessions.issue(&alice, true);
        let ctx = RenameContext {
            actor: alice.clone(),
            target: alice.clone(),
            session: Some(session.clone()),
        };
        let request = RenameRequest {
            actor_id: alice.id,
            target_id: alice.id,
            current_login: alice.login.clone(),
            requested_login: "alice2".to_string(),
        };
        let success = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        let reissued = success.session.expect("reissued session");
        assert_eq!(reissued.login, "alice2");
        assert_ne!(reissued.session_id, session.session_id);
        assert!(scenario.sessions.get(&session.session_id).is_none());
    }

    #[tokio::test]
    async fn completion_observers_see_old_and_new_state() {
        let events: Arc<Mutex<Vec<(String, String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let mut hooks = RenameHooks::new();
        hooks.on_rename_completed(move |event| {
            events_clone.lock().expect("events lock").push((
                event.new_login.clone(),
                event.previous.login.clone(),
                event.current.login.clone(),
            ));
        });

        let alice = identity("alice");
        let scenario = scenario_with_hooks(&[&alice], &[], false, hooks);
        let (ctx, request) = self_rename(&alice, "alice2");
        scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect("rename");

        let events = events.lock().expect("events lock");
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            (
                "alice2".to_string(),
                "alice".to_string(),
                "alice2".to_string()
            )
        );
    }

    #[tokio::test]
    async fn extension_rejections_stack_behind_builtin_ones() {
        let mut hooks = RenameHooks::new();
        hooks.filter_validation(|_, _| {
            Some(RenameRejection::new(
                RejectionCode::Custom("house-rule".to_string()),
                "House rules forbid this name.",
            ))
        });
        let observed = Arc::new(Mutex::new(0usize));
        let observed_clone = observed.clone();
        hooks.on_rename_rejected(move |_, errors| {
            *observed_clone.lock().expect("observed lock") = errors.len();
        });

        let alice = identity("alice");
        let scenario = scenario_with_hooks(&[&alice], &[], false, hooks);
        let (ctx, request) = self_rename(&alice, "alice");

        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("rejection");

        // Both flags registered; the built-in one is surfaced.
        assert_eq!(*observed.lock().expect("observed lock"), 2);
        assert_eq!(rejection_code(failure), RejectionCode::Unchanged);

        let stored = scenario
            .identities
            .find_by_id(&alice.id)
            .expect("find")
            .expect("identity");
        assert_eq!(stored.login, "alice");
    }

    #[tokio::test]
    async fn third_parties_are_forbidden_unless_a_filter_grants_access() {
        let alice = identity("alice");
        let carol = identity("carol");
        let scenario = scenario(&[&alice, &carol], &[], false);

        let ctx = RenameContext {
            actor: carol.clone(),
            target: alice.clone(),
            session: None,
        };
        let request = RenameRequest {
            actor_id: carol.id,
            target_id: alice.id,
            current_login: alice.login.clone(),
            requested_login: "alice2".to_string(),
        };
        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("forbidden");
        assert!(matches!(failure, RenameFailure::Forbidden));
        let stored = scenario
            .identities
            .find_by_id(&alice.id)
            .expect("find")
            .expect("identity");
        assert_eq!(stored.login, "alice");

        // An access filter may widen the predicate.
        let mut hooks = RenameHooks::new();
        hooks.filter_access(|actor, _, verdict| verdict || actor.login == "carol");
        let scenario = scenario_with_hooks(&[&alice, &carol], &[], false, hooks);
        let success = scenario.transaction.execute(&ctx, &request).await;
        assert!(success.is_ok());
    }

    #[tokio::test]
    async fn failed_mutation_regrants_the_revoked_privilege() {
        let alice = identity("alice");
        let scenario = scenario(&[&alice], &["alice"], true);
        // Save #1 is the revoke; save #2 (the profile update) fails.
        scenario.store.fail_on_save(2);

        let (ctx, request) = self_rename(&alice, "alice2");
        let failure = scenario
            .transaction
            .execute(&ctx, &request)
            .await
            .expect_err("host failure");

        match failure {
            RenameFailure::Host { stage, .. } => assert_eq!(stage, RenameStage::Mutating),
            other => panic!("Expected a host failure, got {:?}", other),
        }
        // Compensated: the privilege is back under the unchanged login.
        assert!(scenario.identities.is_network_admin("alice").expect("check"));
        let stored = scenario
            .identities
            .find_by_id(&alice.id)
            .expect("find")
            .expect("identity");
        assert_eq!(stored.login, "alice");
    }
}
