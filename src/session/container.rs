use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

use crate::remote::{AuthEvent, RemoteServices, Session};
use crate::storage::{AppState, LocalSlots, Memory, ProfilePatch, Slot};

use super::auth::{describe, AuthPhase, Route};
use super::cache::CacheMirror;
use super::loader::SessionLoader;
use super::pipeline::{AddMemory, AddOutcome, DeleteMemory, DeleteOutcome, SyncLedger, SyncStatus};

/// Sole owner of the application state.
///
/// Readers get snapshots; every change goes through a named operation, is made
/// under the state lock and mirrored to the local cache before the lock is
/// released. Locks are never held across a backend call.
pub struct SessionContainer {
    state: Mutex<AppState>,
    phase: Mutex<AuthPhase>,
    ledger: Mutex<SyncLedger>,
    mirror: CacheMirror,
    loader: SessionLoader,
    pub(super) services: RemoteServices,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionContainer {
    /// Start from the cached state (or the sample) in the Loading phase.
    /// Nothing is written until `initialize` has run.
    pub fn new(services: RemoteServices, slots: LocalSlots) -> Self {
        let mirror = CacheMirror::new(slots);
        let state = mirror.restore_or_sample();
        Self {
            state: Mutex::new(state),
            phase: Mutex::new(AuthPhase::Loading),
            ledger: Mutex::new(SyncLedger::default()),
            loader: SessionLoader::new(services.store.clone()),
            mirror,
            services,
        }
    }

    // ===== Reads =====

    pub fn snapshot(&self) -> AppState {
        lock(&self.state).clone()
    }

    pub fn memories(&self) -> Vec<Memory> {
        lock(&self.state).memories.clone()
    }

    pub fn memory(&self, id: &str) -> Option<Memory> {
        lock(&self.state).memory(id).cloned()
    }

    pub fn phase(&self) -> AuthPhase {
        lock(&self.phase).clone()
    }

    pub fn sync_status(&self, id: &str) -> Option<SyncStatus> {
        lock(&self.ledger).get(id).cloned()
    }

    pub fn failed_syncs(&self) -> Vec<String> {
        lock(&self.ledger).failed()
    }

    pub fn slots(&self) -> &LocalSlots {
        self.mirror.slots()
    }

    pub fn onboarding_done(&self) -> bool {
        self.slots().flag(Slot::OnboardingDone)
    }

    pub fn route(&self) -> Route {
        Route::decide(
            &self.phase(),
            self.onboarding_done(),
            self.slots().flag(Slot::HasAccount),
        )
    }

    pub fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.services.auth.subscribe()
    }

    // ===== Internals =====

    pub(super) fn set_phase(&self, phase: AuthPhase) {
        log::debug!("Auth phase -> {:?}", phase);
        *lock(&self.phase) = phase;
    }

    /// Apply `f` to the state and mirror the result, all under the state lock
    pub(super) fn mutate<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut state = lock(&self.state);
        let result = f(&mut state);
        self.mirror.persist(&state);
        result
    }

    pub(super) fn replace_with_sample(&self) {
        self.mutate(|state| *state = AppState::sample());
        lock(&self.ledger).clear();
    }

    pub(super) fn enable_mirror(&self) {
        self.mirror.mark_ready();
    }

    /// Current session; a failed check counts as none
    pub(super) async fn session(&self) -> Option<Session> {
        match self.services.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                log::error!("Session check failed: {}", e);
                None
            }
        }
    }

    /// Run the loader for `session` and enter the matching phase
    async fn load(&self, session: Option<Session>) {
        self.set_phase(AuthPhase::Loading);
        let loaded = self.loader.load(session.as_ref(), &self.mirror).await;
        self.mutate(|state| loaded.apply(state));

        match session {
            Some(session) => {
                // A signed-in account has finished onboarding
                if let Err(e) = self.slots().set_flag(Slot::OnboardingDone, true) {
                    log::warn!("Failed to record onboarding completion: {}", e);
                }
                self.set_phase(AuthPhase::Authenticated {
                    user_id: session.user_id,
                });
            }
            None => self.set_phase(AuthPhase::Anonymous),
        }
    }

    // ===== Lifecycle =====

    /// First session check and load. Enables the cache mirror once done.
    pub async fn initialize(&self) {
        let session = self.session().await;
        self.load(session).await;
        self.enable_mirror();
        self.mutate(|_| ());
        log::info!("Session initialized: {:?}", self.phase());
    }

    /// Re-run the loader for whatever session is current
    pub async fn reload(&self) {
        let session = self.session().await;
        self.load(session).await;
    }

    /// React to an auth notification
    pub async fn handle_auth_event(&self, event: AuthEvent) {
        log::info!("Auth event: {}", describe(&event));
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                self.load(Some(session)).await;
            }
            AuthEvent::SignedOut => {
                // The onboarding flag is left as it is
                self.replace_with_sample();
                self.set_phase(AuthPhase::Anonymous);
            }
        }
    }

    // ===== Mutations =====

    /// Show `memory` at the top right away, then insert it remotely and swap
    /// its client id for the server id. A failed insert leaves it in place.
    pub async fn add_memory(&self, memory: Memory) -> AddOutcome {
        let mut op = AddMemory::new(memory);
        self.mutate(|state| op.apply_local(state));

        let Some(session) = self.session().await else {
            lock(&self.ledger).mark(op.client_id(), SyncStatus::LocalOnly);
            return AddOutcome::LocalOnly;
        };
        lock(&self.ledger).mark(op.client_id(), SyncStatus::Pending);

        let result = op.confirm_remote(self.services.store.as_ref(), &session).await;
        let outcome = self.mutate(|state| op.reconcile(state, &result));

        let mut ledger = lock(&self.ledger);
        match &outcome {
            AddOutcome::Confirmed { server_id } => {
                ledger.rekey(op.client_id(), server_id, SyncStatus::Confirmed)
            }
            AddOutcome::Failed { reason } => {
                ledger.mark(op.client_id(), SyncStatus::Failed(reason.clone()))
            }
            AddOutcome::Orphaned { .. } | AddOutcome::LocalOnly => ledger.forget(op.client_id()),
        }
        outcome
    }

    /// Remove the memory right away, then delete it remotely. Never restored.
    pub async fn delete_memory(&self, id: &str) -> DeleteOutcome {
        let op = DeleteMemory::new(id);
        if self.mutate(|state| op.apply_local(state)).is_none() {
            log::debug!("Memory {} was not in local state", id);
        }
        lock(&self.ledger).forget(id);

        let Some(session) = self.session().await else {
            return DeleteOutcome::LocalOnly;
        };
        let result = op.confirm_remote(self.services.store.as_ref(), &session).await;
        op.settle(&result)
    }

    /// Shallow-merge into the state. Local only: edit flows persist remotely themselves.
    pub fn update_profile(&self, patch: ProfilePatch) {
        self.mutate(|state| state.apply(patch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::remote::{InMemoryBackend, MemoryRow, ProfileRow};
    use crate::storage::{parse_calendar_date, MemoryDraft};
    use tempfile::TempDir;

    fn create_container() -> (Arc<SessionContainer>, Arc<InMemoryBackend>, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let container = SessionContainer::new(
            RemoteServices::from_backend(backend.clone()),
            LocalSlots::new(temp.path().to_path_buf()),
        );
        (Arc::new(container), backend, temp)
    }

    fn draft(title: &str, date: &str) -> Memory {
        let mut draft = MemoryDraft::new(title);
        draft.date = parse_calendar_date(date);
        draft.into_memory()
    }

    fn row(id: &str, user: &str, date: &str) -> MemoryRow {
        MemoryRow {
            id: id.to_string(),
            user_id: Some(user.to_string()),
            title: format!("Memory {}", id),
            date: date.to_string(),
            location_name: None,
            location_x: None,
            location_y: None,
            category: "Just a Sweet Moment".to_string(),
            note: None,
            image_url: None,
        }
    }

    fn is_newest_first(memories: &[Memory]) -> bool {
        memories.windows(2).all(|w| w[0].date >= w[1].date)
    }

    async fn signed_in(user: &str) -> (Arc<SessionContainer>, Arc<InMemoryBackend>, TempDir) {
        let (container, backend, temp) = create_container();
        backend.set_session(user);
        container.initialize().await;
        (container, backend, temp)
    }

    #[tokio::test]
    async fn test_initialize_without_session_is_anonymous_sample() {
        let (container, _backend, _temp) = create_container();
        assert_eq!(container.phase(), AuthPhase::Loading);
        assert_eq!(container.route(), Route::Splash);

        container.initialize().await;

        assert_eq!(container.phase(), AuthPhase::Anonymous);
        assert_eq!(container.snapshot(), AppState::sample());
        assert_eq!(container.route(), Route::Onboarding);
        assert!(container.slots().read(Slot::AppState).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_malformed_cache_without_session_loads_seed_memories() {
        let (container, _backend, temp) = create_container();
        let slots = LocalSlots::new(temp.path().to_path_buf());
        slots.write(Slot::AppState, "{\"memories\": [oops").unwrap();

        container.initialize().await;

        let ids: Vec<_> = container.memories().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_initialize_with_session_loads_remote() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        backend.put_profile(ProfileRow {
            id: "user-1".to_string(),
            partner1_name: Some("Noor".to_string()),
            partner2_name: Some("Eli".to_string()),
            ..Default::default()
        });
        backend.put_memory(row("a", "user-1", "2022-01-01"));
        backend.put_memory(row("b", "user-1", "2024-01-01"));

        container.initialize().await;

        assert!(container.phase().is_authenticated());
        let state = container.snapshot();
        assert_eq!(state.partner1, "Noor");
        assert_eq!(state.memories.len(), 2);
        assert!(is_newest_first(&state.memories));
        assert!(container.onboarding_done());
        assert_eq!(container.route(), Route::Home);
    }

    #[tokio::test]
    async fn test_slow_insert_shows_memory_first_then_rekeys() {
        let (container, backend, _temp) = signed_in("user-1").await;
        backend.queue_server_id("abc-123");
        let gate = backend.hold_inserts();

        let memory = draft("Picnic", "2024-05-01");
        let client_id = memory.id.clone();

        let observe = async {
            // The add is parked on the gate; its optimistic entry is already visible
            while container.memory(&client_id).is_none() {
                tokio::task::yield_now().await;
            }
            let top = container.memories()[0].clone();
            assert_eq!(top.title, "Picnic");
            assert_eq!(top.id, client_id);
            assert_eq!(container.sync_status(&client_id), Some(SyncStatus::Pending));
            gate.notify_one();
        };
        let (outcome, ()) = tokio::join!(container.add_memory(memory.clone()), observe);

        assert_eq!(
            outcome,
            AddOutcome::Confirmed {
                server_id: "abc-123".to_string()
            }
        );
        let memories = container.memories();
        assert!(memories.iter().all(|m| m.id != client_id));
        let confirmed: Vec<_> = memories.iter().filter(|m| m.id == "abc-123").collect();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].title, memory.title);
        assert_eq!(confirmed[0].date, memory.date);
        assert_eq!(confirmed[0].location, memory.location);
        assert_eq!(confirmed[0].note, memory.note);
        assert!(is_newest_first(&memories));
        assert_eq!(container.sync_status("abc-123"), Some(SyncStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_add_keeps_order_across_many_dates() {
        let (container, _backend, _temp) = signed_in("user-1").await;
        for (title, date) in [("a", "2021-03-01"), ("b", "2025-01-01"), ("c", "2023-01-14"), ("d", "2019-07-07")] {
            container.add_memory(draft(title, date)).await;
            assert!(is_newest_first(&container.memories()));
        }
        assert!(container.failed_syncs().is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_memory_and_marks_it() {
        let (container, backend, _temp) = signed_in("user-1").await;
        backend.fail_inserts(true);

        let memory = draft("Offline dinner", "2024-02-14");
        let outcome = container.add_memory(memory.clone()).await;

        assert!(matches!(outcome, AddOutcome::Failed { .. }));
        assert!(container.memory(&memory.id).is_some());
        assert!(matches!(container.sync_status(&memory.id), Some(SyncStatus::Failed(_))));
        assert_eq!(container.failed_syncs(), vec![memory.id.clone()]);
        assert!(backend.memory_rows().is_empty());
    }

    #[tokio::test]
    async fn test_add_without_session_is_local_only() {
        let (container, backend, _temp) = create_container();
        container.initialize().await;

        let memory = draft("Just us", "2024-08-08");
        assert_eq!(container.add_memory(memory.clone()).await, AddOutcome::LocalOnly);
        assert_eq!(container.memories()[0].id, memory.id);
        assert_eq!(container.sync_status(&memory.id), Some(SyncStatus::LocalOnly));
        assert!(backend.memory_rows().is_empty());

        // And it is mirrored to the cache
        let raw = container.slots().read(Slot::AppState).unwrap().unwrap();
        let cached: AppState = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached, container.snapshot());
    }

    #[tokio::test]
    async fn test_delete_removes_immediately_and_remotely() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        backend.put_memory(row("m1", "user-1", "2024-01-01"));
        container.initialize().await;

        assert_eq!(container.delete_memory("m1").await, DeleteOutcome::Deleted);
        assert!(container.memory("m1").is_none());
        assert!(backend.memory_rows().is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_row_already_gone_only_warns() {
        let (container, _backend, _temp) = signed_in("user-1").await;
        // Shown locally, but the backend never had it
        container.mutate(|state| state.memories = AppState::sample().memories);
        assert!(container.memory("1").is_some());

        let outcome = container.delete_memory("1").await;

        assert_eq!(outcome, DeleteOutcome::NotFoundRemotely);
        assert!(outcome.user_warning().is_none());
        assert!(container.memory("1").is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_is_not_rolled_back() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        backend.put_memory(row("m1", "user-1", "2024-01-01"));
        container.initialize().await;
        backend.fail_deletes(true);

        let outcome = container.delete_memory("m1").await;

        assert!(outcome.user_warning().is_some());
        assert!(container.memory("m1").is_none());
        assert_eq!(backend.memory_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_event_resets_to_sample() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        for (id, date) in [("x", "2024-01-01"), ("y", "2024-02-01"), ("z", "2024-03-01")] {
            backend.put_memory(row(id, "user-1", date));
        }
        container.initialize().await;
        assert_eq!(container.memories().len(), 3);

        container.handle_auth_event(AuthEvent::SignedOut).await;

        assert_eq!(container.snapshot(), AppState::sample());
        assert_eq!(container.phase(), AuthPhase::Anonymous);
        // Onboarding completion survives the listener-driven sign-out
        assert!(container.onboarding_done());
    }

    #[tokio::test]
    async fn test_sign_in_event_loads_that_account() {
        let (container, backend, _temp) = create_container();
        container.initialize().await;

        let session = backend.set_session("user-7");
        backend.put_memory(row("m7", "user-7", "2024-07-07"));
        container.handle_auth_event(AuthEvent::SignedIn(session)).await;

        assert_eq!(
            container.phase(),
            AuthPhase::Authenticated {
                user_id: "user-7".to_string()
            }
        );
        assert_eq!(container.memories().len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile_merges_and_mirrors() {
        let (container, _backend, _temp) = create_container();
        container.initialize().await;

        container.update_profile(ProfilePatch {
            partner1: Some("Ayaan K.".to_string()),
            ..Default::default()
        });

        let raw = container.slots().read(Slot::AppState).unwrap().unwrap();
        let cached: AppState = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached.partner1, "Ayaan K.");
        assert_eq!(cached.partner2, "Sara");
    }

    #[tokio::test]
    async fn test_changes_before_initialize_are_not_mirrored() {
        let (container, _backend, _temp) = create_container();
        container.update_profile(ProfilePatch {
            partner2: Some("Early".to_string()),
            ..Default::default()
        });
        assert!(container.slots().read(Slot::AppState).unwrap().is_none());
    }
}
