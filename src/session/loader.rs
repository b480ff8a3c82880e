use std::sync::Arc;

use crate::remote::{ProfileRow, RemoteStore, Session};
use crate::storage::{sort_newest_first, AppState, Memory};

use super::cache::CacheMirror;

/// What a load produced. Applied onto the latest state by the container, so
/// edits made while the fetch was in flight are merged rather than lost.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Fetched from the backend. `None` parts failed and leave the state as is.
    Remote {
        profile: Option<ProfileRow>,
        memories: Option<Vec<Memory>>,
    },
    /// No session: the cached state, or the sample state
    Local(AppState),
}

impl Loaded {
    pub fn apply(self, state: &mut AppState) {
        match self {
            Loaded::Remote { profile, memories } => {
                if let Some(profile) = profile {
                    profile.merge_into(state);
                }
                if let Some(memories) = memories {
                    state.memories = memories;
                }
            }
            Loaded::Local(cached) => *state = cached,
        }
    }
}

/// Produces application state for a session (remote) or for no session (cache)
pub struct SessionLoader {
    store: Arc<dyn RemoteStore>,
}

impl SessionLoader {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Never fails: anything that cannot be fetched is logged and left alone
    pub async fn load(&self, session: Option<&Session>, mirror: &CacheMirror) -> Loaded {
        match session {
            Some(session) => self.load_remote(session).await,
            None => Loaded::Local(mirror.restore_or_sample()),
        }
    }

    async fn load_remote(&self, session: &Session) -> Loaded {
        let profile = match self.store.fetch_profile(session).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                log::warn!("No profile row for user {}", session.user_id);
                None
            }
            Err(e) => {
                log::error!("Failed to load profile for user {}: {}", session.user_id, e);
                None
            }
        };

        let couple_names = match &profile {
            Some(profile) => profile.couple_names(),
            None => ProfileRow::default().couple_names(),
        };

        let memories = match self.store.list_memories(session).await {
            Ok(rows) => {
                let mut memories: Vec<Memory> = rows
                    .into_iter()
                    .filter_map(|row| row.into_memory(&couple_names))
                    .collect();
                sort_newest_first(&mut memories);
                log::info!("Loaded {} memories for user {}", memories.len(), session.user_id);
                Some(memories)
            }
            Err(e) => {
                log::error!("Failed to load memories for user {}: {}", session.user_id, e);
                None
            }
        };

        Loaded::Remote { profile, memories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryBackend, MemoryRow};
    use crate::storage::{LocalSlots, Slot};
    use tempfile::TempDir;

    fn row(id: &str, user: &str, date: &str) -> MemoryRow {
        MemoryRow {
            id: id.to_string(),
            user_id: Some(user.to_string()),
            title: format!("Memory {}", id),
            date: date.to_string(),
            location_name: Some("Somewhere".to_string()),
            location_x: Some(20.0),
            location_y: Some(30.0),
            category: "First Trip".to_string(),
            note: None,
            image_url: None,
        }
    }

    fn setup() -> (Arc<InMemoryBackend>, SessionLoader, CacheMirror, TempDir) {
        let backend = Arc::new(InMemoryBackend::new());
        let loader = SessionLoader::new(backend.clone());
        let temp = TempDir::new().unwrap();
        let mirror = CacheMirror::new(LocalSlots::new(temp.path().to_path_buf()));
        (backend, loader, mirror, temp)
    }

    #[tokio::test]
    async fn test_remote_load_maps_and_orders_owned_rows() {
        let (backend, loader, mirror, _temp) = setup();
        let session = backend.set_session("user-1");
        backend.put_profile(ProfileRow {
            id: "user-1".to_string(),
            partner1_name: Some("Noor".to_string()),
            partner2_name: Some("Eli".to_string()),
            ..Default::default()
        });
        backend.put_memory(row("old", "user-1", "2021-01-01"));
        backend.put_memory(row("new", "user-1", "2024-01-01"));
        backend.put_memory(row("other", "user-2", "2025-01-01"));

        let mut state = AppState::sample();
        loader.load(Some(&session), &mirror).await.apply(&mut state);

        let ids: Vec<_> = state.memories.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(state.partner1, "Noor");
        assert_eq!(state.memories[0].couple_names, vec!["Noor", "Eli"]);
    }

    #[tokio::test]
    async fn test_fetch_errors_leave_state_untouched() {
        let (backend, loader, mirror, _temp) = setup();
        let session = backend.set_session("user-1");
        backend.fail_profile_fetch(true);
        backend.fail_memory_list(true);

        let before = AppState::sample();
        let mut state = before.clone();
        let loaded = loader.load(Some(&session), &mirror).await;
        assert_eq!(
            loaded,
            Loaded::Remote {
                profile: None,
                memories: None
            }
        );
        loaded.apply(&mut state);
        assert_eq!(state, before);
    }

    #[tokio::test]
    async fn test_missing_profile_still_loads_memories() {
        let (backend, loader, mirror, _temp) = setup();
        let session = backend.set_session("user-1");
        backend.put_memory(row("m1", "user-1", "2024-03-03"));

        let mut state = AppState::sample();
        loader.load(Some(&session), &mirror).await.apply(&mut state);

        assert_eq!(state.partner1, "Ayaan");
        assert_eq!(state.memories.len(), 1);
        assert_eq!(state.memories[0].couple_names, vec!["Partner 1", "Partner 2"]);
    }

    #[tokio::test]
    async fn test_anonymous_load_uses_cache_then_sample() {
        let (_backend, loader, mirror, _temp) = setup();

        let mut state = AppState::sample();
        state.memories.clear();
        loader.load(None, &mirror).await.apply(&mut state);
        assert_eq!(state, AppState::sample());

        let mut cached = AppState::sample();
        cached.partner1 = "Cached".to_string();
        mirror
            .slots()
            .write(Slot::AppState, &serde_json::to_string(&cached).unwrap())
            .unwrap();
        loader.load(None, &mirror).await.apply(&mut state);
        assert_eq!(state, cached);
    }
}
