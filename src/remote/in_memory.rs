use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use super::{
    AuthEvent, AuthProvider, BlobStore, MemoryRow, NewMemoryRow, NewProfileRow, ProfileRow,
    ProfileRowUpdate, RemoteError, RemoteResult, RemoteStore, Session,
};

#[derive(Default)]
struct Inner {
    /// email -> (password, user id)
    accounts: HashMap<String, (String, String)>,
    session: Option<Session>,
    profiles: HashMap<String, ProfileRow>,
    memories: Vec<MemoryRow>,
    blobs: HashMap<String, Vec<u8>>,
    next_ids: VecDeque<String>,
    insert_gate: Option<Arc<Notify>>,
    fail_inserts: bool,
    fail_deletes: bool,
    fail_profile_fetch: bool,
    fail_memory_list: bool,
}

/// Process-local backend with the same behavior as the cloud one, plus
/// failure injection and a gate that holds inserts until released.
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
    events: broadcast::Sender<AuthEvent>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an account and return its user id
    pub fn add_account(&self, email: &str, password: &str) -> String {
        let user_id = Uuid::new_v4().to_string();
        self.lock()
            .accounts
            .insert(email.to_string(), (password.to_string(), user_id.clone()));
        user_id
    }

    /// Make `user_id` the signed-in account without emitting an event
    pub fn set_session(&self, user_id: &str) -> Session {
        let session = Session {
            user_id: user_id.to_string(),
            email: None,
            access_token: format!("token-{}", user_id),
            refresh_token: None,
            expires_at: None,
        };
        self.lock().session = Some(session.clone());
        session
    }

    pub fn put_profile(&self, profile: ProfileRow) {
        self.lock().profiles.insert(profile.id.clone(), profile);
    }

    pub fn profile(&self, user_id: &str) -> Option<ProfileRow> {
        self.lock().profiles.get(user_id).cloned()
    }

    pub fn put_memory(&self, row: MemoryRow) {
        self.lock().memories.push(row);
    }

    pub fn memory_rows(&self) -> Vec<MemoryRow> {
        self.lock().memories.clone()
    }

    pub fn blob(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(&format!("{}/{}", bucket, path)).cloned()
    }

    pub fn blob_paths(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    /// Server id for the next insert; random ids are used once the queue is empty
    pub fn queue_server_id(&self, id: &str) {
        self.lock().next_ids.push_back(id.to_string());
    }

    /// Hold every insert until the returned handle is notified
    pub fn hold_inserts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().insert_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.lock().fail_inserts = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    pub fn fail_profile_fetch(&self, fail: bool) {
        self.lock().fail_profile_fetch = fail;
    }

    pub fn fail_memory_list(&self, fail: bool) {
        self.lock().fail_memory_list = fail;
    }

    /// Broadcast an auth event as if the provider raised it
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn injected(message: &str) -> RemoteError {
        RemoteError::Server {
            status: 500,
            message: message.to_string(),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for InMemoryBackend {
    async fn current_session(&self) -> RemoteResult<Option<Session>> {
        Ok(self.lock().session.clone())
    }

    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<Option<Session>> {
        if self.lock().accounts.contains_key(email) {
            return Err(RemoteError::AuthFailed("User already registered".to_string()));
        }
        let user_id = self.add_account(email, password);
        let mut session = self.set_session(&user_id);
        session.email = Some(email.to_string());
        self.lock().session = Some(session.clone());
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let account = self.lock().accounts.get(email).cloned();
        match account {
            Some((expected, user_id)) if expected == password => {
                let mut session = self.set_session(&user_id);
                session.email = Some(email.to_string());
                self.lock().session = Some(session.clone());
                self.emit(AuthEvent::SignedIn(session.clone()));
                Ok(session)
            }
            _ => Err(RemoteError::AuthFailed("Invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        self.lock().session = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RemoteStore for InMemoryBackend {
    async fn fetch_profile(&self, session: &Session) -> RemoteResult<Option<ProfileRow>> {
        let inner = self.lock();
        if inner.fail_profile_fetch {
            return Err(Self::injected("profile fetch failed"));
        }
        Ok(inner.profiles.get(&session.user_id).cloned())
    }

    async fn insert_profile(&self, session: &Session, profile: &NewProfileRow) -> RemoteResult<()> {
        if profile.id != session.user_id {
            return Err(RemoteError::AuthFailed("row-level security violation".to_string()));
        }
        self.put_profile(ProfileRow {
            id: profile.id.clone(),
            partner1_name: Some(profile.partner1_name.clone()),
            partner2_name: Some(profile.partner2_name.clone()),
            partner1_avatar: None,
            partner2_avatar: None,
            start_date: Some(profile.start_date.clone()),
        });
        Ok(())
    }

    async fn update_profile(&self, session: &Session, update: &ProfileRowUpdate) -> RemoteResult<usize> {
        let mut inner = self.lock();
        let Some(profile) = inner.profiles.get_mut(&session.user_id) else {
            return Ok(0);
        };
        if let Some(v) = &update.partner1_name {
            profile.partner1_name = Some(v.clone());
        }
        if let Some(v) = &update.partner2_name {
            profile.partner2_name = Some(v.clone());
        }
        if let Some(v) = &update.partner1_avatar {
            profile.partner1_avatar = Some(v.clone());
        }
        if let Some(v) = &update.partner2_avatar {
            profile.partner2_avatar = Some(v.clone());
        }
        if let Some(v) = &update.start_date {
            profile.start_date = Some(v.clone());
        }
        Ok(1)
    }

    async fn reset_profile(&self, session: &Session, start_date: &str) -> RemoteResult<()> {
        if let Some(profile) = self.lock().profiles.get_mut(&session.user_id) {
            profile.partner1_name = None;
            profile.partner2_name = None;
            profile.start_date = Some(start_date.to_string());
        }
        Ok(())
    }

    async fn list_memories(&self, session: &Session) -> RemoteResult<Vec<MemoryRow>> {
        let inner = self.lock();
        if inner.fail_memory_list {
            return Err(Self::injected("memory list failed"));
        }
        let mut rows: Vec<MemoryRow> = inner
            .memories
            .iter()
            .filter(|m| m.user_id.as_deref() == Some(session.user_id.as_str()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn insert_memory(&self, session: &Session, row: &NewMemoryRow) -> RemoteResult<MemoryRow> {
        let gate = self.lock().insert_gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.lock();
        if inner.fail_inserts {
            return Err(Self::injected("insert failed"));
        }
        if row.user_id != session.user_id {
            return Err(RemoteError::AuthFailed("row-level security violation".to_string()));
        }
        let id = inner
            .next_ids
            .pop_front()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let stored = MemoryRow {
            id,
            user_id: Some(row.user_id.clone()),
            title: row.title.clone(),
            date: row.date.clone(),
            location_name: Some(row.location_name.clone()),
            location_x: Some(row.location_x),
            location_y: Some(row.location_y),
            category: row.category.clone(),
            note: Some(row.note.clone()),
            image_url: row.image_url.clone(),
        };
        inner.memories.push(stored.clone());
        Ok(stored)
    }

    async fn delete_memory(&self, session: &Session, id: &str) -> RemoteResult<usize> {
        let mut inner = self.lock();
        if inner.fail_deletes {
            return Err(Self::injected("delete failed"));
        }
        let before = inner.memories.len();
        inner
            .memories
            .retain(|m| !(m.id == id && m.user_id.as_deref() == Some(session.user_id.as_str())));
        Ok(before - inner.memories.len())
    }

    async fn delete_all_memories(&self, session: &Session) -> RemoteResult<usize> {
        let mut inner = self.lock();
        let before = inner.memories.len();
        inner
            .memories
            .retain(|m| m.user_id.as_deref() != Some(session.user_id.as_str()));
        Ok(before - inner.memories.len())
    }
}

#[async_trait]
impl BlobStore for InMemoryBackend {
    async fn upload(
        &self,
        _session: Option<&Session>,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> RemoteResult<()> {
        let key = format!("{}/{}", bucket, path);
        let mut inner = self.lock();
        if inner.blobs.contains_key(&key) {
            return Err(RemoteError::Server {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        inner.blobs.insert(key, bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://public/{}/{}", bucket, path)
    }
}
