//! Seams to the cloud backend: authentication, relational tables and blob storage.
//!
//! The session container only talks to these traits. `SupabaseClient` is the real
//! backend, `Offline` stands in when none is configured and `InMemoryBackend`
//! backs the tests.

mod in_memory;
mod offline;
mod rows;
mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub use in_memory::InMemoryBackend;
pub use offline::Offline;
pub use rows::{MemoryRow, NewMemoryRow, NewProfileRow, ProfileRow, ProfileRowUpdate};
pub use supabase::SupabaseClient;

/// Bucket for memory photos
pub const MEMORIES_BUCKET: &str = "memories";
/// Bucket for partner avatars, namespaced by partner
pub const AVATARS_BUCKET: &str = "avatars";

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed: {0}")]
    AuthFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("Cloud backend is not configured")]
    NotConfigured,
    #[error("No signed-in session")]
    NoSession,
    #[error("Unexpected response: {0}")]
    Decode(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// An authenticated account context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds after which the access token must be refreshed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn is_expired(&self, now_unix: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_unix)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The current session, refreshing it first if its token has expired
    async fn current_session(&self) -> RemoteResult<Option<Session>>;

    /// Create an account. Returns the session when the backend signs the user in right away.
    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<Session>;

    async fn sign_out(&self) -> RemoteResult<()>;

    /// Subscribe to auth state changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_profile(&self, session: &Session) -> RemoteResult<Option<ProfileRow>>;

    async fn insert_profile(&self, session: &Session, profile: &NewProfileRow) -> RemoteResult<()>;

    /// Returns the number of rows updated
    async fn update_profile(&self, session: &Session, update: &ProfileRowUpdate) -> RemoteResult<usize>;

    /// Null both partner names and set a new start date
    async fn reset_profile(&self, session: &Session, start_date: &str) -> RemoteResult<()>;

    /// All memories owned by the session's account, newest first
    async fn list_memories(&self, session: &Session) -> RemoteResult<Vec<MemoryRow>>;

    /// Insert one memory and return the stored row with its server id
    async fn insert_memory(&self, session: &Session, row: &NewMemoryRow) -> RemoteResult<MemoryRow>;

    /// Returns the number of rows removed
    async fn delete_memory(&self, session: &Session, id: &str) -> RemoteResult<usize>;

    async fn delete_all_memories(&self, session: &Session) -> RemoteResult<usize>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        session: Option<&Session>,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RemoteResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// The three backend seams, as handed to the session container
#[derive(Clone)]
pub struct RemoteServices {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn RemoteStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl RemoteServices {
    /// All three seams served by one backend
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AuthProvider + RemoteStore + BlobStore + 'static,
    {
        Self {
            auth: backend.clone(),
            store: backend.clone(),
            blobs: backend,
        }
    }

    pub fn offline() -> Self {
        Self::from_backend(Arc::new(Offline::new()))
    }
}

/// Guess a MIME type from a file extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
