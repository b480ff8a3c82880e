use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    AuthEvent, AuthProvider, BlobStore, MemoryRow, NewMemoryRow, NewProfileRow, ProfileRow,
    ProfileRowUpdate, RemoteError, RemoteResult, RemoteStore, Session,
};

/// Backend used when no cloud project is configured: never signed in,
/// every remote call is rejected.
pub struct Offline {
    events: broadcast::Sender<AuthEvent>,
}

impl Offline {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(4);
        Self { events }
    }
}

impl Default for Offline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for Offline {
    async fn current_session(&self) -> RemoteResult<Option<Session>> {
        Ok(None)
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> RemoteResult<Option<Session>> {
        Err(RemoteError::NotConfigured)
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> RemoteResult<Session> {
        Err(RemoteError::NotConfigured)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RemoteStore for Offline {
    async fn fetch_profile(&self, _session: &Session) -> RemoteResult<Option<ProfileRow>> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert_profile(&self, _session: &Session, _profile: &NewProfileRow) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn update_profile(&self, _session: &Session, _update: &ProfileRowUpdate) -> RemoteResult<usize> {
        Err(RemoteError::NotConfigured)
    }

    async fn reset_profile(&self, _session: &Session, _start_date: &str) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    async fn list_memories(&self, _session: &Session) -> RemoteResult<Vec<MemoryRow>> {
        Err(RemoteError::NotConfigured)
    }

    async fn insert_memory(&self, _session: &Session, _row: &NewMemoryRow) -> RemoteResult<MemoryRow> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_memory(&self, _session: &Session, _id: &str) -> RemoteResult<usize> {
        Err(RemoteError::NotConfigured)
    }

    async fn delete_all_memories(&self, _session: &Session) -> RemoteResult<usize> {
        Err(RemoteError::NotConfigured)
    }
}

#[async_trait]
impl BlobStore for Offline {
    async fn upload(
        &self,
        _session: Option<&Session>,
        _bucket: &str,
        _path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> RemoteResult<()> {
        Err(RemoteError::NotConfigured)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("offline://{}/{}", bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_has_no_session_and_rejects_writes() {
        let offline = Offline::new();
        assert!(offline.current_session().await.unwrap().is_none());
        assert!(offline.sign_out().await.is_ok());
        assert!(matches!(
            offline.sign_in("a@b.c", "pw").await,
            Err(RemoteError::NotConfigured)
        ));
        let upload = offline.upload(None, "memories", "x.jpg", vec![1], "image/jpeg").await;
        assert!(matches!(upload, Err(RemoteError::NotConfigured)));
    }
}
