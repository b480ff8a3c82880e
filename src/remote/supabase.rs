use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::broadcast;

use super::{
    AuthEvent, AuthProvider, BlobStore, MemoryRow, NewMemoryRow, NewProfileRow, ProfileRow,
    ProfileRowUpdate, RemoteError, RemoteResult, RemoteStore, Session,
};
use crate::storage::{LocalSlots, Slot};

/// Client for a Supabase project: GoTrue auth, PostgREST tables and Storage buckets
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session: Mutex<Option<Session>>,
    /// Where the session is persisted between runs, if anywhere
    slots: Option<LocalSlots>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl TokenResponse {
    fn into_session(self) -> Option<Session> {
        let access_token = self.access_token?;
        let user = self.user?;
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Some(Session {
            user_id: user.id,
            email: user.email,
            access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

impl SupabaseClient {
    /// Create a new client for the project at `base_url`
    pub fn new(base_url: String, anon_key: String) -> RemoteResult<Self> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let anon_key = anon_key.trim().to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteError::Decode(format!(
                "backend URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        if anon_key.len() < 10 {
            log::error!("Backend anon key looks too short or invalid ({} chars)", anon_key.len());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            client,
            base_url,
            anon_key,
            session: Mutex::new(None),
            slots: None,
            events,
        })
    }

    /// Persist the session in `slots` and resume one saved by an earlier run
    pub fn with_session_slots(mut self, slots: LocalSlots) -> Self {
        match slots.read(Slot::AuthSession) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => {
                    log::debug!("Resumed session for user {}", session.user_id);
                    *self.lock_session() = Some(session);
                }
                Err(e) => log::warn!("Ignoring unreadable saved session: {}", e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read saved session: {}", e),
        }
        self.slots = Some(slots);
        self
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store_session(&self, session: Option<Session>) {
        if let Some(slots) = &self.slots {
            let result = match &session {
                Some(s) => serde_json::to_string(s)
                    .map_err(crate::storage::StorageError::from)
                    .and_then(|raw| slots.write(Slot::AuthSession, &raw)),
                None => slots.remove(Slot::AuthSession),
            };
            if let Err(e) = result {
                log::warn!("Failed to persist auth session: {}", e);
            }
        }
        *self.lock_session() = session;
    }

    fn emit(&self, event: AuthEvent) {
        // No receivers is fine: nobody is listening yet
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn rest_url(&self, table: &str, query: &str) -> String {
        self.url(&format!("rest/v1/{}?{}", table, query))
    }

    fn authed(&self, builder: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        let token = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(self.anon_key.as_str());
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn json<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
        let text = check(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(format!("{}: {}", e, text)))
    }

    async fn refresh(&self, refresh_token: &str) -> RemoteResult<Session> {
        let response = self
            .authed(
                self.client.post(self.url("auth/v1/token?grant_type=refresh_token")),
                None,
            )
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = Self::json(response).await.map_err(auth_failure)?;
        token
            .into_session()
            .ok_or_else(|| RemoteError::Decode("refresh returned no session".to_string()))
    }
}

/// Map an error status to a `RemoteError`, passing successful responses through
async fn check(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::AuthFailed(message),
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        _ => RemoteError::Server {
            status: status.as_u16(),
            message,
        },
    })
}

/// GoTrue reports bad credentials as 400
fn auth_failure(err: RemoteError) -> RemoteError {
    match err {
        RemoteError::Server { status: 400, message } | RemoteError::Server { status: 422, message } => {
            RemoteError::AuthFailed(message)
        }
        other => other,
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

fn eq(value: &str) -> String {
    format!("eq.{}", urlencoding::encode(value))
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn current_session(&self) -> RemoteResult<Option<Session>> {
        let current = self.lock_session().clone();
        let Some(session) = current else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now().timestamp()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            log::warn!("Session expired and has no refresh token; signing out locally");
            self.store_session(None);
            self.emit(AuthEvent::SignedOut);
            return Ok(None);
        };

        match self.refresh(&refresh_token).await {
            Ok(fresh) => {
                log::info!("Refreshed access token for user {}", fresh.user_id);
                self.store_session(Some(fresh.clone()));
                self.emit(AuthEvent::TokenRefreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(RemoteError::AuthFailed(message)) => {
                log::warn!("Refresh token rejected ({}); signing out locally", message);
                self.store_session(None);
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<Option<Session>> {
        let response = self
            .authed(self.client.post(self.url("auth/v1/signup")), None)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = Self::json(response).await.map_err(auth_failure)?;

        // Projects with email confirmation return the user without a session
        match token.into_session() {
            Some(session) => {
                log::info!("Signed up and signed in user {}", session.user_id);
                self.store_session(Some(session.clone()));
                self.emit(AuthEvent::SignedIn(session.clone()));
                Ok(Some(session))
            }
            None => {
                log::info!("Signed up {}; awaiting email confirmation", email);
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let response = self
            .authed(self.client.post(self.url("auth/v1/token?grant_type=password")), None)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = Self::json(response).await.map_err(auth_failure)?;
        let session = token
            .into_session()
            .ok_or_else(|| RemoteError::Decode("sign-in returned no session".to_string()))?;

        log::info!("Signed in user {}", session.user_id);
        self.store_session(Some(session.clone()));
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        let current = self.lock_session().clone();
        if let Some(session) = current {
            let result = self
                .authed(self.client.post(self.url("auth/v1/logout")), Some(&session))
                .send()
                .await;
            match result {
                Ok(response) => {
                    if let Err(e) = check(response).await {
                        log::warn!("Backend sign-out failed, clearing local session anyway: {}", e);
                    }
                }
                Err(e) => log::warn!("Backend sign-out failed, clearing local session anyway: {}", e),
            }
        }
        self.store_session(None);
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn fetch_profile(&self, session: &Session) -> RemoteResult<Option<ProfileRow>> {
        let url = self.rest_url("profiles", &format!("select=*&id={}", eq(&session.user_id)));
        let response = self.authed(self.client.get(url), Some(session)).send().await?;
        let rows: Vec<ProfileRow> = Self::json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, session: &Session, profile: &NewProfileRow) -> RemoteResult<()> {
        let response = self
            .authed(self.client.post(self.rest_url("profiles", "")), Some(session))
            .header("Prefer", "return=minimal")
            .json(&[profile])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn update_profile(&self, session: &Session, update: &ProfileRowUpdate) -> RemoteResult<usize> {
        let url = self.rest_url("profiles", &format!("id={}", eq(&session.user_id)));
        let response = self
            .authed(self.client.patch(url), Some(session))
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;
        let rows: Vec<ProfileRow> = Self::json(response).await?;
        Ok(rows.len())
    }

    async fn reset_profile(&self, session: &Session, start_date: &str) -> RemoteResult<()> {
        let url = self.rest_url("profiles", &format!("id={}", eq(&session.user_id)));
        let response = self
            .authed(self.client.patch(url), Some(session))
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({
                "partner1_name": null,
                "partner2_name": null,
                "start_date": start_date,
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn list_memories(&self, session: &Session) -> RemoteResult<Vec<MemoryRow>> {
        let url = self.rest_url(
            "memories",
            &format!("select=*&user_id={}&order=date.desc", eq(&session.user_id)),
        );
        let response = self.authed(self.client.get(url), Some(session)).send().await?;
        Self::json(response).await
    }

    async fn insert_memory(&self, session: &Session, row: &NewMemoryRow) -> RemoteResult<MemoryRow> {
        let response = self
            .authed(self.client.post(self.rest_url("memories", "select=*")), Some(session))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let rows: Vec<MemoryRow> = Self::json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::Decode("insert returned no row".to_string()))
    }

    async fn delete_memory(&self, session: &Session, id: &str) -> RemoteResult<usize> {
        let url = self.rest_url("memories", &format!("id={}", eq(id)));
        let response = self
            .authed(self.client.delete(url), Some(session))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::json(response).await?;
        Ok(rows.len())
    }

    async fn delete_all_memories(&self, session: &Session) -> RemoteResult<usize> {
        let url = self.rest_url("memories", &format!("user_id={}", eq(&session.user_id)));
        let response = self
            .authed(self.client.delete(url), Some(session))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::json(response).await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl BlobStore for SupabaseClient {
    async fn upload(
        &self,
        session: Option<&Session>,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RemoteResult<()> {
        let url = self.url(&format!("storage/v1/object/{}/{}", bucket, path.trim_start_matches('/')));
        let response = self
            .authed(self.client.post(url), session)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(response).await?;
        log::info!("Uploaded {}/{}", bucket, path);
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!(
            "storage/v1/object/public/{}/{}",
            bucket,
            path.trim_start_matches('/')
        ))
    }
}
