//! Account flows from the onboarding, login and profile screens.

use chrono::{Local, NaiveDate};
use thiserror::Error;
use uuid::Uuid;

use crate::remote::{
    content_type_for, NewProfileRow, ProfileRowUpdate, RemoteError, Session, AVATARS_BUCKET,
    MEMORIES_BUCKET,
};
use crate::storage::{AppState, Partner, ProfilePatch, Slot, StorageError};

use super::auth::AuthPhase;
use super::container::SessionContainer;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Local storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("You must select an image to upload.")]
    EmptyUpload,
}

pub type Result<T> = std::result::Result<T, AccountError>;

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// Account created and signed in; its profile row exists
    SignedIn(Session),
    /// Account created but the backend wants the email confirmed first
    ConfirmationPending,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl SessionContainer {
    /// Record that onboarding finished, optionally with the couple's names
    pub fn complete_onboarding(&self, names: Option<(String, String)>) -> Result<()> {
        if let Some((partner1, partner2)) = names {
            self.update_profile(ProfilePatch {
                partner1: Some(partner1),
                partner2: Some(partner2),
                ..Default::default()
            });
        }
        self.slots().set_flag(Slot::OnboardingDone, true)?;
        self.slots().set_flag(Slot::HasAccount, true)?;
        Ok(())
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        partner1: &str,
        partner2: &str,
    ) -> Result<SignUpOutcome> {
        let Some(session) = self.services.auth.sign_up(email, password).await? else {
            log::info!("Sign-up for {} awaits email confirmation", email);
            self.slots().set_flag(Slot::HasAccount, true)?;
            return Ok(SignUpOutcome::ConfirmationPending);
        };

        let profile = NewProfileRow {
            id: session.user_id.clone(),
            partner1_name: partner1.to_string(),
            partner2_name: partner2.to_string(),
            start_date: today().to_string(),
        };
        self.services.store.insert_profile(&session, &profile).await?;
        log::info!("Created profile for user {}", session.user_id);

        self.complete_onboarding(Some((partner1.to_string(), partner2.to_string())))?;
        Ok(SignUpOutcome::SignedIn(session))
    }

    /// Sign in and take the partner names from the profile row, if there is one
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.services.auth.sign_in(email, password).await?;

        let names = match self.services.store.fetch_profile(&session).await {
            Ok(Some(profile)) => {
                let names = profile.couple_names();
                Some((names[0].clone(), names[1].clone()))
            }
            Ok(None) => {
                log::error!("Profile not found for user {}", session.user_id);
                None
            }
            Err(e) => {
                log::error!("Profile not found for user {}: {}", session.user_id, e);
                None
            }
        };
        self.complete_onboarding(names)?;
        Ok(session)
    }

    /// Sign out from the profile screen: ends the session and forgets
    /// everything stored on this device
    pub async fn sign_out(&self) -> Result<()> {
        if let Err(e) = self.services.auth.sign_out().await {
            log::error!("Backend sign-out failed: {}", e);
        }
        self.replace_with_sample();
        self.slots().clear()?;
        log::info!("Signed out and cleared local data");
        Ok(())
    }

    /// Wipe the account's cloud data (when signed in), end the session and
    /// clear every local slot, leaving the signed-out sample state
    pub async fn reset_app(&self) -> Result<()> {
        if let Some(session) = self.session().await {
            match self.services.store.delete_all_memories(&session).await {
                Ok(count) => log::info!("Deleted {} memories for user {}", count, session.user_id),
                Err(e) => log::error!("Failed to delete memories during reset: {}", e),
            }
            if let Err(e) = self
                .services
                .store
                .reset_profile(&session, &today().to_string())
                .await
            {
                log::error!("Failed to reset profile: {}", e);
            }
            if let Err(e) = self.services.auth.sign_out().await {
                log::error!("Backend sign-out failed during reset: {}", e);
            }
        }

        self.replace_with_sample();
        self.slots().clear()?;
        self.set_phase(AuthPhase::Anonymous);
        self.enable_mirror();
        log::info!("App reset to the sample state");
        Ok(())
    }

    /// Update the state locally, then write the same fields to the profile row
    pub async fn save_profile(&self, patch: ProfilePatch) -> Result<()> {
        let update = ProfileRowUpdate::from_patch(&patch);
        self.update_profile(patch);

        if update.is_empty() {
            return Ok(());
        }
        let Some(session) = self.session().await else {
            return Ok(());
        };
        let updated = self.services.store.update_profile(&session, &update).await?;
        if updated == 0 {
            log::warn!(
                "Profile update for user {} matched no rows. Row might not exist or access is denied.",
                session.user_id
            );
        }
        Ok(())
    }

    pub async fn set_start_date(&self, date: NaiveDate) -> Result<()> {
        log::info!("Saving start date {}", date);
        self.save_profile(ProfilePatch {
            start_date: Some(date),
            ..Default::default()
        })
        .await
    }

    /// Upload a partner's avatar and point the profile at it. Returns the public URL.
    pub async fn upload_avatar(&self, partner: Partner, bytes: Vec<u8>, extension: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(AccountError::EmptyUpload);
        }
        let session = self.session().await;
        let path = format!("{}/{}.{}", partner.slug(), Uuid::new_v4(), extension);
        self.services
            .blobs
            .upload(session.as_ref(), AVATARS_BUCKET, &path, bytes, content_type_for(extension))
            .await?;
        let url = self.services.blobs.public_url(AVATARS_BUCKET, &path);

        let patch = partner.avatar_patch(url.clone());
        if let Some(session) = session {
            let update = ProfileRowUpdate::from_patch(&patch);
            self.services.store.update_profile(&session, &update).await?;
            log::info!("Avatar updated for {}", partner.slug());
        }
        self.update_profile(patch);
        Ok(url)
    }

    /// Upload a photo for a memory about to be added. Returns the public URL.
    pub async fn upload_memory_photo(&self, bytes: Vec<u8>, extension: &str) -> Result<String> {
        if bytes.is_empty() {
            return Err(AccountError::EmptyUpload);
        }
        let session = self.session().await;
        let path = format!(
            "{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            extension
        );
        self.services
            .blobs
            .upload(session.as_ref(), MEMORIES_BUCKET, &path, bytes, content_type_for(extension))
            .await?;
        Ok(self.services.blobs.public_url(MEMORIES_BUCKET, &path))
    }

    /// Whether the app currently shows the placeholder couple
    pub fn is_sample(&self) -> bool {
        self.phase() != AuthPhase::Loading && self.snapshot() == AppState::sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::remote::{InMemoryBackend, MemoryRow, ProfileRow, RemoteServices};
    use crate::session::Route;
    use crate::storage::LocalSlots;
    use tempfile::TempDir;

    fn create_container() -> (SessionContainer, Arc<InMemoryBackend>, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = Arc::new(InMemoryBackend::new());
        let container = SessionContainer::new(
            RemoteServices::from_backend(backend.clone()),
            LocalSlots::new(temp.path().to_path_buf()),
        );
        (container, backend, temp)
    }

    #[tokio::test]
    async fn test_onboarding_sets_names_and_flags() {
        let (container, _backend, _temp) = create_container();
        container.initialize().await;

        container
            .complete_onboarding(Some(("Romeo".to_string(), "Juliet".to_string())))
            .unwrap();

        let state = container.snapshot();
        assert_eq!(state.partner1, "Romeo");
        assert_eq!(state.partner2, "Juliet");
        assert!(container.slots().flag(Slot::HasAccount));
        assert_eq!(container.route(), Route::Home);
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile() {
        let (container, backend, _temp) = create_container();
        container.initialize().await;

        let outcome = container
            .sign_up("love@example.com", "secret", "Romeo", "Juliet")
            .await
            .unwrap();

        let SignUpOutcome::SignedIn(session) = outcome else {
            panic!("expected a session");
        };
        let profile = backend.profile(&session.user_id).unwrap();
        assert_eq!(profile.partner1_name.as_deref(), Some("Romeo"));
        assert_eq!(profile.start_date, Some(today().to_string()));
        assert_eq!(container.snapshot().partner2, "Juliet");
        assert!(container.onboarding_done());
    }

    #[tokio::test]
    async fn test_sign_up_twice_fails() {
        let (container, _backend, _temp) = create_container();
        container.sign_up("a@b.c", "pw", "A", "B").await.unwrap();

        let err = container.sign_up("a@b.c", "pw", "A", "B").await.unwrap_err();
        assert!(matches!(err, AccountError::Remote(RemoteError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_sign_in_takes_profile_names() {
        let (container, backend, _temp) = create_container();
        let user_id = backend.add_account("a@b.c", "pw");
        backend.put_profile(ProfileRow {
            id: user_id.clone(),
            partner1_name: Some("Noor".to_string()),
            partner2_name: Some("Eli".to_string()),
            ..Default::default()
        });
        container.initialize().await;

        let session = container.sign_in("a@b.c", "pw").await.unwrap();

        assert_eq!(session.user_id, user_id);
        assert_eq!(container.snapshot().partner1, "Noor");
        assert!(container.onboarding_done());
    }

    #[tokio::test]
    async fn test_sign_in_without_profile_still_completes() {
        let (container, backend, _temp) = create_container();
        backend.add_account("a@b.c", "pw");
        container.initialize().await;

        container.sign_in("a@b.c", "pw").await.unwrap();

        assert_eq!(container.snapshot().partner1, "Ayaan");
        assert!(container.onboarding_done());
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let (container, backend, _temp) = create_container();
        backend.add_account("a@b.c", "pw");

        let err = container.sign_in("a@b.c", "nope").await.unwrap_err();
        assert!(matches!(err, AccountError::Remote(RemoteError::AuthFailed(_))));
        assert!(!container.onboarding_done());
    }

    #[tokio::test]
    async fn test_explicit_sign_out_clears_slots() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        container.initialize().await;
        container.complete_onboarding(None).unwrap();

        container.sign_out().await.unwrap();

        assert!(!container.onboarding_done());
        assert!(!container.slots().flag(Slot::HasAccount));
        assert_eq!(container.snapshot(), AppState::sample());
        assert!(container.session().await.is_none());
    }

    #[tokio::test]
    async fn test_reset_wipes_remote_and_local() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        backend.put_profile(ProfileRow {
            id: "user-1".to_string(),
            partner1_name: Some("Noor".to_string()),
            partner2_name: Some("Eli".to_string()),
            start_date: Some("2020-01-01".to_string()),
            ..Default::default()
        });
        backend.put_memory(MemoryRow {
            id: "m1".to_string(),
            user_id: Some("user-1".to_string()),
            title: "Trip".to_string(),
            date: "2024-01-01".to_string(),
            location_name: None,
            location_x: None,
            location_y: None,
            category: "First Trip".to_string(),
            note: None,
            image_url: None,
        });
        container.initialize().await;
        assert_eq!(container.memories().len(), 1);

        container.reset_app().await.unwrap();

        assert!(backend.memory_rows().is_empty());
        let profile = backend.profile("user-1").unwrap();
        assert!(profile.partner1_name.is_none());
        assert_eq!(profile.start_date, Some(today().to_string()));
        assert_eq!(container.snapshot(), AppState::sample());
        assert!(container.session().await.is_none());
        assert_eq!(container.phase(), AuthPhase::Anonymous);
        assert!(!container.onboarding_done());
        assert!(!container.slots().flag(Slot::HasAccount));
        assert_eq!(container.route(), Route::Onboarding);
        assert!(container.slots().read(Slot::AppState).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_then_restart_stays_on_onboarding() {
        let (container, backend, temp) = create_container();
        backend.set_session("user-1");
        container.initialize().await;
        assert!(container.onboarding_done());

        container.reset_app().await.unwrap();

        let restarted = SessionContainer::new(
            RemoteServices::from_backend(backend.clone()),
            LocalSlots::new(temp.path().to_path_buf()),
        );
        restarted.initialize().await;
        assert_eq!(restarted.phase(), AuthPhase::Anonymous);
        assert_eq!(restarted.snapshot(), AppState::sample());
        assert_eq!(restarted.route(), Route::Onboarding);
    }

    #[tokio::test]
    async fn test_reset_without_session_returns_to_sample() {
        let (container, _backend, _temp) = create_container();
        container.initialize().await;
        container.complete_onboarding(Some(("X".to_string(), "Y".to_string()))).unwrap();

        container.reset_app().await.unwrap();

        assert_eq!(container.snapshot(), AppState::sample());
        assert!(container.is_sample());
        assert_eq!(container.route(), Route::Onboarding);
    }

    #[tokio::test]
    async fn test_set_start_date_updates_both_sides() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        backend.put_profile(ProfileRow {
            id: "user-1".to_string(),
            ..Default::default()
        });
        container.initialize().await;

        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        container.set_start_date(date).await.unwrap();

        assert_eq!(container.snapshot().start_date, date);
        assert_eq!(
            backend.profile("user-1").unwrap().start_date.as_deref(),
            Some("2021-06-01")
        );
    }

    #[tokio::test]
    async fn test_set_start_date_without_profile_row_is_local() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        container.initialize().await;

        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        container.set_start_date(date).await.unwrap();

        assert_eq!(container.snapshot().start_date, date);
        assert!(backend.profile("user-1").is_none());
    }

    #[tokio::test]
    async fn test_upload_avatar_updates_profile_and_state() {
        let (container, backend, _temp) = create_container();
        backend.set_session("user-1");
        backend.put_profile(ProfileRow {
            id: "user-1".to_string(),
            ..Default::default()
        });
        container.initialize().await;

        let url = container
            .upload_avatar(Partner::Second, vec![1, 2, 3], "png")
            .await
            .unwrap();

        assert!(url.starts_with("memory://public/avatars/partner2/"));
        assert!(url.ends_with(".png"));
        assert_eq!(container.snapshot().partner2_avatar.as_deref(), Some(url.as_str()));
        assert_eq!(
            backend.profile("user-1").unwrap().partner2_avatar.as_deref(),
            Some(url.as_str())
        );
        assert_eq!(backend.blob_paths().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_file() {
        let (container, _backend, _temp) = create_container();
        let err = container.upload_memory_photo(Vec::new(), "jpg").await.unwrap_err();
        assert!(matches!(err, AccountError::EmptyUpload));
    }

    #[tokio::test]
    async fn test_upload_memory_photo_returns_public_url() {
        let (container, backend, _temp) = create_container();
        let url = container.upload_memory_photo(vec![9; 16], "jpg").await.unwrap();

        assert!(url.starts_with("memory://public/memories/"));
        let path = url.trim_start_matches("memory://public/memories/");
        assert_eq!(backend.blob("memories", path), Some(vec![9; 16]));
    }
}
