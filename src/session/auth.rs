use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::remote::AuthEvent;

use super::container::SessionContainer;

/// Authentication state of the running client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    /// Waiting for a session check or a load to finish
    Loading,
    Anonymous,
    Authenticated { user_id: String },
}

impl AuthPhase {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthPhase::Authenticated { .. })
    }
}

/// Screen a client should open on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Splash,
    Onboarding,
    Login,
    Home,
}

impl Route {
    /// Precedence: still loading, then onboarding completed, then a known
    /// account, then first run. A signed-in load marks onboarding as done.
    pub fn decide(phase: &AuthPhase, onboarding_done: bool, has_account: bool) -> Route {
        if *phase == AuthPhase::Loading {
            Route::Splash
        } else if onboarding_done {
            Route::Home
        } else if has_account {
            Route::Login
        } else {
            Route::Onboarding
        }
    }
}

/// Background task feeding auth notifications into the session container.
///
/// The subscription is taken when the handler is spawned and released when it
/// is shut down or dropped.
pub struct AuthTransitionHandler {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AuthTransitionHandler {
    pub fn spawn(container: Arc<SessionContainer>) -> Self {
        let mut events = container.subscribe_auth();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        // Deliver whatever was already raised before stopping
                        loop {
                            match events.try_recv() {
                                Ok(event) => container.handle_auth_event(event).await,
                                Err(TryRecvError::Lagged(skipped)) => {
                                    log::warn!("Auth handler skipped {} events while stopping", skipped);
                                }
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                    received = events.recv() => match received {
                        Ok(event) => container.handle_auth_event(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            log::warn!("Auth handler lagged by {} events, reloading", skipped);
                            container.reload().await;
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            log::debug!("Auth transition handler stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop listening and wait for the in-flight transition to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Auth transition handler ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for AuthTransitionHandler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Human-readable name of an event, for logs
pub fn describe(event: &AuthEvent) -> &'static str {
    match event {
        AuthEvent::SignedIn(_) => "signed-in",
        AuthEvent::TokenRefreshed(_) => "token-refreshed",
        AuthEvent::SignedOut => "signed-out",
    }
}
