use std::sync::Arc;

use anyhow::{bail, Context, Result};

use memory_lane_lib::assist::GeminiAssist;
use memory_lane_lib::config::AppConfig;
use memory_lane_lib::remote::{RemoteServices, SupabaseClient};
use memory_lane_lib::session::{AuthTransitionHandler, SessionContainer};
use memory_lane_lib::storage::{LocalSlots, Memory};

/// Shared application state for CLI commands
pub struct App {
    pub config: AppConfig,
    pub session: Arc<SessionContainer>,
    pub assist: GeminiAssist,
    /// Whether a cloud backend is configured
    pub online: bool,
    handler: Option<AuthTransitionHandler>,
}

impl App {
    /// Load config, connect the backend (or run offline), load the session
    /// and start listening for auth changes
    pub async fn start() -> Result<Self> {
        let config = AppConfig::load().context("Failed to load configuration")?;
        let data_dir = config.data_dir().context("Failed to get data directory")?;
        log::debug!("Using data directory {}", data_dir.display());

        let slots = LocalSlots::new(data_dir);
        let (services, online) = match config.backend.credentials() {
            Some((url, key)) => {
                let client = SupabaseClient::new(url, key)
                    .context("Invalid backend configuration")?
                    .with_session_slots(slots.clone());
                (RemoteServices::from_backend(Arc::new(client)), true)
            }
            None => {
                log::info!("No cloud backend configured, running offline");
                (RemoteServices::offline(), false)
            }
        };

        let session = Arc::new(SessionContainer::new(services, slots));
        session.initialize().await;
        let handler = AuthTransitionHandler::spawn(Arc::clone(&session));
        let assist = GeminiAssist::new(&config.assist);

        Ok(Self {
            config,
            session,
            assist,
            online,
            handler: Some(handler),
        })
    }

    /// Stop the auth handler after it has applied any pending transition
    pub async fn finish(mut self) {
        if let Some(handler) = self.handler.take() {
            handler.shutdown().await;
        }
    }

    pub fn require_online(&self) -> Result<()> {
        if !self.online {
            bail!("No cloud backend configured. Set SUPABASE_URL and SUPABASE_ANON_KEY, or add a [backend] section to config.toml.");
        }
        Ok(())
    }

    /// Find a memory by exact id, or by a unique id prefix or title prefix
    pub fn find_memory(&self, query: &str) -> Result<Memory> {
        let memories = self.session.memories();

        if let Some(m) = memories.iter().find(|m| m.id == query) {
            return Ok(m.clone());
        }

        let query_lower = query.to_lowercase();
        let matches: Vec<&Memory> = memories
            .iter()
            .filter(|m| m.id.starts_with(query) || m.title.to_lowercase().starts_with(&query_lower))
            .collect();

        match matches.len() {
            0 => bail!("No memory matching '{}'", query),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous memory '{}'. Matches:\n{}",
                query,
                matches
                    .iter()
                    .map(|m| format!("  - {} ({})", m.title, m.id))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }
}
