use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Named durable slots, the on-disk counterpart of browser local storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Serialized application state
    AppState,
    OnboardingDone,
    HasAccount,
    /// Backend session tokens, so a later run can resume it
    AuthSession,
}

impl Slot {
    pub const ALL: [Slot; 4] = [
        Slot::AppState,
        Slot::OnboardingDone,
        Slot::HasAccount,
        Slot::AuthSession,
    ];

    fn file_name(&self) -> &'static str {
        match self {
            Slot::AppState => "app_state.json",
            Slot::OnboardingDone => "onboarding_done",
            Slot::HasAccount => "has_account",
            Slot::AuthSession => "auth_session.json",
        }
    }
}

/// One file per slot under a base directory
#[derive(Debug, Clone)]
pub struct LocalSlots {
    base_path: PathBuf,
}

impl LocalSlots {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("memory-lane"))
            .ok_or(StorageError::DataDirNotFound)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn slot_path(&self, slot: Slot) -> PathBuf {
        self.base_path.join(slot.file_name())
    }

    /// Read a slot; a slot that was never written reads as `None`
    pub fn read(&self, slot: Slot) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    pub fn write(&self, slot: Slot, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        // Write then rename so a crash never leaves a half-written slot
        let path = self.slot_path(slot);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn remove(&self, slot: Slot) -> Result<()> {
        let path = self.slot_path(slot);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Boolean flag slots hold the literal text "true"
    pub fn flag(&self, slot: Slot) -> bool {
        match self.read(slot) {
            Ok(Some(value)) => value.trim() == "true",
            Ok(None) => false,
            Err(e) => {
                log::warn!("Failed to read flag {:?}: {}", slot, e);
                false
            }
        }
    }

    pub fn set_flag(&self, slot: Slot, value: bool) -> Result<()> {
        self.write(slot, if value { "true" } else { "false" })
    }

    /// Remove every slot
    pub fn clear(&self) -> Result<()> {
        for slot in Slot::ALL {
            self.remove(slot)?;
        }
        log::info!("Cleared local slots in {:?}", self.base_path);
        Ok(())
    }
}
