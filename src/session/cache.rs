use std::sync::atomic::{AtomicBool, Ordering};

use crate::storage::{AppState, LocalSlots, Slot};

/// Backup copy of the application state in the `app_state` slot.
///
/// Writes are refused until the first load has finished, so that the sample
/// state shown while loading never overwrites a cache that has not been read yet.
pub struct CacheMirror {
    slots: LocalSlots,
    ready: AtomicBool,
}

impl CacheMirror {
    pub fn new(slots: LocalSlots) -> Self {
        Self {
            slots,
            ready: AtomicBool::new(false),
        }
    }

    pub fn slots(&self) -> &LocalSlots {
        &self.slots
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Write the whole state. Returns whether anything was written; failures are logged.
    pub fn persist(&self, state: &AppState) -> bool {
        if !self.is_ready() {
            log::debug!("Initial load pending, not mirroring state yet");
            return false;
        }
        let json = match serde_json::to_string(state) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize app state: {}", e);
                return false;
            }
        };
        match self.slots.write(Slot::AppState, &json) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to mirror app state to {:?}: {}", self.slots.base_path(), e);
                false
            }
        }
    }

    /// The cached state, or `None` when the slot is missing or unreadable
    pub fn restore(&self) -> Option<AppState> {
        let raw = match self.slots.read(Slot::AppState) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read cached app state: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Cached app state is corrupt, ignoring it: {}", e);
                None
            }
        }
    }

    pub fn restore_or_sample(&self) -> AppState {
        self.restore().unwrap_or_else(AppState::sample)
    }
}
