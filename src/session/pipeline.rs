//! Optimistic mutations as explicit phase objects.
//!
//! Each operation is applied to local state first, confirmed against the
//! backend second, and settled (re-keyed or reported) third. The container
//! drives the phases in order; tests can drive them one at a time.

use std::collections::HashMap;

use crate::remote::{MemoryRow, NewMemoryRow, RemoteResult, RemoteStore, Session};
use crate::storage::{AppState, Memory};

/// Where a memory stands with respect to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Added without a session; only the local cache has it
    LocalOnly,
    /// Insert issued, not settled yet
    Pending,
    Confirmed,
    /// Insert failed. The memory stays visible; nothing retries it.
    Failed(String),
}

/// Sync status per memory id, following the id through re-keying
#[derive(Debug, Default)]
pub struct SyncLedger {
    entries: HashMap<String, SyncStatus>,
}

impl SyncLedger {
    pub fn get(&self, id: &str) -> Option<&SyncStatus> {
        self.entries.get(id)
    }

    pub fn mark(&mut self, id: &str, status: SyncStatus) {
        self.entries.insert(id.to_string(), status);
    }

    pub fn rekey(&mut self, from: &str, to: &str, status: SyncStatus) {
        self.entries.remove(from);
        self.entries.insert(to.to_string(), status);
    }

    pub fn forget(&mut self, id: &str) {
        self.entries.remove(id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Ids whose insert failed, for a caller that wants to surface them
    pub fn failed(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, status)| matches!(status, SyncStatus::Failed(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// No session; the memory lives only locally
    LocalOnly,
    Confirmed { server_id: String },
    /// Remote insert failed; the memory stays in local state
    Failed { reason: String },
    /// The insert succeeded but the memory had already been deleted locally
    Orphaned { server_id: String },
}

/// Add Memory: prepend now, insert remotely, then swap in the server id
#[derive(Debug, Clone)]
pub struct AddMemory {
    memory: Memory,
}

impl AddMemory {
    pub fn new(memory: Memory) -> Self {
        Self { memory }
    }

    pub fn client_id(&self) -> &str {
        &self.memory.id
    }

    /// Phase 1: show the memory at the top immediately
    pub fn apply_local(&mut self, state: &mut AppState) {
        if self.memory.couple_names.is_empty() {
            self.memory.couple_names = state.couple_names();
        }
        state.memories.insert(0, self.memory.clone());
    }

    /// Phase 2: insert the matching row
    pub async fn confirm_remote(&self, store: &dyn RemoteStore, session: &Session) -> RemoteResult<MemoryRow> {
        let row = NewMemoryRow::from_memory(&self.memory, &session.user_id);
        store.insert_memory(session, &row).await
    }

    /// Phase 3: re-key the entry that still carries the client id and restore
    /// date order. A failed insert is only reported; the entry stays.
    pub fn reconcile(&self, state: &mut AppState, result: &RemoteResult<MemoryRow>) -> AddOutcome {
        match result {
            Ok(row) => {
                let Some(entry) = state.memories.iter_mut().find(|m| m.id == self.memory.id) else {
                    log::warn!(
                        "Memory {} was removed locally before its insert settled; server row {} remains",
                        self.memory.id,
                        row.id
                    );
                    return AddOutcome::Orphaned {
                        server_id: row.id.clone(),
                    };
                };
                entry.id = row.id.clone();
                state.sort_memories();
                log::info!("Memory {} confirmed as {}", self.memory.id, row.id);
                AddOutcome::Confirmed {
                    server_id: row.id.clone(),
                }
            }
            Err(e) => {
                log::error!("Error saving memory '{}': {}", self.memory.title, e);
                AddOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// No session; only local state changed
    LocalOnly,
    Deleted,
    /// The backend had no such row (already gone, or never inserted)
    NotFoundRemotely,
    RemoteFailed { reason: String },
}

impl DeleteOutcome {
    /// Message to show the user, when the cloud copy may still exist
    pub fn user_warning(&self) -> Option<&'static str> {
        match self {
            DeleteOutcome::RemoteFailed { .. } => Some("Failed to delete memory from cloud."),
            _ => None,
        }
    }
}

/// Delete Memory: remove now, delete remotely, never restore
#[derive(Debug, Clone)]
pub struct DeleteMemory {
    id: String,
}

impl DeleteMemory {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Phase 1: drop the entry; returns it if it was present
    pub fn apply_local(&self, state: &mut AppState) -> Option<Memory> {
        let index = state.memories.iter().position(|m| m.id == self.id)?;
        Some(state.memories.remove(index))
    }

    /// Phase 2: delete the row; yields the number of rows removed
    pub async fn confirm_remote(&self, store: &dyn RemoteStore, session: &Session) -> RemoteResult<usize> {
        store.delete_memory(session, &self.id).await
    }

    /// Phase 3: report. Local state is not touched again.
    pub fn settle(&self, result: &RemoteResult<usize>) -> DeleteOutcome {
        match result {
            Ok(0) => {
                log::warn!("Delete of memory {} matched no remote row", self.id);
                DeleteOutcome::NotFoundRemotely
            }
            Ok(_) => DeleteOutcome::Deleted,
            Err(e) => {
                log::error!("Error deleting memory {}: {}", self.id, e);
                DeleteOutcome::RemoteFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::storage::{parse_calendar_date, MemoryDraft};

    fn draft(title: &str, date: &str) -> Memory {
        let mut draft = MemoryDraft::new(title);
        draft.date = parse_calendar_date(date);
        draft.into_memory()
    }

    fn server_row(id: &str, memory: &Memory) -> MemoryRow {
        MemoryRow {
            id: id.to_string(),
            user_id: Some("user-1".to_string()),
            title: memory.title.clone(),
            date: memory.date.to_string(),
            location_name: Some(memory.location.name.clone()),
            location_x: Some(memory.location.x),
            location_y: Some(memory.location.y),
            category: memory.category.label().to_string(),
            note: Some(memory.note.clone()),
            image_url: memory.image_url.clone(),
        }
    }

    #[test]
    fn test_add_phases_prepend_then_rekey_and_sort() {
        let mut state = AppState::sample();
        let memory = draft("Old photo", "2020-02-02");
        let mut op = AddMemory::new(memory.clone());

        op.apply_local(&mut state);
        assert_eq!(state.memories[0].id, memory.id);
        assert_eq!(state.memories[0].couple_names, vec!["Ayaan", "Sara"]);

        let outcome = op.reconcile(&mut state, &Ok(server_row("srv-1", &memory)));
        assert_eq!(
            outcome,
            AddOutcome::Confirmed {
                server_id: "srv-1".to_string()
            }
        );
        assert!(state.memory(&memory.id).is_none());
        // Oldest date, so it moves to the bottom once order is restored
        assert_eq!(state.memories.last().unwrap().id, "srv-1");
        assert_eq!(state.memories.last().unwrap().title, "Old photo");
    }

    #[test]
    fn test_failed_add_is_kept() {
        let mut state = AppState::sample();
        let memory = draft("Lost", "2024-01-01");
        let mut op = AddMemory::new(memory.clone());
        op.apply_local(&mut state);

        let outcome = op.reconcile(&mut state, &Err(RemoteError::NoSession));
        assert!(matches!(outcome, AddOutcome::Failed { .. }));
        assert!(state.memory(&memory.id).is_some());
    }

    #[test]
    fn test_add_settling_after_local_delete_is_orphaned() {
        let mut state = AppState::sample();
        let memory = draft("Brief", "2024-01-01");
        let mut op = AddMemory::new(memory.clone());
        op.apply_local(&mut state);
        DeleteMemory::new(memory.id.clone()).apply_local(&mut state);

        let outcome = op.reconcile(&mut state, &Ok(server_row("srv-9", &memory)));
        assert_eq!(
            outcome,
            AddOutcome::Orphaned {
                server_id: "srv-9".to_string()
            }
        );
        assert_eq!(state, AppState::sample());
    }

    #[test]
    fn test_delete_phases() {
        let mut state = AppState::sample();
        let op = DeleteMemory::new("1");

        let removed = op.apply_local(&mut state).unwrap();
        assert_eq!(removed.title, "Our First Meeting");
        assert!(state.memory("1").is_none());
        assert!(op.apply_local(&mut state).is_none());

        assert_eq!(op.settle(&Ok(1)), DeleteOutcome::Deleted);
        assert_eq!(op.settle(&Ok(0)), DeleteOutcome::NotFoundRemotely);
        let failed = op.settle(&Err(RemoteError::NotConfigured));
        assert!(failed.user_warning().is_some());
        assert!(DeleteOutcome::NotFoundRemotely.user_warning().is_none());
    }

    #[test]
    fn test_ledger_follows_rekey() {
        let mut ledger = SyncLedger::default();
        ledger.mark("local-1", SyncStatus::Pending);
        ledger.rekey("local-1", "srv-1", SyncStatus::Confirmed);
        ledger.mark("local-2", SyncStatus::Failed("boom".to_string()));

        assert!(ledger.get("local-1").is_none());
        assert_eq!(ledger.get("srv-1"), Some(&SyncStatus::Confirmed));
        assert_eq!(ledger.failed(), vec!["local-2".to_string()]);
    }
}
