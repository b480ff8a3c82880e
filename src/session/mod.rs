//! The single owner of application state and everything that changes it.
//!
//! `SessionContainer` holds the state; the loader, cache mirror and mutation
//! pipeline feed it, and `AuthTransitionHandler` keeps it in step with the
//! auth provider.

mod account;
mod auth;
mod cache;
mod container;
mod loader;
mod pipeline;

pub use account::{AccountError, SignUpOutcome};
pub use auth::{AuthPhase, AuthTransitionHandler, Route};
pub use cache::CacheMirror;
pub use container::SessionContainer;
pub use loader::{Loaded, SessionLoader};
pub use pipeline::{AddMemory, AddOutcome, DeleteMemory, DeleteOutcome, SyncLedger, SyncStatus};
