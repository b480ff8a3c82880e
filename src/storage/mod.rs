mod local_slots;
mod models;

pub use local_slots::{LocalSlots, Slot, StorageError};
pub use models::*;
