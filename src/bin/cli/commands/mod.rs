pub mod account;
pub mod assist;
pub mod memories;
pub mod profile;
pub mod stats;
pub mod status;
