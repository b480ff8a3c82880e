//! Memory Lane: a shared scrapbook for couples.
//!
//! Memories live in a cloud backend when signed in and in a local cache
//! otherwise. `session::SessionContainer` owns the state and applies every
//! change optimistically before confirming it remotely.

pub mod assist;
pub mod config;
pub mod remote;
pub mod session;
pub mod stats;
pub mod storage;
