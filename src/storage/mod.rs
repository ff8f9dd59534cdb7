//! Persistence layer: durable, crash-safe session storage
//!
//! All writers go through the atomic-replace path in [`fsutil`]; a crash
//! mid-write never leaves a half-written metadata or transcript file
//! observable to readers.

pub mod fsutil;
pub mod store;

pub use store::SessionStore;
