//! Application layer - Use cases and port interfaces
//!
//! Coordinates the domain with external collaborators through ports.

pub mod controller;
pub mod ledger;
pub mod ports;

// Re-export common types
pub use controller::{
    CancelHandle, CancelToken, ControllerError, RetranscribeProgress, RetranscribeReport,
    SessionController, StopOutcome, TakeOutcome,
};
pub use ledger::SessionLedger;
