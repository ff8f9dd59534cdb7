//! Port interfaces (traits) for external collaborators
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod transcriber;

// Re-export common types
pub use capture::{CaptureError, CaptureSource};
pub use config::ConfigStore;
pub use transcriber::{Transcriber, TranscriptionError};
