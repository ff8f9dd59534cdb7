//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external recorder/transcriber commands and the
//! config file.

pub mod capture;
pub mod config;
pub mod transcription;

// Re-export adapters
pub use capture::CommandCapture;
pub use config::XdgConfigStore;
pub use transcription::CommandTranscriber;
