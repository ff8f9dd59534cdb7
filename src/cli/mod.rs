//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, and the command
//! handlers.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod presenter;

// Re-export commonly used types
pub use args::{Cli, Commands, ConfigAction};
pub use presenter::Presenter;
