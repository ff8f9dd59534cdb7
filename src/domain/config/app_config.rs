//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default external recorder command; the output wav path is appended as
/// the last argument.
pub const DEFAULT_CAPTURE_COMMAND: &str = "arecord -q -f S16_LE -r 16000 -c 1";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory holding the session tree
    pub data_dir: Option<String>,
    /// External command that records audio into the path appended to it
    pub capture_command: Option<String>,
    /// External command that prints a transcript of the audio path
    /// appended to it
    pub transcribe_command: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            data_dir: None,
            capture_command: Some(DEFAULT_CAPTURE_COMMAND.to_string()),
            transcribe_command: None,
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            data_dir: other.data_dir.or(self.data_dir),
            capture_command: other.capture_command.or(self.capture_command),
            transcribe_command: other.transcribe_command.or(self.transcribe_command),
        }
    }

    /// Resolve the data directory, falling back to the platform data dir
    pub fn data_dir_or_default(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("takelog"),
        }
    }

    pub fn capture_command_or_default(&self) -> &str {
        self.capture_command
            .as_deref()
            .unwrap_or(DEFAULT_CAPTURE_COMMAND)
    }
}
