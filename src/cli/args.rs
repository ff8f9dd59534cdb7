//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Takelog - record spoken takes and accumulate ordered transcripts
#[derive(Parser, Debug)]
#[command(name = "takelog")]
#[command(version)]
#[command(about = "Record spoken takes, transcribe them, and keep ordered per-session transcripts")]
#[command(long_about = None)]
pub struct Cli {
    /// Data directory holding the session tree
    #[arg(long, value_name = "DIR", env = "TAKELOG_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive recording: Enter toggles record/stop, each stop
    /// transcribes and appends a take
    Record {
        /// Recorder command; the output wav path is appended
        #[arg(long, value_name = "CMD")]
        capture_command: Option<String>,

        /// Transcriber command; the audio path is appended, stdout is
        /// taken as the transcript
        #[arg(long, value_name = "CMD", env = "TAKELOG_TRANSCRIBE_COMMAND")]
        transcribe_command: Option<String>,
    },
    /// Append a text-only take
    Add {
        /// Session to append to; a new session is started when omitted
        #[arg(short, long, value_name = "ID")]
        session: Option<String>,

        /// The text to append
        text: Vec<String>,
    },
    /// List recorded sessions
    Sessions {
        /// Only sessions whose id or name contains this text
        #[arg(short, long, value_name = "TEXT")]
        filter: Option<String>,
    },
    /// Print a session's full transcript
    Show {
        /// Session id
        session: String,
    },
    /// Rename a session
    Rename {
        /// Session id
        session: String,
        /// New display name
        name: String,
    },
    /// Re-run transcription over the latest session's takes
    Retranscribe {
        /// Only the most recent take
        #[arg(long)]
        last: bool,

        /// Transcriber command; the audio path is appended
        #[arg(long, value_name = "CMD", env = "TAKELOG_TRANSCRIBE_COMMAND")]
        transcribe_command: Option<String>,
    },
    /// Export a session's transcript to a file
    Export {
        /// Session id
        session: String,
        /// Destination path
        output: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Valid configuration keys
pub const VALID_CONFIG_KEYS: &[&str] = &["data_dir", "capture_command", "transcribe_command"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
