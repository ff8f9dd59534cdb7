//! Takelog - a ledger of spoken takes
//!
//! Records discrete audio takes, transcribes them through an external
//! command, and accumulates the results into ordered per-session
//! transcripts on disk.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Core value objects, entities, and errors
//! - **Application**: The session ledger, the controller, and port interfaces (traits)
//! - **Storage**: The on-disk session tree and atomic-replace writes
//! - **Infrastructure**: Adapter implementations (recorder/transcriber commands, config file)
//! - **CLI**: Command-line interface and argument parsing

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod storage;
