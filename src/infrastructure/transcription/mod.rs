//! Transcription adapters

pub mod command;

pub use command::CommandTranscriber;
