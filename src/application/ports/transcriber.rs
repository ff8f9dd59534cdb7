//! Transcription port interface

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// Transcription errors.
/// The core treats every variant uniformly: the segment is recorded as
/// failed and keeps its slot.
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    #[error("transcriber unavailable: {0}")]
    Unavailable(String),

    #[error("transcription failed: {0}")]
    Failed(String),

    #[error("transcriber returned no text")]
    EmptyResponse,

    #[error("transcription cancelled")]
    Cancelled,
}

/// Port for audio transcription
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio artifact at `audio` to text.
    ///
    /// May be arbitrarily slow; the controller invokes it at most once
    /// at a time.
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError>;
}
