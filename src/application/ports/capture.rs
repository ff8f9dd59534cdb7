//! Audio capture port interface

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("failed to start capture: {0}")]
    StartFailed(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("no capture in progress")]
    NotCapturing,
}

/// Port for signal-controlled audio capture.
///
/// The collaborator records from "start" until "stop" and hands over the
/// path of a completed audio artifact. It may hand over nothing if the
/// capture produced no usable audio.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Begin capturing audio.
    async fn start(&self) -> Result<(), CaptureError>;

    /// Stop capturing and return the completed artifact, if any.
    ///
    /// Ownership of the artifact transfers to the caller, who is expected
    /// to move it to a durable location.
    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError>;

    /// Discard the in-progress capture without producing an artifact.
    async fn cancel(&self) -> Result<(), CaptureError>;

    /// Check if a capture is in progress
    fn is_capturing(&self) -> bool;
}
