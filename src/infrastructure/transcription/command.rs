//! Command-based transcriber adapter
//!
//! Runs a user-configured command (whisper-cli, a wrapper script, ...)
//! with the audio path appended as the last argument and takes its stdout
//! as the transcript.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::application::ports::{Transcriber, TranscriptionError};

/// Transcriber backed by an external command
pub struct CommandTranscriber {
    program: String,
    args: Vec<String>,
}

impl CommandTranscriber {
    /// Build from a shell-less command line, e.g. `whisper-cli -m base.bin`
    pub fn new(command_line: &str) -> Result<Self, TranscriptionError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| {
                TranscriptionError::Unavailable("empty transcribe command".to_string())
            })?
            .to_string();
        Ok(Self {
            program,
            args: parts.map(str::to_string).collect(),
        })
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError> {
        debug!(program = %self.program, audio = %audio.display(), "invoking transcriber");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(audio)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscriptionError::Unavailable(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(TranscriptionError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandTranscriber::new("").is_err());
    }

    #[tokio::test]
    async fn stdout_becomes_the_transcript() {
        let transcriber = CommandTranscriber::new("echo transcribed text for").unwrap();
        let text = transcriber
            .transcribe(Path::new("/tmp/a.wav"))
            .await
            .unwrap();
        assert_eq!(text, "transcribed text for /tmp/a.wav");
    }

    #[tokio::test]
    async fn failing_command_surfaces_stderr() {
        let transcriber = CommandTranscriber::new("ls /definitely/not/here").unwrap();
        let err = transcriber
            .transcribe(Path::new("/tmp/a.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Failed(_)));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let transcriber = CommandTranscriber::new("takelog-no-such-binary").unwrap();
        let err = transcriber
            .transcribe(Path::new("/tmp/a.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn dropped_transcription_kills_the_child() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = dir.path().join("slow-transcriber");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 1\ntouch {}\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transcriber = CommandTranscriber::new(script.to_str().unwrap()).unwrap();
        let audio = dir.path().join("a.wav");
        std::fs::write(&audio, b"x").unwrap();

        // Dropping the in-flight future, as a fired cancel token does,
        // must take the external process down with it.
        tokio::select! {
            _ = transcriber.transcribe(&audio) => panic!("transcriber should still be sleeping"),
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "transcriber child survived cancellation");
    }
}
