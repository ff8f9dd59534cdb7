//! Command-based capture adapter
//!
//! Spawns an external recorder (arecord, ffmpeg, sox, ...) writing into a
//! temp wav file; the output path is appended as the command's last
//! argument. Stopping kills the recorder and hands over the artifact.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::application::ports::{CaptureError, CaptureSource};

/// Spool file the recorder writes into
struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    fn new() -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path =
            std::env::temp_dir().join(format!("takelog-{}-{}.wav", std::process::id(), timestamp));
        Self { path }
    }
}

struct ActiveCapture {
    child: Child,
    output: TempAudioFile,
}

/// Capture source backed by an external recorder command
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
    active: Mutex<Option<ActiveCapture>>,
    capturing: AtomicBool,
}

impl CommandCapture {
    /// Build from a shell-less command line, e.g.
    /// `arecord -q -f S16_LE -r 16000 -c 1`
    pub fn new(command_line: &str) -> Result<Self, CaptureError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CaptureError::StartFailed("empty capture command".to_string()))?
            .to_string();
        Ok(Self {
            program,
            args: parts.map(str::to_string).collect(),
            active: Mutex::new(None),
            capturing: AtomicBool::new(false),
        })
    }

    async fn reap(mut active: ActiveCapture) -> PathBuf {
        // The recorder runs until killed; an exit error here is expected.
        if active.child.start_kill().is_ok() {
            let _ = active.child.wait().await;
        }
        active.output.path
    }
}

#[async_trait]
impl CaptureSource for CommandCapture {
    async fn start(&self) -> Result<(), CaptureError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(CaptureError::StartFailed(
                "capture already in progress".to_string(),
            ));
        }

        let output = TempAudioFile::new();
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&output.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::StartFailed(format!("{}: {}", self.program, e)))?;

        debug!(program = %self.program, output = %output.path.display(), "recorder spawned");
        *active = Some(ActiveCapture { child, output });
        self.capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<Option<PathBuf>, CaptureError> {
        let Some(active) = self.active.lock().await.take() else {
            return Err(CaptureError::NotCapturing);
        };
        self.capturing.store(false, Ordering::SeqCst);

        let path = Self::reap(active).await;
        let usable = match fs::metadata(&path).await {
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        };
        if !usable {
            warn!(path = %path.display(), "recorder produced no usable artifact");
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(path))
    }

    async fn cancel(&self) -> Result<(), CaptureError> {
        let Some(active) = self.active.lock().await.take() else {
            return Err(CaptureError::NotCapturing);
        };
        self.capturing.store(false, Ordering::SeqCst);

        let path = Self::reap(active).await;
        let _ = fs::remove_file(&path).await;
        debug!("capture cancelled, spool file discarded");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}
