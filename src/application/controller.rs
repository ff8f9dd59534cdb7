//! Session controller: the state machine driving one recording plus
//! transcription cycle, and the bulk re-transcribe workflow.
//!
//! Only one of {record/stop, retranscribe} may be in flight at a time; a
//! second request is rejected with `Busy` immediately, never queued.
//! Renaming and read-only operations bypass the guard entirely.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::application::ledger::SessionLedger;
use crate::application::ports::{CaptureError, CaptureSource, Transcriber, TranscriptionError};
use crate::domain::error::LedgerError;
use crate::domain::segment::{Segment, SegmentId};
use crate::domain::session::SessionId;
use crate::domain::state::{BusyError, ControllerState, MutationGuard};

/// Errors from the session controller
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Another mutating workflow is in flight
    #[error(transparent)]
    Busy(#[from] BusyError),

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("no sessions recorded yet")]
    NoSessions,
}

/// Cancellation hook for an in-flight transcription.
///
/// Cancelling does not remove the segment: an aborted attempt is recorded
/// as `failed` and keeps its slot, exactly like any other failure.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

/// Sender half of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelToken {
    pub fn pair() -> (CancelHandle, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelToken { rx: Some(rx) })
    }

    /// A token that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Resolves once cancellation is requested; pends forever for a
    /// `never` token
    async fn cancelled(&self) {
        match &self.rx {
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return;
                }
                // A dropped handle means cancellation can no longer happen.
                while rx.changed().await.is_ok() {
                    if *rx.borrow() {
                        return;
                    }
                }
                std::future::pending::<()>().await
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// One committed take: the segment plus a soft warning when its
/// transcription attempt failed
#[derive(Debug)]
pub struct TakeOutcome {
    pub session: SessionId,
    pub segment: Segment,
    /// The absorbed transcription failure, surfaced as a warning. The
    /// audio is already durable either way.
    pub warning: Option<TranscriptionError>,
}

/// Result of stopping a recording
#[derive(Debug)]
pub enum StopOutcome {
    Committed(TakeOutcome),
    /// The capture produced no artifact; nothing was committed
    NothingCaptured,
}

/// Per-segment progress of a bulk re-transcription
pub type RetranscribeProgress = Box<dyn Fn(usize, usize, SegmentId) + Send + Sync>;

/// Summary of a bulk re-transcription run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetranscribeReport {
    pub session: SessionId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Segments without audio (text-only takes) that were left as-is
    pub skipped: usize,
}

/// The session controller, generic over its external collaborators
pub struct SessionController<C, T>
where
    C: CaptureSource,
    T: Transcriber,
{
    capture: C,
    transcriber: T,
    ledger: Arc<SessionLedger>,
    guard: Mutex<MutationGuard>,
}

impl<C, T> SessionController<C, T>
where
    C: CaptureSource,
    T: Transcriber,
{
    pub fn new(capture: C, transcriber: T, ledger: Arc<SessionLedger>) -> Self {
        Self {
            capture,
            transcriber,
            ledger,
            guard: Mutex::new(MutationGuard::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<SessionLedger> {
        &self.ledger
    }

    pub async fn state(&self) -> ControllerState {
        self.guard.lock().await.state()
    }

    /// Start capturing a new take
    pub async fn start_recording(&self) -> Result<(), ControllerError> {
        self.guard.lock().await.begin_recording()?;

        if let Err(e) = self.capture.start().await {
            self.guard.lock().await.finish();
            return Err(e.into());
        }
        info!("recording started");
        Ok(())
    }

    /// Discard the in-progress capture. Pure local operation: no segment
    /// is created, nothing is persisted.
    pub async fn cancel_recording(&self) -> Result<(), ControllerError> {
        self.guard.lock().await.cancel_recording()?;
        if let Err(e) = self.capture.cancel().await {
            warn!(error = %e, "capture cancel reported an error");
        }
        info!("recording cancelled, capture discarded");
        Ok(())
    }

    /// Stop the capture, commit the take, and run one transcription
    /// attempt over it.
    ///
    /// A failed or cancelled transcription still commits the segment (as
    /// `failed`) rather than discarding the captured audio; the failure is
    /// surfaced as a soft warning in the outcome.
    pub async fn stop_recording(&self, cancel: CancelToken) -> Result<StopOutcome, ControllerError> {
        self.guard.lock().await.begin_transcribing()?;
        let result = self.stop_and_transcribe(cancel).await;
        self.guard.lock().await.finish();
        result
    }

    async fn stop_and_transcribe(
        &self,
        cancel: CancelToken,
    ) -> Result<StopOutcome, ControllerError> {
        let artifact = self.capture.stop().await?;
        let Some(artifact) = artifact else {
            warn!("capture produced no artifact, nothing committed");
            return Ok(StopOutcome::NothingCaptured);
        };

        let (session, segment) = self.ledger.begin_take(Some(&artifact)).await?;
        let audio = self
            .ledger
            .audio_path(&session, &segment)
            .unwrap_or(artifact);

        let outcome = self.transcribe_segment(&audio, &cancel).await;
        let warning = outcome.as_ref().err().cloned();
        let segment = self
            .ledger
            .record_transcript(&session, segment.id, outcome)
            .await?;

        Ok(StopOutcome::Committed(TakeOutcome {
            session,
            segment,
            warning,
        }))
    }

    async fn transcribe_segment(
        &self,
        audio: &PathBuf,
        cancel: &CancelToken,
    ) -> Result<String, TranscriptionError> {
        tokio::select! {
            result = self.transcriber.transcribe(audio) => result,
            _ = cancel.cancelled() => Err(TranscriptionError::Cancelled),
        }
    }

    /// Re-run transcription over the most recently created session.
    ///
    /// Segments are processed strictly sequentially in ascending id order,
    /// each one flushed on completion, so an interrupted run leaves a
    /// consistent partial result. With `last_only` only the final segment
    /// is re-transcribed. Text-only segments are skipped.
    pub async fn retranscribe(
        &self,
        last_only: bool,
        progress: Option<RetranscribeProgress>,
        cancel: CancelToken,
    ) -> Result<RetranscribeReport, ControllerError> {
        // The snapshot and the state transition happen under one guard
        // lock: once the state machine admits the run, no concurrent take
        // can have committed between reading the segment list and entering
        // `Retranscribing`.
        let (session, segments) = {
            let mut guard = self.guard.lock().await;
            let Some(session) = self.ledger.latest_session().await? else {
                return Err(ControllerError::NoSessions);
            };
            let mut segments = self.ledger.load_session(&session).await?.segments;
            if last_only {
                segments = segments.split_off(segments.len().saturating_sub(1));
            }
            guard.begin_retranscribe(segments.len())?;
            (session, segments)
        };

        let result = self
            .run_retranscribe(&session, segments, progress, cancel)
            .await;
        self.guard.lock().await.finish();
        result
    }

    async fn run_retranscribe(
        &self,
        session: &SessionId,
        segments: Vec<Segment>,
        progress: Option<RetranscribeProgress>,
        cancel: CancelToken,
    ) -> Result<RetranscribeReport, ControllerError> {
        let total = segments.len();
        let mut report = RetranscribeReport {
            session: session.clone(),
            total,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        };

        info!(session = %session, total, "bulk re-transcription started");
        for (done, segment) in segments.into_iter().enumerate() {
            let Some(audio) = self.ledger.audio_path(session, &segment) else {
                report.skipped += 1;
                self.guard.lock().await.advance_retranscribe();
                if let Some(cb) = &progress {
                    cb(done + 1, total, segment.id);
                }
                continue;
            };

            let outcome = self.transcribe_segment(&audio, &cancel).await;
            let aborted = matches!(outcome, Err(TranscriptionError::Cancelled));
            match &outcome {
                Ok(_) => report.succeeded += 1,
                Err(_) => report.failed += 1,
            }
            self.ledger
                .record_transcript(session, segment.id, outcome)
                .await?;
            self.guard.lock().await.advance_retranscribe();
            if let Some(cb) = &progress {
                cb(done + 1, total, segment.id);
            }
            if aborted {
                warn!(session = %session, segment = %segment.id,
                      "bulk re-transcription aborted, remaining segments untouched");
                break;
            }
        }

        info!(session = %session, succeeded = report.succeeded, failed = report.failed,
              skipped = report.skipped, "bulk re-transcription finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SessionStore;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;
    use tokio::sync::Mutex as TokioMutex;

    /// Capture stub that hands out pre-seeded artifact paths
    struct FakeCapture {
        artifacts: TokioMutex<Vec<Option<PathBuf>>>,
        capturing: AtomicBool,
        cancelled: AtomicBool,
    }

    impl FakeCapture {
        fn with(artifacts: Vec<Option<PathBuf>>) -> Self {
            Self {
                artifacts: TokioMutex::new(artifacts),
                capturing: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl CaptureSource for FakeCapture {
        async fn start(&self) -> Result<(), CaptureError> {
            self.capturing.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<Option<PathBuf>, CaptureError> {
            self.capturing.store(false, Ordering::SeqCst);
            let mut artifacts = self.artifacts.lock().await;
            if artifacts.is_empty() {
                return Ok(None);
            }
            Ok(artifacts.remove(0))
        }

        async fn cancel(&self) -> Result<(), CaptureError> {
            self.capturing.store(false, Ordering::SeqCst);
            self.cancelled.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            self.capturing.load(Ordering::SeqCst)
        }
    }

    /// Transcriber stub that scripts outcomes and records call order
    struct FakeTranscriber {
        outcomes: TokioMutex<Vec<Result<String, TranscriptionError>>>,
        calls: TokioMutex<Vec<PathBuf>>,
    }

    impl FakeTranscriber {
        fn with(outcomes: Vec<Result<String, TranscriptionError>>) -> Self {
            Self {
                outcomes: TokioMutex::new(outcomes),
                calls: TokioMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError> {
            self.calls.lock().await.push(audio.to_path_buf());
            let mut outcomes = self.outcomes.lock().await;
            if outcomes.is_empty() {
                return Err(TranscriptionError::Failed("unscripted call".into()));
            }
            outcomes.remove(0)
        }
    }

    fn controller_in(
        dir: &Path,
        capture: FakeCapture,
        transcriber: FakeTranscriber,
    ) -> SessionController<FakeCapture, FakeTranscriber> {
        let ledger = Arc::new(SessionLedger::new(SessionStore::new(dir.join("sessions"))));
        SessionController::new(capture, transcriber, ledger)
    }

    async fn wav(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, b"RIFFaudio").await.unwrap();
        path
    }

    #[tokio::test]
    async fn record_stop_commits_a_transcribed_take() {
        let dir = tempdir().unwrap();
        let artifact = wav(dir.path(), "take.wav").await;
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![Some(artifact)]),
            FakeTranscriber::with(vec![Ok("hello world".to_string())]),
        );

        controller.start_recording().await.unwrap();
        assert_eq!(controller.state().await, ControllerState::Recording);
        let outcome = controller.stop_recording(CancelToken::never()).await.unwrap();
        assert_eq!(controller.state().await, ControllerState::Idle);

        let StopOutcome::Committed(take) = outcome else {
            panic!("expected a committed take");
        };
        assert!(take.warning.is_none());
        assert_eq!(take.segment.transcript.as_deref(), Some("hello world"));
        assert_eq!(take.segment.audio_ref.as_deref(), Some("audio/seg001.wav"));
        assert_eq!(
            controller.ledger().transcript(&take.session).await.unwrap(),
            "hello world"
        );
    }

    #[tokio::test]
    async fn second_start_is_rejected_with_busy() {
        let dir = tempdir().unwrap();
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![]),
            FakeTranscriber::with(vec![]),
        );

        controller.start_recording().await.unwrap();
        let err = controller.start_recording().await.unwrap_err();
        assert!(matches!(err, ControllerError::Busy(_)));

        // The original recording is unaffected.
        assert_eq!(controller.state().await, ControllerState::Recording);
    }

    #[tokio::test]
    async fn failed_transcription_still_commits_the_segment() {
        let dir = tempdir().unwrap();
        let artifact = wav(dir.path(), "take.wav").await;
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![Some(artifact)]),
            FakeTranscriber::with(vec![Err(TranscriptionError::Failed("engine down".into()))]),
        );

        controller.start_recording().await.unwrap();
        let outcome = controller.stop_recording(CancelToken::never()).await.unwrap();

        let StopOutcome::Committed(take) = outcome else {
            panic!("expected a committed take");
        };
        assert!(take.warning.is_some());
        assert_eq!(take.segment.status, crate::domain::SegmentStatus::Failed);
        // The audio artifact is durable despite the failure.
        let audio = controller
            .ledger()
            .audio_path(&take.session, &take.segment)
            .unwrap();
        assert!(audio.exists());
        assert_eq!(controller.state().await, ControllerState::Idle);
    }

    #[tokio::test]
    async fn stop_with_no_artifact_commits_nothing() {
        let dir = tempdir().unwrap();
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![None]),
            FakeTranscriber::with(vec![]),
        );

        controller.start_recording().await.unwrap();
        let outcome = controller.stop_recording(CancelToken::never()).await.unwrap();
        assert!(matches!(outcome, StopOutcome::NothingCaptured));
        assert!(controller.ledger().active_session().await.is_none());
    }

    #[tokio::test]
    async fn cancel_discards_the_capture_without_a_segment() {
        let dir = tempdir().unwrap();
        let capture = FakeCapture::with(vec![]);
        let controller = controller_in(dir.path(), capture, FakeTranscriber::with(vec![]));

        controller.start_recording().await.unwrap();
        controller.cancel_recording().await.unwrap();

        assert_eq!(controller.state().await, ControllerState::Idle);
        assert!(controller.capture.cancelled.load(Ordering::SeqCst));
        assert!(controller.ledger().active_session().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_transcription_records_a_failed_segment() {
        let dir = tempdir().unwrap();
        let artifact = wav(dir.path(), "take.wav").await;
        // A zero-permit gate parks the transcriber forever, so only the
        // cancel arm of the select can win.
        let ledger = Arc::new(SessionLedger::new(SessionStore::new(
            dir.path().join("sessions"),
        )));
        let controller = SessionController::new(
            FakeCapture::with(vec![Some(artifact)]),
            GatedTranscriber {
                gate: tokio::sync::Semaphore::new(0),
            },
            ledger,
        );

        let (handle, token) = CancelToken::pair();
        handle.cancel();
        controller.start_recording().await.unwrap();
        let outcome = controller.stop_recording(token).await.unwrap();

        let StopOutcome::Committed(take) = outcome else {
            panic!("expected a committed take");
        };
        assert!(matches!(
            take.warning,
            Some(TranscriptionError::Cancelled)
        ));
        assert_eq!(take.segment.status, crate::domain::SegmentStatus::Failed);
    }

    #[tokio::test]
    async fn retranscribe_visits_segments_in_order_and_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let a1 = wav(dir.path(), "a1.wav").await;
        let a2 = wav(dir.path(), "a2.wav").await;
        let a3 = wav(dir.path(), "a3.wav").await;
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![Some(a1), Some(a2), Some(a3)]),
            FakeTranscriber::with(vec![
                Ok("one".to_string()),
                Err(TranscriptionError::Failed("flaky".into())),
                Ok("three".to_string()),
                // Bulk pass outcomes.
                Ok("ONE".to_string()),
                Ok("TWO".to_string()),
                Ok("THREE".to_string()),
            ]),
        );

        let mut session = None;
        for _ in 0..3 {
            controller.start_recording().await.unwrap();
            match controller.stop_recording(CancelToken::never()).await.unwrap() {
                StopOutcome::Committed(take) => session = Some(take.session),
                StopOutcome::NothingCaptured => panic!("artifact expected"),
            }
        }
        let session = session.unwrap();
        assert_eq!(
            controller.ledger().transcript(&session).await.unwrap(),
            "one\n\nthree"
        );

        let report = controller
            .retranscribe(false, None, CancelToken::never())
            .await
            .unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);

        // Re-invoked for all three, in ascending id order.
        let calls = controller.transcriber.calls.lock().await;
        let bulk: Vec<String> = calls[3..]
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(bulk, vec!["seg001.wav", "seg002.wav", "seg003.wav"]);
        drop(calls);

        // The failed middle slot was filled in place.
        assert_eq!(
            controller.ledger().transcript(&session).await.unwrap(),
            "ONE\n\nTWO\n\nTHREE"
        );
    }

    #[tokio::test]
    async fn retranscribe_skips_text_only_segments() {
        let dir = tempdir().unwrap();
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![]),
            FakeTranscriber::with(vec![]),
        );
        controller.ledger().append(None, "typed note").await.unwrap();

        let report = controller
            .retranscribe(false, None, CancelToken::never())
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.succeeded, 0);

        let session = report.session;
        assert_eq!(
            controller.ledger().transcript(&session).await.unwrap(),
            "typed note"
        );
    }

    #[tokio::test]
    async fn retranscribe_with_no_sessions_fails_cleanly() {
        let dir = tempdir().unwrap();
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![]),
            FakeTranscriber::with(vec![]),
        );
        let err = controller
            .retranscribe(false, None, CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::NoSessions));
        assert_eq!(controller.state().await, ControllerState::Idle);
    }

    #[tokio::test]
    async fn retranscribe_last_only_touches_the_final_segment() {
        let dir = tempdir().unwrap();
        let a1 = wav(dir.path(), "a1.wav").await;
        let a2 = wav(dir.path(), "a2.wav").await;
        let controller = controller_in(
            dir.path(),
            FakeCapture::with(vec![Some(a1), Some(a2)]),
            FakeTranscriber::with(vec![
                Ok("one".to_string()),
                Ok("two".to_string()),
                Ok("TWO".to_string()),
            ]),
        );

        for _ in 0..2 {
            controller.start_recording().await.unwrap();
            controller.stop_recording(CancelToken::never()).await.unwrap();
        }

        let report = controller
            .retranscribe(true, None, CancelToken::never())
            .await
            .unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.succeeded, 1);

        assert_eq!(
            controller.ledger().transcript(&report.session).await.unwrap(),
            "one\n\nTWO"
        );
    }

    /// Transcriber stub that parks every call until a permit is released
    struct GatedTranscriber {
        gate: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl Transcriber for GatedTranscriber {
        async fn transcribe(&self, _audio: &Path) -> Result<String, TranscriptionError> {
            match self.gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(TranscriptionError::Cancelled),
            }
            Ok("redone".to_string())
        }
    }

    #[tokio::test]
    async fn bulk_run_admitted_after_a_take_always_covers_it() {
        let dir = tempdir().unwrap();
        let a1 = wav(dir.path(), "a1.wav").await;
        let a2 = wav(dir.path(), "a2.wav").await;
        let ledger = Arc::new(SessionLedger::new(SessionStore::new(
            dir.path().join("sessions"),
        )));
        let controller = Arc::new(SessionController::new(
            FakeCapture::with(vec![Some(a1), Some(a2)]),
            GatedTranscriber {
                gate: tokio::sync::Semaphore::new(0),
            },
            ledger,
        ));

        // First take goes straight through.
        controller.start_recording().await.unwrap();
        controller.transcriber.gate.add_permits(1);
        controller.stop_recording(CancelToken::never()).await.unwrap();

        // Second take parks in `transcribing`. A bulk run requested now
        // must be rejected outright, never run on the one-segment snapshot.
        controller.start_recording().await.unwrap();
        let stopper = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.stop_recording(CancelToken::never()).await })
        };
        while controller.state().await != ControllerState::Transcribing {
            tokio::task::yield_now().await;
        }
        let err = controller
            .retranscribe(false, None, CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ControllerError::Busy(_)));

        // Once the take commits, the next admitted run sees both segments.
        controller.transcriber.gate.add_permits(1);
        let outcome = stopper.await.unwrap().unwrap();
        assert!(matches!(outcome, StopOutcome::Committed(_)));

        controller.transcriber.gate.add_permits(2);
        let report = controller
            .retranscribe(false, None, CancelToken::never())
            .await
            .unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(controller.state().await, ControllerState::Idle);
    }
}
