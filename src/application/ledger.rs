//! Session ledger and buffer aggregator
//!
//! The ledger owns the ordered segment sequence of every session, the
//! "active session" new takes go to, and the derived transcript view.
//! All mutations of one session are serialized through that session's
//! own async mutex; operations on different sessions never serialize
//! against each other. Every mutation is flushed through the persistence
//! layer before it returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::ports::TranscriptionError;
use crate::domain::error::LedgerError;
use crate::domain::segment::{Segment, SegmentId, SegmentStatus};
use crate::domain::session::{Session, SessionId, SessionMeta, SessionSummary};
use crate::storage::SessionStore;

/// Per-session in-memory state guarded by one mutex
struct SessionState {
    session: Session,
    /// Cached transcript view; rebuilt from the segments when absent.
    /// Purely derived, never hand-patched.
    view: Option<String>,
}

impl SessionState {
    fn next_segment_id(&self) -> SegmentId {
        self.session
            .segments
            .last()
            .map(|s| s.id.next())
            .unwrap_or_else(SegmentId::first)
    }
}

/// The session/segment ledger
pub struct SessionLedger {
    store: SessionStore,
    /// The session new segments go to. None until the first commit after
    /// start-up, and again after `new_session`.
    active: Mutex<Option<SessionId>>,
    /// Loaded sessions, each behind its own mutex. Lock order is always
    /// `active` then `sessions` then a session's state.
    sessions: Mutex<HashMap<SessionId, Arc<Mutex<SessionState>>>>,
}

impl SessionLedger {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            active: Mutex::new(None),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Absolute path of a segment's audio artifact, if it has one
    pub fn audio_path(&self, session: &SessionId, segment: &Segment) -> Option<PathBuf> {
        self.store.resolve_audio(session, segment)
    }

    /// The session currently receiving new takes, if any
    pub async fn active_session(&self) -> Option<SessionId> {
        self.active.lock().await.clone()
    }

    /// Close the active session. The next committed take starts a fresh
    /// session; already persisted state is untouched.
    pub async fn new_session(&self) {
        let mut active = self.active.lock().await;
        if let Some(id) = active.take() {
            info!(session = %id, "closed active session");
        }
    }

    /// Handle for an already persisted session; loads it on first touch.
    async fn handle(&self, id: &SessionId) -> Result<Arc<Mutex<SessionState>>, LedgerError> {
        {
            let sessions = self.sessions.lock().await;
            if let Some(handle) = sessions.get(id) {
                return Ok(handle.clone());
            }
        }

        // Load outside the map lock; if two callers race, the first insert
        // wins and both end up on the same mutex.
        let session = self.store.load_session(id).await?;
        let mut sessions = self.sessions.lock().await;
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionState {
                    session,
                    view: None,
                }))
            })
            .clone();
        Ok(handle)
    }

    /// Resolve the active session, creating one lazily if none exists.
    ///
    /// Exactly one session is active at a time; creation races are settled
    /// by holding the `active` lock across the directory initialization.
    async fn ensure_active(&self) -> Result<Arc<Mutex<SessionState>>, LedgerError> {
        let mut active = self.active.lock().await;
        if let Some(id) = active.clone() {
            return self.handle(&id).await;
        }

        // Session ids have one-second resolution; bump until free so two
        // sessions born within the same second get distinct ids.
        let mut at = Local::now();
        loop {
            let candidate = SessionId::from_datetime(at);
            if !self.store.session_exists(&candidate).await {
                break;
            }
            at += ChronoDuration::seconds(1);
        }

        let meta = SessionMeta::new_at(at);
        self.store.init_session(&meta).await?;
        info!(session = %meta.id, "started new session");

        let handle = Arc::new(Mutex::new(SessionState {
            session: Session::new(meta.clone()),
            view: Some(String::new()),
        }));
        self.sessions
            .lock()
            .await
            .insert(meta.id.clone(), handle.clone());
        *active = Some(meta.id);
        Ok(handle)
    }

    /// Commit a new take to the active session: allocate the next segment
    /// id, move the audio artifact into place, persist a `pending` segment.
    ///
    /// A missing artifact is absorbed (the segment proceeds without audio).
    /// An actual move failure surfaces as `Io`, but the allocated id stays
    /// consumed: the segment is committed as `failed` with no audio so the
    /// sequence stays gapless and strictly monotonic.
    pub async fn begin_take(
        &self,
        audio: Option<&Path>,
    ) -> Result<(SessionId, Segment), LedgerError> {
        let handle = self.ensure_active().await?;
        let mut state = handle.lock().await;
        let session_id = state.session.meta.id.clone();
        let id = state.next_segment_id();

        let (audio_ref, move_err) = match audio {
            Some(src) => match self.store.ingest_audio(&session_id, id, src).await {
                Ok(rel) => (rel, None),
                Err(e) => (None, Some(e)),
            },
            None => (None, None),
        };

        let segment = match move_err {
            None => Segment::pending(id, audio_ref),
            Some(_) => Segment {
                id,
                audio_ref: None,
                transcript: None,
                status: SegmentStatus::Failed,
            },
        };
        state.session.segments.push(segment.clone());
        state.view = None;
        self.store.write_metadata(&state.session).await?;

        match move_err {
            Some(e) => Err(e),
            None => {
                debug!(session = %session_id, segment = %id, "committed take");
                Ok((session_id, segment))
            }
        }
    }

    /// Record the outcome of one transcription attempt for a segment.
    ///
    /// Success overwrites the transcript and flips the status to
    /// `transcribed`; failure flips it to `failed` and keeps the slot.
    /// Either way the transcript view is rebuilt and flushed, so a partial
    /// bulk run always leaves a consistent, inspectable state on disk.
    /// Idempotent: repeating the same outcome only re-persists.
    pub async fn record_transcript(
        &self,
        session: &SessionId,
        segment: SegmentId,
        outcome: Result<String, TranscriptionError>,
    ) -> Result<Segment, LedgerError> {
        let handle = self.handle(session).await?;
        let mut state = handle.lock().await;
        let Some(pos) = state.session.segments.iter().position(|s| s.id == segment) else {
            return Err(LedgerError::SegmentNotFound {
                session: session.clone(),
                segment,
            });
        };

        match outcome {
            Ok(text) => {
                let text = text.trim().to_string();
                self.store.write_segment_text(session, segment, &text).await?;
                let slot = &mut state.session.segments[pos];
                slot.transcript = Some(text);
                slot.status = SegmentStatus::Transcribed;
            }
            Err(e) => {
                warn!(session = %session, segment = %segment, error = %e,
                      "transcription attempt failed, slot kept");
                state.session.segments[pos].status = SegmentStatus::Failed;
            }
        }

        let view = state.session.transcript_view();
        self.store.write_transcript(session, &view).await?;
        self.store.write_metadata(&state.session).await?;
        state.view = Some(view);
        Ok(state.session.segments[pos].clone())
    }

    /// Append a text-only take.
    ///
    /// Text that is blank after trimming is a no-op: no segment, no flush.
    /// With `session = None` the take goes to the active session (created
    /// lazily); with an explicit id it goes to that session, which must
    /// exist.
    pub async fn append(
        &self,
        session: Option<&SessionId>,
        text: &str,
    ) -> Result<Option<(SessionId, Segment)>, LedgerError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let handle = match session {
            Some(id) => self.handle(id).await?,
            None => self.ensure_active().await?,
        };
        let mut state = handle.lock().await;
        let session_id = state.session.meta.id.clone();
        let id = state.next_segment_id();

        self.store.write_segment_text(&session_id, id, trimmed).await?;
        let segment = Segment::transcribed(id, None, trimmed);
        state.session.segments.push(segment.clone());
        let view = state.session.transcript_view();
        self.store.write_transcript(&session_id, &view).await?;
        self.store.write_metadata(&state.session).await?;
        state.view = Some(view);

        debug!(session = %session_id, segment = %id, "appended text take");
        Ok(Some((session_id, segment)))
    }

    /// Current concatenated transcript of a session, recomputed from the
    /// segment sequence when the cache is absent
    pub async fn transcript(&self, session: &SessionId) -> Result<String, LedgerError> {
        let handle = self.handle(session).await?;
        let mut state = handle.lock().await;
        if state.view.is_none() {
            state.view = Some(state.session.transcript_view());
        }
        Ok(state.view.clone().unwrap_or_default())
    }

    /// The persisted transcript artifact, read back exactly as it was
    /// last flushed. `NotFound` when the session has no artifact on disk.
    pub async fn persisted_transcript(&self, session: &SessionId) -> Result<String, LedgerError> {
        self.store.load_transcript(session).await
    }

    /// Set a session's display name. Never blocked by recording or
    /// transcription. Renaming the active session closes it: the next take
    /// starts a fresh session.
    pub async fn rename(&self, session: &SessionId, name: &str) -> Result<(), LedgerError> {
        let mut active = self.active.lock().await;
        let handle = self.handle(session).await?;
        {
            let mut state = handle.lock().await;
            state.session.meta.name = Some(name.to_string());
            self.store.write_metadata(&state.session).await?;
        }
        if active.as_ref() == Some(session) {
            *active = None;
        }
        info!(session = %session, name, "renamed session");
        Ok(())
    }

    /// Session summaries in creation order, optionally filtered by a
    /// case-insensitive substring over id and name
    pub async fn list_sessions(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<SessionSummary>, LedgerError> {
        let mut summaries = self.store.list_sessions().await?;
        if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
            summaries.retain(|s| s.matches(filter));
        }
        Ok(summaries)
    }

    /// Full reconstruction of a session (metadata plus ordered segments)
    pub async fn load_session(&self, session: &SessionId) -> Result<Session, LedgerError> {
        let handle = self.handle(session).await?;
        let state = handle.lock().await;
        Ok(state.session.clone())
    }

    /// Most recently created session on disk, if any
    pub async fn latest_session(&self) -> Result<Option<SessionId>, LedgerError> {
        let mut summaries = self.store.list_sessions().await?;
        Ok(summaries.pop().map(|s| s.id))
    }
}
