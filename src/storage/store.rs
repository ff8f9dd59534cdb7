//! Session directory store
//!
//! On-disk layout, one directory per session:
//!
//! ```text
//! {root}/{session_id}/
//!   session.json       metadata document (id, name, created_at, segments)
//!   transcript.txt     plain-text transcript view
//!   seg001.txt         per-segment transcript text
//!   audio/seg001.wav   durable audio artifacts, named by segment id
//! ```
//!
//! Metadata and transcript writes always go through atomic replace.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::domain::error::LedgerError;
use crate::domain::segment::{Segment, SegmentId, SegmentStatus};
use crate::domain::session::{Session, SessionId, SessionMeta, SessionSummary};
use crate::storage::fsutil;

pub const METADATA_FILE: &str = "session.json";
pub const TRANSCRIPT_FILE: &str = "transcript.txt";
pub const AUDIO_DIR: &str = "audio";

/// Serialized form of the per-session metadata document
#[derive(Debug, Serialize, Deserialize)]
struct SessionDoc {
    id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    name: Option<String>,
    created_at: DateTime<Local>,
    segments: Vec<SegmentDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SegmentDoc {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    audio: Option<String>,
    status: SegmentStatus,
}

/// Durable store for the session directory tree
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `root` (typically `{data_dir}/sessions`).
    /// Nothing is created until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn metadata_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(METADATA_FILE)
    }

    pub fn transcript_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(TRANSCRIPT_FILE)
    }

    pub fn segment_text_path(&self, id: &SessionId, segment: SegmentId) -> PathBuf {
        self.session_dir(id).join(format!("{}.txt", segment.label()))
    }

    /// Audio path relative to the session directory
    pub fn segment_audio_rel(segment: SegmentId) -> String {
        format!("{}/{}.wav", AUDIO_DIR, segment.label())
    }

    /// Resolve a segment's audio artifact to an absolute path
    pub fn resolve_audio(&self, id: &SessionId, segment: &Segment) -> Option<PathBuf> {
        segment
            .audio_ref
            .as_ref()
            .map(|rel| self.session_dir(id).join(rel))
    }

    pub async fn session_exists(&self, id: &SessionId) -> bool {
        matches!(fs::try_exists(self.metadata_path(id)).await, Ok(true))
    }

    /// Create the session directory tree and its initial empty artifacts
    pub async fn init_session(&self, meta: &SessionMeta) -> Result<(), LedgerError> {
        let dir = self.session_dir(&meta.id);
        let audio = dir.join(AUDIO_DIR);
        fsutil::ensure_dir(&audio)
            .await
            .map_err(|e| LedgerError::io(&audio, e))?;

        let session = Session::new(meta.clone());
        self.write_metadata(&session).await?;
        self.write_transcript(&meta.id, "").await?;
        Ok(())
    }

    /// Flush the metadata document with atomic replace
    pub async fn write_metadata(&self, session: &Session) -> Result<(), LedgerError> {
        let doc = SessionDoc {
            id: session.meta.id.clone(),
            name: session.meta.name.clone(),
            created_at: session.meta.created_at,
            segments: session
                .segments
                .iter()
                .map(|s| SegmentDoc {
                    id: s.id.label(),
                    audio: s.audio_ref.clone(),
                    status: s.status,
                })
                .collect(),
        };
        let path = self.metadata_path(&session.meta.id);
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| LedgerError::corrupt(&path, e.to_string()))?;
        fsutil::atomic_write(&path, &bytes)
            .await
            .map_err(|e| LedgerError::io(&path, e))
    }

    /// Flush the transcript view artifact with atomic replace
    pub async fn write_transcript(&self, id: &SessionId, view: &str) -> Result<(), LedgerError> {
        let path = self.transcript_path(id);
        let content = if view.is_empty() {
            String::new()
        } else {
            format!("{view}\n")
        };
        fsutil::atomic_write(&path, content.as_bytes())
            .await
            .map_err(|e| LedgerError::io(&path, e))
    }

    /// Persist one segment's transcript text beside the metadata
    pub async fn write_segment_text(
        &self,
        id: &SessionId,
        segment: SegmentId,
        text: &str,
    ) -> Result<(), LedgerError> {
        let path = self.segment_text_path(id, segment);
        fsutil::atomic_write(&path, format!("{text}\n").as_bytes())
            .await
            .map_err(|e| LedgerError::io(&path, e))
    }

    /// Move a captured audio artifact into the session directory.
    ///
    /// A missing source is absorbed: the segment proceeds with no audio
    /// rather than failing the take. An actual move failure surfaces as
    /// `Io`; the caller keeps the allocated segment id consumed.
    pub async fn ingest_audio(
        &self,
        id: &SessionId,
        segment: SegmentId,
        src: &Path,
    ) -> Result<Option<String>, LedgerError> {
        if !matches!(fs::try_exists(src).await, Ok(true)) {
            warn!(session = %id, segment = %segment, src = %src.display(),
                  "capture artifact missing, committing segment without audio");
            return Ok(None);
        }

        let audio_dir = self.session_dir(id).join(AUDIO_DIR);
        fsutil::ensure_dir(&audio_dir)
            .await
            .map_err(|e| LedgerError::io(&audio_dir, e))?;

        let rel = Self::segment_audio_rel(segment);
        let dest = self.session_dir(id).join(&rel);
        match fs::rename(src, &dest).await {
            Ok(()) => Ok(Some(rel)),
            // Rename fails across filesystems; fall back to copy + unlink.
            Err(_) => {
                fs::copy(src, &dest)
                    .await
                    .map_err(|e| LedgerError::io(&dest, e))?;
                let _ = fs::remove_file(src).await;
                Ok(Some(rel))
            }
        }
    }

    /// Reconstruct a full session from persisted state
    pub async fn load_session(&self, id: &SessionId) -> Result<Session, LedgerError> {
        let path = self.metadata_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::SessionNotFound(id.clone()))
            }
            Err(e) => return Err(LedgerError::io(&path, e)),
        };

        let doc: SessionDoc = serde_json::from_slice(&bytes)
            .map_err(|e| LedgerError::corrupt(&path, e.to_string()))?;

        let mut segments = Vec::with_capacity(doc.segments.len());
        for seg in doc.segments {
            let seg_id = SegmentId::parse(&seg.id)
                .ok_or_else(|| LedgerError::corrupt(&path, format!("bad segment id {:?}", seg.id)))?;
            let transcript = match seg.status {
                SegmentStatus::Transcribed => self.read_segment_text(id, seg_id).await,
                _ => None,
            };
            segments.push(Segment {
                id: seg_id,
                audio_ref: seg.audio,
                transcript,
                status: seg.status,
            });
        }

        Ok(Session {
            meta: SessionMeta {
                id: doc.id,
                name: doc.name,
                created_at: doc.created_at,
            },
            segments,
        })
    }

    async fn read_segment_text(&self, id: &SessionId, segment: SegmentId) -> Option<String> {
        let path = self.segment_text_path(id, segment);
        match fs::read_to_string(&path).await {
            Ok(text) => Some(text.trim_end_matches('\n').to_string()),
            Err(e) => {
                warn!(session = %id, segment = %segment, error = %e,
                      "transcribed segment has no text file");
                None
            }
        }
    }

    /// Read the persisted transcript view without reconstructing segments
    pub async fn load_transcript(&self, id: &SessionId) -> Result<String, LedgerError> {
        let path = self.transcript_path(id);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(LedgerError::SessionNotFound(id.clone()))
            }
            Err(e) => Err(LedgerError::io(&path, e)),
        }
    }

    /// Session summaries sorted by id ascending (creation order).
    /// Directories that do not look like sessions, or whose metadata
    /// cannot be read, are skipped with a warning rather than failing
    /// the whole listing.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, LedgerError> {
        let mut read_dir = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LedgerError::io(&self.root, e)),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| LedgerError::io(&self.root, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !SessionId::is_valid_format(&name) {
                continue;
            }
            let id = SessionId::new(name);
            match self.load_session(&id).await {
                Ok(session) => summaries.push(SessionSummary {
                    id: session.meta.id,
                    name: session.meta.name,
                    created_at: session.meta.created_at,
                    segments: session.segments.len(),
                }),
                Err(e) => {
                    warn!(session = %id, error = %e, "skipping unreadable session");
                }
            }
        }

        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}
