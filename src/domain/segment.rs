//! Segment entity: one audio take plus its transcription outcome
//!
//! Segment ids are zero-padded sequence numbers scoped to their session
//! (`seg001`, `seg002`, ...) so lexicographic sort equals creation order.
//! Ids are never reused within a session: a failed transcription attempt
//! keeps its slot instead of collapsing the sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

const SEGMENT_ID_PREFIX: &str = "seg";

/// Per-session segment sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(u32);

impl SegmentId {
    /// The first id allocated in a session
    pub fn first() -> Self {
        Self(1)
    }

    /// The next id in the sequence
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Zero-padded label used in file names and metadata, e.g. `seg007`.
    /// Three digits covers any realistic session length while keeping
    /// labels sortable.
    pub fn label(&self) -> String {
        format!("{}{:03}", SEGMENT_ID_PREFIX, self.0)
    }

    /// Parse a label back into an id. Returns `None` for anything that is
    /// not a `segNNN` label.
    pub fn parse(label: &str) -> Option<Self> {
        let digits = label.strip_prefix(SEGMENT_ID_PREFIX)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Transcription outcome for a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    /// Committed, no transcription attempt finished yet
    #[default]
    Pending,
    Transcribed,
    /// The last transcription attempt failed; the slot is kept
    Failed,
}

impl SegmentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Transcribed => "transcribed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audio/text unit inside a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: SegmentId,
    /// Path to the durable audio artifact, relative to the session
    /// directory. Absent for text-only segments and when the capture
    /// artifact was lost before it could be moved into place.
    pub audio_ref: Option<String>,
    /// Absent until a transcription attempt succeeds
    pub transcript: Option<String>,
    pub status: SegmentStatus,
}

impl Segment {
    /// A freshly committed segment awaiting transcription
    pub fn pending(id: SegmentId, audio_ref: Option<String>) -> Self {
        Self {
            id,
            audio_ref,
            transcript: None,
            status: SegmentStatus::Pending,
        }
    }

    /// A segment whose transcription already succeeded (text-only appends)
    pub fn transcribed(id: SegmentId, audio_ref: Option<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            audio_ref,
            transcript: Some(text.into()),
            status: SegmentStatus::Transcribed,
        }
    }

    /// The text this segment contributes to the transcript view, if any
    pub fn text(&self) -> Option<&str> {
        match self.status {
            SegmentStatus::Transcribed => self.transcript.as_deref(),
            _ => None,
        }
    }
}
