//! Session identity and metadata
//!
//! A session (a discussion, in user terms) is one ordered sequence of
//! recorded takes with its own directory on disk. Session ids are derived
//! from creation time so that lexicographic order equals creation order.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::segment::Segment;

/// Timestamp format backing session ids, e.g. `20260829_174502`.
pub const SESSION_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Separator between takes in the concatenated transcript view
pub const VIEW_SEPARATOR: &str = "\n\n";

/// Opaque, lexicographically sortable session identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Derive an id from a creation timestamp
    pub fn from_datetime(at: DateTime<Local>) -> Self {
        Self(at.format(SESSION_ID_FORMAT).to_string())
    }

    /// Accept an externally supplied id (directory name, CLI argument)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Whether `name` has the shape of a session id.
    /// Used to skip stray directories when listing.
    pub fn is_valid_format(name: &str) -> bool {
        NaiveDateTime::parse_from_str(name, SESSION_ID_FORMAT).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session metadata: id, optional display name, immutable creation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMeta {
    pub id: SessionId,
    pub name: Option<String>,
    pub created_at: DateTime<Local>,
}

impl SessionMeta {
    /// Create metadata for a session born at `at`
    pub fn new_at(at: DateTime<Local>) -> Self {
        Self {
            id: SessionId::from_datetime(at),
            name: None,
            created_at: at,
        }
    }

    /// Display label: the user-assigned name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

/// A fully reconstructed session: metadata plus its ordered segments
#[derive(Debug, Clone)]
pub struct Session {
    pub meta: SessionMeta,
    pub segments: Vec<Segment>,
}

impl Session {
    pub fn new(meta: SessionMeta) -> Self {
        Self {
            meta,
            segments: Vec::new(),
        }
    }

    /// Rebuild the transcript view from the segment sequence.
    ///
    /// Transcribed segments contribute their text in id order, joined by a
    /// blank line. Pending and failed segments are skipped, never rendered
    /// as empty entries, so a bad transcription attempt leaves no gap
    /// marker; re-transcription later fills the slot in place.
    pub fn transcript_view(&self) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .filter_map(|s| s.text())
            .filter(|t| !t.is_empty())
            .collect();
        parts.join(VIEW_SEPARATOR)
    }
}

/// Lightweight session record for listings
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: Option<String>,
    pub created_at: DateTime<Local>,
    pub segments: usize,
}

impl SessionSummary {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.id.as_str())
    }

    /// Case-insensitive substring match against id and name
    pub fn matches(&self, filter: &str) -> bool {
        let needle = filter.to_lowercase();
        self.id.as_str().to_lowercase().contains(&needle)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
    }
}
