use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Type-safe ID wrappers
// =============================================================================

/// Unique identifier for a local track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Track content decoded from a file, before it is bound to a local record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackDraft {
    /// Name embedded in the file
    pub name: String,
    pub description: Option<String>,
    /// Geometry and statistics, opaque to the store
    pub payload: Vec<u8>,
}

/// Recorded track as held by the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Track {
    pub id: String,
    /// Id of the remote object this track mirrors; unique when set
    pub remote_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub payload: Vec<u8>,
    /// Last modification, milliseconds since the Unix epoch
    pub modified_time: i64,
    /// Imported from another user's share; never written back
    pub shared_with_me: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Track {
    /// New local track that has never been synced.
    pub fn new(name: impl Into<String>, payload: Vec<u8>, modified_time: i64) -> Self {
        Self {
            id: TrackId::new().to_string(),
            remote_id: None,
            name: name.into(),
            description: None,
            payload,
            modified_time,
            shared_with_me: false,
            created_at: modified_time,
            updated_at: modified_time,
        }
    }

    /// Track imported from a remote object.
    pub fn from_draft(draft: TrackDraft, remote_id: impl Into<String>, modified_time: i64) -> Self {
        Self {
            id: TrackId::new().to_string(),
            remote_id: Some(remote_id.into()),
            name: draft.name,
            description: draft.description,
            payload: draft.payload,
            modified_time,
            shared_with_me: false,
            created_at: modified_time,
            updated_at: modified_time,
        }
    }

    /// Replace content with a decoded draft, keeping identity and sync binding.
    pub fn apply_draft(&mut self, draft: TrackDraft) {
        self.name = draft.name;
        self.description = draft.description;
        self.payload = draft.payload;
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }

        if self.name.trim().is_empty() {
            return Err("Track name cannot be empty".to_string());
        }

        if self.modified_time < 0 {
            return Err("Track modified time cannot be negative".to_string());
        }

        if matches!(self.remote_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err("Remote id cannot be blank".to_string());
        }

        Ok(())
    }
}
