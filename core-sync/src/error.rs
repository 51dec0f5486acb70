use core_auth::AuthError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote rejected the access token.
    #[error("Remote rejected the credential: {0}")]
    Unauthorized(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Still failing after the retry budget was spent.
    #[error("Transient remote failure: {0}")]
    Transient(String),

    #[error("Remote object not found: {0}")]
    RemoteNotFound(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Sync folder '{0}' could not be resolved")]
    FolderUnresolvable(String),

    #[error("Failed to decode remote object {object_id}: {message}")]
    Decode { object_id: String, message: String },

    #[error("Failed to encode track {track_id}: {message}")]
    Encode { track_id: String, message: String },

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Persisted sync state is unreadable or could not be written.
    #[error("Sync state error: {0}")]
    State(String),

    #[error("Sync already in progress for profile {profile_id}")]
    SyncInProgress { profile_id: String },

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// A fresh credential may fix this without user involvement.
    pub fn is_auth_recoverable(&self) -> bool {
        matches!(self, SyncError::Unauthorized(_))
    }

    /// The next scheduled pass may succeed without any intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transient(_)
            | SyncError::RemoteNotFound(_)
            | SyncError::SyncInProgress { .. }
            | SyncError::Timeout(_)
            | SyncError::Cancelled => true,
            SyncError::Auth(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Failure scoped to a single remote object. The pass skips the object
    /// and carries on.
    pub fn is_per_object(&self) -> bool {
        matches!(
            self,
            SyncError::Transient(_)
                | SyncError::RemoteNotFound(_)
                | SyncError::Remote(_)
                | SyncError::Decode { .. }
                | SyncError::Encode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
