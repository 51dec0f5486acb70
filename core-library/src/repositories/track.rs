//! Track repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Track;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::debug;

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by its local ID
    ///
    /// # Returns
    /// - `Ok(Some(track))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>>;

    /// Find the track bound to a remote object
    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Track>>;

    /// All tracks bound to a remote object
    async fn list_with_remote_id(&self) -> Result<Vec<Track>>;

    /// Tracks that have never been exported
    async fn list_without_remote_id(&self) -> Result<Vec<Track>>;

    /// Insert a new track
    ///
    /// # Errors
    /// Returns error if:
    /// - Track with same ID or same remote ID already exists
    /// - Track validation fails
    /// - Database error occurs
    async fn insert(&self, track: &Track) -> Result<()>;

    /// Update an existing track
    ///
    /// # Errors
    /// Returns error if:
    /// - Track does not exist
    /// - Track validation fails
    /// - Database error occurs
    async fn update(&self, track: &Track) -> Result<()>;

    /// Delete a track by ID
    ///
    /// # Returns
    /// - `Ok(true)` if track was deleted
    /// - `Ok(false)` if track was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Count total tracks
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    /// Create a new SQLite track repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn validate(track: &Track) -> Result<()> {
    track.validate().map_err(|msg| LibraryError::InvalidInput {
        field: "track".to_string(),
        message: msg,
    })
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE remote_id = ?")
            .bind(remote_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn list_with_remote_id(&self) -> Result<Vec<Track>> {
        let tracks = query_as::<_, Track>(
            "SELECT * FROM tracks WHERE remote_id IS NOT NULL ORDER BY modified_time, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }

    async fn list_without_remote_id(&self) -> Result<Vec<Track>> {
        let tracks = query_as::<_, Track>(
            "SELECT * FROM tracks WHERE remote_id IS NULL ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tracks)
    }

    async fn insert(&self, track: &Track) -> Result<()> {
        validate(track)?;

        sqlx::query(
            r#"
            INSERT INTO tracks (
                id, remote_id, name, description, payload,
                modified_time, shared_with_me, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.id)
        .bind(&track.remote_id)
        .bind(&track.name)
        .bind(&track.description)
        .bind(&track.payload)
        .bind(track.modified_time)
        .bind(track.shared_with_me)
        .bind(track.created_at)
        .bind(track.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(track_id = %track.id, remote_id = ?track.remote_id, "Inserted track");
        Ok(())
    }

    async fn update(&self, track: &Track) -> Result<()> {
        validate(track)?;

        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                remote_id = ?,
                name = ?,
                description = ?,
                payload = ?,
                modified_time = ?,
                shared_with_me = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&track.remote_id)
        .bind(&track.name)
        .bind(&track.description)
        .bind(&track.payload)
        .bind(track.modified_time)
        .bind(track.shared_with_me)
        .bind(track.updated_at)
        .bind(&track.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Track".to_string(),
                id: track.id.clone(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
