//! Persisted per-account sync state
//!
//! Three independent keys in the host [`SettingsStore`]:
//!
//! - `sync.<profile>.largest_change_id` (i64): change cursor; absent forces a full pass
//! - `sync.<profile>.pending_deletion_ids` (JSON array): remote ids awaiting deletion
//! - `sync.<profile>.recording_track_id` (string): track currently being recorded
//!
//! Writers of the pending deletion queue hold a per-profile lock so that a
//! local delete queued during a drain is not lost when the drain rewrites it.

use crate::error::{Result, SyncError};
use bridge_traits::error::BridgeError;
use bridge_traits::SettingsStore;
use core_auth::ProfileId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SyncStateStore {
    store: Arc<dyn SettingsStore>,
    profile_id: ProfileId,
    lock: Arc<Mutex<()>>,
}

impl SyncStateStore {
    pub fn new(store: Arc<dyn SettingsStore>, profile_id: ProfileId) -> Self {
        Self::with_lock(store, profile_id, Arc::new(Mutex::new(())))
    }

    /// Share `lock` with every other state handle of the same profile.
    pub fn with_lock(
        store: Arc<dyn SettingsStore>,
        profile_id: ProfileId,
        lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            store,
            profile_id,
            lock,
        }
    }

    pub fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    fn key(&self, name: &str) -> String {
        format!("sync.{}.{}", self.profile_id, name)
    }

    // ========================================================================
    // Change cursor
    // ========================================================================

    pub async fn largest_change_id(&self) -> Result<Option<i64>> {
        self.store
            .get_i64(&self.key("largest_change_id"))
            .await
            .map_err(state_error)
    }

    /// Persist the cursor. A value below the stored one is ignored.
    pub async fn set_largest_change_id(&self, change_id: i64) -> Result<()> {
        if let Some(current) = self.largest_change_id().await? {
            if change_id < current {
                warn!(
                    profile_id = %self.profile_id,
                    current,
                    rejected = change_id,
                    "Ignoring attempt to move change cursor backwards"
                );
                return Ok(());
            }
        }

        self.store
            .set_i64(&self.key("largest_change_id"), change_id)
            .await
            .map_err(state_error)?;
        debug!(profile_id = %self.profile_id, change_id, "Persisted change cursor");
        Ok(())
    }

    // ========================================================================
    // Pending deletions
    // ========================================================================

    pub async fn pending_deletion_ids(&self) -> Result<BTreeSet<String>> {
        let raw = self
            .store
            .get_string(&self.key("pending_deletion_ids"))
            .await
            .map_err(state_error)?;

        match raw {
            None => Ok(BTreeSet::new()),
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                SyncError::State(format!("Corrupt pending deletion queue: {}", e))
            }),
        }
    }

    pub async fn add_pending_deletion(&self, remote_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut ids = self.pending_deletion_ids().await?;
        if ids.insert(remote_id.to_string()) {
            self.write_pending(&ids).await?;
        }
        Ok(())
    }

    /// Replace the queue after a drain.
    ///
    /// `attempted` ids are removed, then `retained` ones put back. Ids queued
    /// since the drain read the queue are left in place.
    pub async fn rewrite_pending_deletions(
        &self,
        attempted: &BTreeSet<String>,
        retained: &BTreeSet<String>,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let current = self.pending_deletion_ids().await?;
        let next: BTreeSet<String> = current
            .difference(attempted)
            .chain(retained.iter())
            .cloned()
            .collect();

        if next == current {
            return Ok(());
        }
        self.write_pending(&next).await
    }

    async fn write_pending(&self, ids: &BTreeSet<String>) -> Result<()> {
        let key = self.key("pending_deletion_ids");
        if ids.is_empty() {
            return self.store.delete(&key).await.map_err(state_error);
        }

        let json = serde_json::to_string(ids)
            .map_err(|e| SyncError::State(format!("Failed to encode deletion queue: {}", e)))?;
        self.store.set_string(&key, &json).await.map_err(state_error)
    }

    // ========================================================================
    // Recording track
    // ========================================================================

    pub async fn recording_track_id(&self) -> Result<Option<String>> {
        self.store
            .get_string(&self.key("recording_track_id"))
            .await
            .map_err(state_error)
    }

    pub async fn set_recording_track_id(&self, track_id: Option<&str>) -> Result<()> {
        let key = self.key("recording_track_id");
        match track_id {
            Some(id) => self.store.set_string(&key, id).await,
            None => self.store.delete(&key).await,
        }
        .map_err(state_error)
    }

    /// Forget the cursor and the deletion queue. The next pass is a full pass.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        for name in ["largest_change_id", "pending_deletion_ids"] {
            self.store
                .delete(&self.key(name))
                .await
                .map_err(state_error)?;
        }
        Ok(())
    }
}

fn state_error(error: BridgeError) -> SyncError {
    SyncError::State(error.to_string())
}
