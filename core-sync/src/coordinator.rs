//! # Sync Coordinator
//!
//! Entry point for running sync passes per account.
//!
//! ## Overview
//!
//! The `SyncCoordinator` owns everything a pass needs that outlives it:
//! - the credential provider, asked for a token before every pass
//! - the remote store factory, which opens a session bound to that token
//! - the local track repository and the settings store holding sync state
//! - the codec registry and the event bus
//!
//! ## Workflow
//!
//! 1. Claim the account's slot; a second request while a pass runs is rejected
//! 2. Acquire an access token and open a remote session with it
//! 3. Find or create the sync folder
//! 4. Run a [`ReconciliationEngine`] pass under the configured timeout
//! 5. Release the slot and report the result on the event bus
//!
//! A remote that rejects the token mid-pass gets the token invalidated. The
//! coordinator then asks for a fresh one to learn whether the user has to step
//! in before the next pass.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncCoordinator, SyncOutcome};
//!
//! # async fn example(coordinator: SyncCoordinator, profile_id: core_auth::ProfileId) {
//! match coordinator.run(profile_id).await {
//!     SyncOutcome::Success(report) => println!("imported {}", report.imported),
//!     SyncOutcome::AuthRequired { action_handle } => println!("consent needed: {}", action_handle),
//!     SyncOutcome::TransientFailure { message } => println!("retry later: {}", message),
//!     SyncOutcome::FatalFailure { message } => println!("sync broken: {}", message),
//! }
//! # }
//! ```

use crate::client::RemoteClient;
use crate::codec::CodecRegistry;
use crate::engine::{EngineOptions, ReconciliationEngine};
use crate::error::{Result, SyncError};
use crate::outcome::{SyncOutcome, SyncReport};
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::state::SyncStateStore;
use bridge_traits::{Clock, RemoteStoreFactory, SettingsStore, SystemClock};
use core_auth::{AuthError, CredentialProvider, ProfileId};
use core_library::repositories::{SqliteTrackRepository, TrackRepository};
use core_library::{create_pool, DatabaseConfig};
use core_runtime::config::{CoreConfig, FeatureFlags};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, SyncEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Title of the remote folder tracks are kept in
pub const DEFAULT_FOLDER_NAME: &str = "My Tracks";

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Title of the sync folder at the remote root
    pub folder_name: String,

    /// Timeout for an entire pass (seconds)
    pub pass_timeout_secs: u64,

    /// Attempts per remote call, counting the first
    pub max_attempts: u32,

    /// Upload local tracks that have no remote counterpart
    pub export_local_tracks: bool,

    /// Import objects other users shared with the account
    pub include_shared_with_me: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            pass_timeout_secs: 3600, // 1 hour
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            export_local_tracks: true,
            include_shared_with_me: true,
        }
    }
}

impl SyncConfig {
    pub fn from_features(features: &FeatureFlags) -> Self {
        Self {
            export_local_tracks: features.export_local_tracks,
            include_shared_with_me: features.include_shared_with_me,
            ..Self::default()
        }
    }

    pub fn with_folder_name(mut self, folder_name: impl Into<String>) -> Self {
        self.folder_name = folder_name.into();
        self
    }

    pub fn with_pass_timeout_secs(mut self, secs: u64) -> Self {
        self.pass_timeout_secs = secs;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_export_local_tracks(mut self, enabled: bool) -> Self {
        self.export_local_tracks = enabled;
        self
    }

    pub fn with_include_shared_with_me(mut self, enabled: bool) -> Self {
        self.include_shared_with_me = enabled;
        self
    }

    fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            export_local_tracks: self.export_local_tracks,
            include_shared_with_me: self.include_shared_with_me,
        }
    }
}

/// Active pass tracking
#[derive(Clone)]
struct ActiveSync {
    pass_id: String,
    cancellation_token: CancellationToken,
}

type ActiveSyncs = Arc<StdMutex<HashMap<ProfileId, ActiveSync>>>;

fn lock_active(active_syncs: &ActiveSyncs) -> MutexGuard<'_, HashMap<ProfileId, ActiveSync>> {
    active_syncs
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Frees the account's slot when the pass ends, including when the pass
/// future is dropped.
struct ActiveSlot {
    active_syncs: ActiveSyncs,
    profile_id: ProfileId,
    pass_id: String,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let mut active = lock_active(&self.active_syncs);
        if active
            .get(&self.profile_id)
            .is_some_and(|sync| sync.pass_id == self.pass_id)
        {
            active.remove(&self.profile_id);
        }
    }
}

/// Sync coordinator for orchestrating passes
pub struct SyncCoordinator {
    config: SyncConfig,

    credentials: Arc<dyn CredentialProvider>,

    remote_factory: Arc<dyn RemoteStoreFactory>,

    tracks: Arc<dyn TrackRepository>,

    /// Backing store of cursors and deletion queues
    settings: Arc<dyn SettingsStore>,

    codecs: CodecRegistry,

    event_bus: Arc<EventBus>,

    clock: Arc<dyn Clock>,

    /// Running passes by profile
    active_syncs: ActiveSyncs,

    /// Serializes deletion queue writers per profile
    state_locks: Mutex<HashMap<ProfileId, Arc<Mutex<()>>>>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
        remote_factory: Arc<dyn RemoteStoreFactory>,
        tracks: Arc<dyn TrackRepository>,
        settings: Arc<dyn SettingsStore>,
        codecs: CodecRegistry,
        event_bus: Arc<EventBus>,
    ) -> Self {
        info!(
            folder_name = %config.folder_name,
            pass_timeout_secs = config.pass_timeout_secs,
            codecs = ?codecs.extensions(),
            "Creating sync coordinator"
        );

        Self {
            config,
            credentials,
            remote_factory,
            tracks,
            settings,
            codecs,
            event_bus,
            clock: Arc::new(SystemClock),
            active_syncs: Arc::new(StdMutex::new(HashMap::new())),
            state_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire a coordinator from a validated [`CoreConfig`]: opens the track
    /// database at `database_path`, keeps sync state in its settings store and
    /// takes the sync toggles from its feature flags.
    ///
    /// # Errors
    ///
    /// [`SyncError::Library`] when the database cannot be opened or migrated.
    pub async fn from_config(
        config: &CoreConfig,
        credentials: Arc<dyn CredentialProvider>,
        remote_factory: Arc<dyn RemoteStoreFactory>,
        codecs: CodecRegistry,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(config.database_path.clone())).await?;

        Ok(Self::new(
            SyncConfig::from_features(&config.features),
            credentials,
            remote_factory,
            Arc::new(SqliteTrackRepository::new(pool)),
            Arc::clone(&config.settings_store),
            codecs,
            event_bus,
        ))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one pass and fold the result into what the caller acts on.
    #[instrument(skip(self), fields(profile_id = %profile_id))]
    pub async fn run(&self, profile_id: ProfileId) -> SyncOutcome {
        let error = match self.try_run(profile_id).await {
            Ok(report) => return SyncOutcome::Success(report),
            Err(e) => e,
        };

        match error {
            SyncError::Auth(auth_error) => self.auth_outcome(profile_id, auth_error),
            e if e.is_auth_recoverable() => {
                // The rejected token is gone; see whether a fresh one is at hand.
                match self.credentials.access_token(profile_id).await {
                    Ok(_) => SyncOutcome::TransientFailure {
                        message: e.to_string(),
                    },
                    Err(auth_error) => self.auth_outcome(profile_id, auth_error),
                }
            }
            e if e.is_transient() => SyncOutcome::TransientFailure {
                message: e.to_string(),
            },
            e => SyncOutcome::FatalFailure {
                message: e.to_string(),
            },
        }
    }

    fn auth_outcome(&self, profile_id: ProfileId, error: AuthError) -> SyncOutcome {
        if let Some(action_handle) = error.action_handle() {
            warn!(profile_id = %profile_id, "User action required to continue syncing");
            self.event_bus
                .emit(CoreEvent::Auth(AuthEvent::UserActionRequired {
                    profile_id: profile_id.to_string(),
                    action_handle: action_handle.to_string(),
                }))
                .ok();
            return SyncOutcome::AuthRequired {
                action_handle: action_handle.to_string(),
            };
        }

        if error.is_transient() {
            SyncOutcome::TransientFailure {
                message: error.to_string(),
            }
        } else {
            SyncOutcome::FatalFailure {
                message: error.to_string(),
            }
        }
    }

    /// Run one pass for `profile_id`.
    ///
    /// # Errors
    ///
    /// [`SyncError::SyncInProgress`] if a pass for the profile is running.
    #[instrument(skip(self), fields(profile_id = %profile_id))]
    pub async fn try_run(&self, profile_id: ProfileId) -> Result<SyncReport> {
        let pass_id = Uuid::new_v4().to_string();
        let cancellation_token = CancellationToken::new();

        let _slot = {
            let mut active = lock_active(&self.active_syncs);
            if active.contains_key(&profile_id) {
                warn!("Sync already in progress for profile {}", profile_id);
                return Err(SyncError::SyncInProgress {
                    profile_id: profile_id.to_string(),
                });
            }
            active.insert(
                profile_id,
                ActiveSync {
                    pass_id: pass_id.clone(),
                    cancellation_token: cancellation_token.clone(),
                },
            );
            ActiveSlot {
                active_syncs: Arc::clone(&self.active_syncs),
                profile_id,
                pass_id: pass_id.clone(),
            }
        };

        let pass = self.execute_pass(profile_id, &pass_id, cancellation_token.clone());
        tokio::pin!(pass);

        let result = tokio::select! {
            result = &mut pass => result,
            _ = sleep(Duration::from_secs(self.config.pass_timeout_secs)) => {
                error!(pass_id = %pass_id, "Sync pass timed out, cancelling");
                // Let the pass unwind through its own cleanup before reporting.
                cancellation_token.cancel();
                if let Err(e) = pass.await {
                    debug!(pass_id = %pass_id, error = %e, "Timed out pass stopped");
                }
                Err(SyncError::Timeout(self.config.pass_timeout_secs))
            }
        };

        match &result {
            Ok(report) => {
                info!(pass_id = %pass_id, "Sync pass {} completed successfully", pass_id);
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        pass_id: pass_id.clone(),
                        imported: report.imported,
                        pulled: report.pulled,
                        pushed: report.pushed,
                        exported: report.exported,
                        deleted_locally: report.deleted_locally,
                        skipped: report.skipped,
                        duration_secs: report.duration_ms / 1000,
                    }))
                    .ok();
            }
            Err(SyncError::Cancelled) => {
                info!(pass_id = %pass_id, "Sync pass cancelled");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                        pass_id: pass_id.clone(),
                    }))
                    .ok();
            }
            Err(e) => {
                error!(pass_id = %pass_id, error = %e, "Sync pass failed");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        pass_id: pass_id.clone(),
                        message: e.to_string(),
                        recoverable: e.is_transient() || e.is_auth_recoverable(),
                    }))
                    .ok();
            }
        }

        result
    }

    #[instrument(skip(self, cancellation_token))]
    async fn execute_pass(
        &self,
        profile_id: ProfileId,
        pass_id: &str,
        cancellation_token: CancellationToken,
    ) -> Result<SyncReport> {
        let access_token = self.credentials.access_token(profile_id).await?;
        let store = self.remote_factory.connect(access_token.secret());
        let client = RemoteClient::new(
            store,
            RetryPolicy::new(self.config.max_attempts),
            cancellation_token,
        );

        let result = async {
            let folder_id = client.resolve_folder(&self.config.folder_name).await?;
            debug!(folder_id = %folder_id, "Resolved sync folder");

            let engine = ReconciliationEngine::new(
                client.clone(),
                Arc::clone(&self.tracks),
                self.state(profile_id).await,
                self.codecs.clone(),
                Arc::clone(&self.event_bus),
                folder_id,
            )
            .with_clock(Arc::clone(&self.clock))
            .with_options(self.config.engine_options())
            .with_pass_id(pass_id);

            engine.run().await
        }
        .await;

        if let Err(e) = &result {
            if e.is_auth_recoverable() {
                warn!(profile_id = %profile_id, "Remote rejected access token");
                if let Err(invalidate_error) =
                    self.credentials.invalidate(profile_id, &access_token).await
                {
                    warn!(error = %invalidate_error, "Failed to invalidate access token");
                }
                self.event_bus
                    .emit(CoreEvent::Auth(AuthEvent::TokenInvalidated {
                        profile_id: profile_id.to_string(),
                    }))
                    .ok();
            }
        }

        result
    }

    /// Cancel the running pass of `profile_id`. Returns `false` when none runs.
    #[instrument(skip(self), fields(profile_id = %profile_id))]
    pub fn cancel(&self, profile_id: ProfileId) -> bool {
        let active = lock_active(&self.active_syncs);
        match active.get(&profile_id) {
            Some(sync) => {
                info!(pass_id = %sync.pass_id, "Cancelling sync pass");
                sync.cancellation_token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_sync_active(&self, profile_id: ProfileId) -> bool {
        lock_active(&self.active_syncs).contains_key(&profile_id)
    }

    /// Queue deletion of a remote object whose local track the user removed.
    /// Carried out at the start of the next incremental pass.
    #[instrument(skip(self), fields(profile_id = %profile_id))]
    pub async fn queue_remote_deletion(&self, profile_id: ProfileId, remote_id: &str) -> Result<()> {
        self.state(profile_id)
            .await
            .add_pending_deletion(remote_id)
            .await?;
        debug!(remote_id, "Queued remote deletion");
        Ok(())
    }

    /// Mark the track being recorded so it is not exported half-finished.
    pub async fn set_recording_track(
        &self,
        profile_id: ProfileId,
        track_id: Option<&str>,
    ) -> Result<()> {
        self.state(profile_id)
            .await
            .set_recording_track_id(track_id)
            .await
    }

    /// Drop the change cursor and deletion queue so the next pass is full.
    pub async fn reset_sync_state(&self, profile_id: ProfileId) -> Result<()> {
        if self.is_sync_active(profile_id) {
            return Err(SyncError::SyncInProgress {
                profile_id: profile_id.to_string(),
            });
        }
        info!(profile_id = %profile_id, "Resetting sync state");
        self.state(profile_id).await.reset().await
    }

    pub async fn state(&self, profile_id: ProfileId) -> SyncStateStore {
        let lock = {
            let mut locks = self.state_locks.lock().await;
            Arc::clone(locks.entry(profile_id).or_default())
        };
        SyncStateStore::with_lock(Arc::clone(&self.settings), profile_id, lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.folder_name, "My Tracks");
        assert_eq!(config.pass_timeout_secs, 3600);
        assert_eq!(config.max_attempts, 2);
        assert!(config.export_local_tracks);
        assert!(config.include_shared_with_me);
    }

    #[test]
    fn test_config_from_features() {
        let features = FeatureFlags {
            export_local_tracks: false,
            include_shared_with_me: true,
        };
        let config = SyncConfig::from_features(&features)
            .with_folder_name("Tracks")
            .with_max_attempts(3);

        assert!(!config.export_local_tracks);
        assert_eq!(config.folder_name, "Tracks");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(
            config.engine_options(),
            EngineOptions {
                export_local_tracks: false,
                include_shared_with_me: true,
            }
        );
    }

    #[test]
    fn test_slot_released_on_drop() {
        let active_syncs: ActiveSyncs = Arc::new(StdMutex::new(HashMap::new()));
        let profile_id = ProfileId::new();
        lock_active(&active_syncs).insert(
            profile_id,
            ActiveSync {
                pass_id: "p1".to_string(),
                cancellation_token: CancellationToken::new(),
            },
        );

        drop(ActiveSlot {
            active_syncs: Arc::clone(&active_syncs),
            profile_id,
            pass_id: "other".to_string(),
        });
        assert!(lock_active(&active_syncs).contains_key(&profile_id));

        drop(ActiveSlot {
            active_syncs: Arc::clone(&active_syncs),
            profile_id,
            pass_id: "p1".to_string(),
        });
        assert!(lock_active(&active_syncs).is_empty());
    }
}
