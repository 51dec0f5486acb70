//! # Reconciliation Engine
//!
//! Runs one sync pass between the local track store and the remote folder.
//!
//! ## Full pass
//! Taken when no change cursor is stored.
//! 1. Read the remote change watermark before listing anything
//! 2. List the sync folder and, if enabled, the objects shared with the account
//! 3. Re-check every tracked local record against its remote object
//! 4. Import whatever is left; a failure deletes this pass's imports again
//!
//! ## Incremental pass
//! 1. Carry out queued remote deletions
//! 2. Fold the change feed since the cursor into one record per object
//! 3. Apply changes to tracked records, re-checking the untouched ones
//! 4. Import new objects
//!
//! The cursor is persisted only after the pass body succeeds, so an
//! interrupted pass re-reads the same changes next time. Local tracks without
//! a remote counterpart are uploaded afterwards.

use crate::client::RemoteClient;
use crate::codec::{CodecRegistry, TrackCodec};
use crate::conflict_resolver::{ConflictResolver, MergeDirection};
use crate::error::{Result, SyncError};
use crate::outcome::{PassMode, SyncReport};
use crate::state::SyncStateStore;
use bridge_traits::{Clock, RemoteChange, RemoteObject, SystemClock};
use core_library::models::{Track, TrackDraft};
use core_library::repositories::TrackRepository;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Net effect of the change feed on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub object_id: String,
    /// `None` when the object is gone from the sync scope
    pub snapshot: Option<RemoteObject>,
}

/// Fold raw feed entries into one record per object, in change id order.
///
/// Deleted and trashed objects become deletions. Objects outside the folder
/// that are not shared with the account drop out of the result.
pub fn fold_changes(
    mut changes: Vec<RemoteChange>,
    folder_id: &str,
) -> HashMap<String, ChangeRecord> {
    changes.sort_by_key(|change| change.change_id);

    let mut records = HashMap::new();
    for change in changes {
        let snapshot = if change.deleted {
            None
        } else {
            match change.object {
                Some(object) if object.is_in_folder(folder_id) || object.shared_with_me => {
                    (!object.trashed).then_some(object)
                }
                Some(_) => {
                    records.remove(&change.object_id);
                    continue;
                }
                None => continue,
            }
        };

        records.insert(
            change.object_id.clone(),
            ChangeRecord {
                object_id: change.object_id,
                snapshot,
            },
        );
    }
    records
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub export_local_tracks: bool,
    pub include_shared_with_me: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            export_local_tracks: true,
            include_shared_with_me: true,
        }
    }
}

pub struct ReconciliationEngine {
    client: RemoteClient,
    tracks: Arc<dyn TrackRepository>,
    state: SyncStateStore,
    codecs: CodecRegistry,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    folder_id: String,
    options: EngineOptions,
    pass_id: String,
}

impl ReconciliationEngine {
    pub fn new(
        client: RemoteClient,
        tracks: Arc<dyn TrackRepository>,
        state: SyncStateStore,
        codecs: CodecRegistry,
        event_bus: Arc<EventBus>,
        folder_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            tracks,
            state,
            codecs,
            event_bus,
            clock: Arc::new(SystemClock),
            folder_id: folder_id.into(),
            options: EngineOptions::default(),
            pass_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_pass_id(mut self, pass_id: impl Into<String>) -> Self {
        self.pass_id = pass_id.into();
        self
    }

    pub fn pass_id(&self) -> &str {
        &self.pass_id
    }

    /// Run one pass and persist its cursor.
    #[instrument(skip(self), fields(pass_id = %self.pass_id, folder_id = %self.folder_id))]
    pub async fn run(&self) -> Result<SyncReport> {
        let started = Instant::now();
        let cursor = self.state.largest_change_id().await?;
        let mode = match cursor {
            Some(_) => PassMode::Incremental,
            None => PassMode::Full,
        };

        info!(mode = mode.as_str(), cursor = ?cursor, "Starting sync pass");
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                pass_id: self.pass_id.clone(),
                profile_id: self.state.profile_id().to_string(),
                is_full_pass: mode == PassMode::Full,
            }))
            .ok();

        let mut report = SyncReport::new(self.pass_id.clone(), mode);
        let watermark = match cursor {
            None => self.full_pass(&mut report).await?,
            Some(since) => self.incremental_pass(since, &mut report).await?,
        };

        self.state.set_largest_change_id(watermark).await?;
        report.watermark = Some(watermark);
        self.progress("cursor_persisted", 1);

        if self.options.export_local_tracks {
            self.export_local_tracks(&mut report).await?;
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            imported = report.imported,
            pulled = report.pulled,
            pushed = report.pushed,
            exported = report.exported,
            deleted_locally = report.deleted_locally,
            skipped = report.skipped,
            watermark,
            "Sync pass finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Full pass
    // ========================================================================

    async fn full_pass(&self, report: &mut SyncReport) -> Result<i64> {
        info!("Phase 1: Fetching change watermark");
        let watermark = self.client.watermark().await?;

        info!("Phase 2: Listing remote objects");
        let mut folder_objects: HashMap<String, RemoteObject> = self
            .client
            .list_folder(&self.folder_id)
            .await?
            .into_iter()
            .filter(|object| !object.shared_with_me && !object.trashed)
            .map(|object| (object.id.clone(), object))
            .collect();

        let mut shared_objects: HashMap<String, RemoteObject> = HashMap::new();
        if self.options.include_shared_with_me {
            shared_objects = self
                .client
                .list_shared()
                .await?
                .into_iter()
                .filter(|object| !object.trashed && !folder_objects.contains_key(&object.id))
                .map(|object| (object.id.clone(), object))
                .collect();
        }
        self.progress("listing", (folder_objects.len() + shared_objects.len()) as u64);

        info!("Phase 3: Reconciling tracked records");
        let tracked = self.tracks.list_with_remote_id().await?;
        let tracked_count = tracked.len() as u64;
        for track in tracked {
            self.check_cancelled()?;
            let Some(remote_id) = track.remote_id.clone() else {
                continue;
            };

            folder_objects.remove(&remote_id);
            shared_objects.remove(&remote_id);
            self.reconcile_tracked(track, &remote_id, report).await?;
        }
        self.progress("reconciling", tracked_count);

        info!(
            folder = folder_objects.len(),
            shared = shared_objects.len(),
            "Phase 4: Importing new objects"
        );
        let mut imported_ids = Vec::new();
        let candidates = sorted(folder_objects)
            .into_iter()
            .chain(sorted(shared_objects));

        for object in candidates {
            let result = match self.check_cancelled() {
                Ok(()) => self.import(object, report, &mut imported_ids).await,
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                warn!(error = %e, imported = imported_ids.len(), "Import failed, rolling back");
                self.rollback_imports(&imported_ids).await;
                return Err(e);
            }
        }
        self.progress("importing", report.imported);

        Ok(watermark)
    }

    async fn rollback_imports(&self, track_ids: &[String]) {
        for track_id in track_ids {
            match self.tracks.delete(track_id).await {
                Ok(_) => debug!(track_id = %track_id, "Removed imported track"),
                Err(e) => warn!(track_id = %track_id, error = %e, "Failed to remove imported track"),
            }
        }
    }

    // ========================================================================
    // Incremental pass
    // ========================================================================

    async fn incremental_pass(&self, since: i64, report: &mut SyncReport) -> Result<i64> {
        info!(since, "Phase 1: Draining pending deletions");
        self.drain_pending_deletions(report).await?;
        self.progress("deletions", report.remote_deletions);

        info!("Phase 2: Fetching change feed");
        let (changes, largest_change_id) = self.client.changes_since(since + 1).await?;
        let raw_count = changes.len();
        let mut records = fold_changes(changes, &self.folder_id);
        debug!(raw = raw_count, folded = records.len(), "Folded change feed");
        self.progress("changes", records.len() as u64);

        info!("Phase 3: Reconciling tracked records");
        let tracked = self.tracks.list_with_remote_id().await?;
        let tracked_count = tracked.len() as u64;
        for track in tracked {
            self.check_cancelled()?;
            let Some(remote_id) = track.remote_id.clone() else {
                continue;
            };

            match records.remove(&remote_id) {
                Some(ChangeRecord { snapshot: None, .. }) => {
                    self.delete_local(&track, report).await?;
                }
                Some(ChangeRecord {
                    snapshot: Some(remote),
                    ..
                }) => {
                    self.merge(track, &remote, report).await?;
                }
                // Re-checked even without a change so a skipped pull is retried.
                None => self.reconcile_tracked(track, &remote_id, report).await?,
            }
        }
        self.progress("reconciling", tracked_count);

        info!(remaining = records.len(), "Phase 4: Importing new objects");
        let mut imported_ids = Vec::new();
        let mut candidates: Vec<RemoteObject> = records
            .into_values()
            .filter_map(|record| record.snapshot)
            .filter(|object| {
                self.options.include_shared_with_me || object.is_in_folder(&self.folder_id)
            })
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        for object in candidates {
            self.check_cancelled()?;
            self.import(object, report, &mut imported_ids).await?;
        }
        self.progress("importing", report.imported);

        Ok(largest_change_id.max(since))
    }

    async fn drain_pending_deletions(&self, report: &mut SyncReport) -> Result<()> {
        let attempted = self.state.pending_deletion_ids().await?;
        if attempted.is_empty() {
            return Ok(());
        }

        let mut retained = BTreeSet::new();
        for remote_id in &attempted {
            self.check_cancelled()?;

            match self.delete_remote(remote_id).await {
                Ok(true) => report.remote_deletions += 1,
                Ok(false) => {}
                Err(e) if e.is_auth_recoverable() || matches!(e, SyncError::Cancelled) => {
                    return Err(e)
                }
                Err(SyncError::Transient(message)) => {
                    warn!(remote_id = %remote_id, error = %message, "Deletion failed, keeping it queued");
                    retained.insert(remote_id.clone());
                }
                Err(e) => {
                    warn!(remote_id = %remote_id, error = %e, "Deletion failed permanently, dropping it");
                }
            }
        }

        report.deletions_kept = retained.len() as u64;
        self.state
            .rewrite_pending_deletions(&attempted, &retained)
            .await
    }

    /// Returns `true` when a remote write was issued.
    async fn delete_remote(&self, remote_id: &str) -> Result<bool> {
        let remote = match self.client.get_object(remote_id).await {
            Ok(remote) => remote,
            Err(SyncError::RemoteNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };

        if remote.trashed {
            return Ok(false);
        }

        let result = if remote.is_in_folder(&self.folder_id) {
            debug!(remote_id, "Trashing remote object");
            self.client.trash(remote_id).await
        } else if remote.shared_with_me {
            debug!(remote_id, "Removing shared object");
            self.client.delete(remote_id).await
        } else {
            debug!(remote_id, "Object left the sync folder, not deleting");
            return Ok(false);
        };

        match result {
            Ok(()) => Ok(true),
            Err(SyncError::RemoteNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Tracked records
    // ========================================================================

    /// Fetch the remote object of a tracked record and merge it, or unbind
    /// the record when the object is no longer in scope.
    async fn reconcile_tracked(
        &self,
        track: Track,
        remote_id: &str,
        report: &mut SyncReport,
    ) -> Result<()> {
        let remote = match self.client.get_object(remote_id).await {
            Ok(remote) => Some(remote),
            Err(SyncError::RemoteNotFound(_)) => None,
            Err(e) if e.is_per_object() => {
                warn!(track_id = %track.id, remote_id, error = %e, "Could not fetch remote object, skipping");
                report.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match remote {
            Some(remote) if remote.is_valid_for(&self.folder_id) => {
                self.merge(track, &remote, report).await
            }
            _ => self.clear_remote_id(track, report).await,
        }
    }

    async fn clear_remote_id(&self, mut track: Track, report: &mut SyncReport) -> Result<()> {
        debug!(track_id = %track.id, remote_id = ?track.remote_id, "Remote object gone, unbinding track");
        track.remote_id = None;
        track.updated_at = self.clock.unix_timestamp_millis();
        self.tracks.update(&track).await?;
        report.remote_ids_cleared += 1;
        self.emit_library(LibraryEvent::TrackUpdated { track_id: track.id });
        Ok(())
    }

    async fn delete_local(&self, track: &Track, report: &mut SyncReport) -> Result<()> {
        if self.tracks.delete(&track.id).await? {
            debug!(track_id = %track.id, "Deleted track removed on the remote");
            report.deleted_locally += 1;
            self.emit_library(LibraryEvent::TrackDeleted {
                track_id: track.id.clone(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Merge
    // ========================================================================

    async fn merge(&self, track: Track, remote: &RemoteObject, report: &mut SyncReport) -> Result<()> {
        if !has_storable_time(remote) {
            report.skipped += 1;
            return Ok(());
        }

        match ConflictResolver::resolve_track(&track, remote) {
            MergeDirection::Pull => self.pull(track, remote, report).await,
            MergeDirection::Push => self.push(track, remote, report).await,
            MergeDirection::NoOp => {
                debug!(track_id = %track.id, "Track up to date");
                Ok(())
            }
        }
    }

    async fn pull(&self, mut track: Track, remote: &RemoteObject, report: &mut SyncReport) -> Result<()> {
        let draft = match self.fetch_draft(remote).await {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                warn!(track_id = %track.id, remote_id = %remote.id, "Remote object has no content, skipping pull");
                report.skipped += 1;
                return Ok(());
            }
            Err(e) if e.is_per_object() => {
                warn!(track_id = %track.id, remote_id = %remote.id, error = %e, "Pull failed, skipping");
                report.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let embedded_name = draft.name.clone();
        let name = track_name(remote, &embedded_name);
        track.apply_draft(draft);
        track.name = name;
        track.remote_id = Some(remote.id.clone());
        track.modified_time = remote.modified_time;
        track.shared_with_me = remote.shared_with_me;
        track.updated_at = self.clock.unix_timestamp_millis();

        if embedded_name != track.name && !track.shared_with_me {
            match self.rewrite_embedded_name(&track, remote).await {
                Ok(updated) => track.modified_time = updated.modified_time,
                Err(e) if e.is_per_object() => {
                    warn!(track_id = %track.id, error = %e, "Failed to rewrite embedded track name");
                }
                Err(e) => return Err(e),
            }
        }

        self.tracks.update(&track).await?;
        debug!(track_id = %track.id, remote_id = %remote.id, "Pulled remote changes");
        report.pulled += 1;
        self.emit_library(LibraryEvent::TrackUpdated { track_id: track.id });
        Ok(())
    }

    /// Re-upload content so the name inside the file matches the title.
    async fn rewrite_embedded_name(&self, track: &Track, remote: &RemoteObject) -> Result<RemoteObject> {
        let (codec, _) = self.codec_for(remote).ok_or_else(|| no_codec(track))?;
        let content = codec.encode(track).map_err(|e| SyncError::Encode {
            track_id: track.id.clone(),
            message: e.to_string(),
        })?;
        self.client
            .update_content(&remote.id, content, track.modified_time)
            .await
    }

    async fn push(&self, mut track: Track, remote: &RemoteObject, report: &mut SyncReport) -> Result<()> {
        match self.upload(&track, remote).await {
            Ok(updated) => {
                debug!(track_id = %track.id, remote_id = %remote.id, "Pushed local changes");
                report.pushed += 1;
                if updated.modified_time != track.modified_time {
                    track.modified_time = updated.modified_time;
                    track.updated_at = self.clock.unix_timestamp_millis();
                    self.tracks.update(&track).await?;
                }
                Ok(())
            }
            Err(e) if e.is_per_object() => {
                warn!(track_id = %track.id, remote_id = %remote.id, error = %e, "Push failed, adopting remote time");
                report.skipped += 1;
                track.modified_time = remote.modified_time;
                track.updated_at = self.clock.unix_timestamp_millis();
                self.tracks.update(&track).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn upload(&self, track: &Track, remote: &RemoteObject) -> Result<RemoteObject> {
        let (codec, extension) = self.codec_for(remote).ok_or_else(|| no_codec(track))?;
        let content = codec.encode(track).map_err(|e| SyncError::Encode {
            track_id: track.id.clone(),
            message: e.to_string(),
        })?;

        if track.name != remote.title_stem() {
            let title = format!("{}.{}", track.name, extension);
            self.client
                .update_title(&remote.id, &title, track.modified_time)
                .await?;
        }

        self.client
            .update_content(&remote.id, content, track.modified_time)
            .await
    }

    /// Codec for the remote's own format, falling back to the export codec.
    fn codec_for(&self, remote: &RemoteObject) -> Option<(Arc<dyn TrackCodec>, String)> {
        remote
            .effective_extension()
            .and_then(|ext| self.codecs.for_extension(&ext).map(|codec| (codec, ext)))
            .or_else(|| {
                self.codecs
                    .export_codec()
                    .map(|codec| (codec, self.codecs.export_extension().to_string()))
            })
    }

    // ========================================================================
    // Import
    // ========================================================================

    async fn import(
        &self,
        remote: RemoteObject,
        report: &mut SyncReport,
        imported_ids: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(existing) = self.tracks.find_by_remote_id(&remote.id).await? {
            debug!(track_id = %existing.id, remote_id = %remote.id, "Object already tracked, merging");
            return self.merge(existing, &remote, report).await;
        }

        if !has_storable_time(&remote) {
            report.skipped += 1;
            return Ok(());
        }

        let draft = match self.fetch_draft(&remote).await {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                debug!(remote_id = %remote.id, "Object has no content, not importing");
                return Ok(());
            }
            Err(e @ (SyncError::Decode { .. } | SyncError::RemoteNotFound(_))) => {
                warn!(remote_id = %remote.id, error = %e, "Skipping object");
                report.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let name = track_name(&remote, &draft.name);
        let now = self.clock.unix_timestamp_millis();
        let mut track = Track::from_draft(draft, remote.id.clone(), remote.modified_time);
        track.name = name;
        track.shared_with_me = remote.shared_with_me;
        track.created_at = now;
        track.updated_at = now;

        self.tracks.insert(&track).await?;
        info!(track_id = %track.id, remote_id = %remote.id, name = %track.name, "Imported track");
        imported_ids.push(track.id.clone());
        report.imported += 1;
        self.emit_library(LibraryEvent::TrackImported {
            track_id: track.id,
            name: track.name,
        });
        Ok(())
    }

    /// Download and decode a remote object. `Ok(None)` when there is no
    /// content to decode.
    async fn fetch_draft(&self, remote: &RemoteObject) -> Result<Option<TrackDraft>> {
        let codec = remote
            .effective_extension()
            .and_then(|ext| self.codecs.for_extension(&ext))
            .ok_or_else(|| SyncError::Decode {
                object_id: remote.id.clone(),
                message: format!(
                    "unsupported extension {:?}",
                    remote.effective_extension().unwrap_or_default()
                ),
            })?;

        let content = match self.client.download(remote).await? {
            Some(content) if !content.is_empty() => content,
            _ => return Ok(None),
        };

        codec
            .decode(&content)
            .map(Some)
            .map_err(|e| SyncError::Decode {
                object_id: remote.id.clone(),
                message: e.to_string(),
            })
    }

    // ========================================================================
    // Export
    // ========================================================================

    async fn export_local_tracks(&self, report: &mut SyncReport) -> Result<()> {
        info!("Phase 5: Exporting local tracks");
        let Some(codec) = self.codecs.export_codec() else {
            warn!(
                extension = self.codecs.export_extension(),
                "No codec registered for export, skipping export"
            );
            return Ok(());
        };
        let extension = self.codecs.export_extension();
        let recording = self.state.recording_track_id().await?;

        for mut track in self.tracks.list_without_remote_id().await? {
            self.check_cancelled()?;

            if track.shared_with_me || recording.as_deref() == Some(track.id.as_str()) {
                debug!(track_id = %track.id, "Not exporting track");
                continue;
            }

            let content = match codec.encode(&track) {
                Ok(content) => content,
                Err(e) => {
                    warn!(track_id = %track.id, error = %e, "Failed to encode track for export");
                    report.skipped += 1;
                    continue;
                }
            };

            let title = format!("{}.{}", track.name, extension);
            match self
                .client
                .create(&self.folder_id, &title, content, track.modified_time)
                .await
            {
                Ok(created) => {
                    debug!(track_id = %track.id, remote_id = %created.id, "Exported track");
                    track.remote_id = Some(created.id);
                    track.modified_time = created.modified_time;
                    track.updated_at = self.clock.unix_timestamp_millis();
                    self.tracks.update(&track).await?;
                    report.exported += 1;
                }
                Err(e) if e.is_per_object() => {
                    warn!(track_id = %track.id, error = %e, "Export failed, retrying next pass");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        self.progress("export", report.exported);
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_cancelled(&self) -> Result<()> {
        if self.client.cancellation_token().is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn progress(&self, phase: &str, items_processed: u64) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Progress {
                pass_id: self.pass_id.clone(),
                phase: phase.to_string(),
                items_processed,
            }))
            .ok();
    }

    fn emit_library(&self, event: LibraryEvent) {
        self.event_bus.emit(CoreEvent::Library(event)).ok();
    }
}

/// The title stem names the track; blank titles fall back to the name
/// stored inside the file, then to the object id.
fn track_name(remote: &RemoteObject, embedded_name: &str) -> String {
    [remote.title_stem(), embedded_name]
        .into_iter()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(remote.id.as_str())
        .to_string()
}

/// Local modified times are non-negative; objects dated before the epoch
/// are left alone.
fn has_storable_time(remote: &RemoteObject) -> bool {
    if remote.modified_time < 0 {
        warn!(
            remote_id = %remote.id,
            modified_time = remote.modified_time,
            "Remote modified time out of range, skipping object"
        );
        return false;
    }
    true
}

fn no_codec(track: &Track) -> SyncError {
    SyncError::Encode {
        track_id: track.id.clone(),
        message: "no codec registered for the track format".to_string(),
    }
}

fn sorted(objects: HashMap<String, RemoteObject>) -> Vec<RemoteObject> {
    let mut objects: Vec<RemoteObject> = objects.into_values().collect();
    objects.sort_by(|a, b| a.id.cmp(&b.id));
    objects
}
