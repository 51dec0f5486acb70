//! # Track Sync Module
//!
//! Keeps the local track store and a remote folder in agreement.
//!
//! ## Overview
//!
//! Each pass of this module:
//! - Lists or replays remote changes, depending on whether a change cursor is stored
//! - Pulls newer remote content and pushes newer local content, last writer wins
//! - Imports new remote objects and uploads local tracks never synced before
//! - Carries out remote deletions queued by local deletes
//! - Persists the change cursor only once every change up to it was applied
//!
//! ## Components
//!
//! - **Sync Coordinator** (`coordinator`): Per-account entry point; credentials, timeout, exclusion
//! - **Reconciliation Engine** (`engine`): Full and incremental passes
//! - **Conflict Resolver** (`conflict_resolver`): Timestamp comparison deciding push or pull
//! - **Remote Client** (`client`): Paged, retried access to the remote store
//! - **Retry Policy** (`retry`): Failure classification and bounded retry
//! - **Sync State** (`state`): Change cursor, deletion queue and recording marker
//! - **Codecs** (`codec`): Track file formats selected by extension

pub mod client;
pub mod codec;
pub mod conflict_resolver;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod outcome;
pub mod retry;
pub mod state;

pub use client::RemoteClient;
pub use codec::{CodecError, CodecRegistry, TrackCodec};
pub use conflict_resolver::{ConflictResolver, MergeDirection};
pub use coordinator::{SyncConfig, SyncCoordinator};
pub use engine::{fold_changes, ChangeRecord, EngineOptions, ReconciliationEngine};
pub use error::{Result, SyncError};
pub use outcome::{PassMode, SyncOutcome, SyncReport};
pub use retry::{ErrorClass, RetryPolicy};
pub use state::SyncStateStore;
