//! Workspace umbrella crate.
//!
//! Re-exports the sync core behind feature flags so a host can depend on
//! `track-sync-workspace` alone:
//!
//! - `desktop-shims` (default): the sync core plus the desktop runtime setup
//! - `google-drive`: the Google Drive implementation of the remote store, and
//!   [`google_drive_coordinator`] to wire it from a [`runtime::config::CoreConfig`]

#[cfg(any(feature = "desktop-shims", feature = "google-drive"))]
pub use core_runtime as runtime;

#[cfg(any(feature = "desktop-shims", feature = "google-drive"))]
pub use core_sync as sync;

#[cfg(feature = "google-drive")]
pub use provider_google_drive as google_drive;

#[cfg(feature = "google-drive")]
use std::sync::Arc;

/// Build a coordinator that syncs against Google Drive over the configured
/// HTTP client.
///
/// ```rust,ignore
/// let config = CoreConfig::builder()
///     .database_path("/data/tracks.db")
///     .build()?;
/// let coordinator = google_drive_coordinator(&config, credentials, codecs, event_bus).await?;
/// ```
#[cfg(feature = "google-drive")]
pub async fn google_drive_coordinator(
    config: &core_runtime::config::CoreConfig,
    credentials: Arc<dyn core_auth::CredentialProvider>,
    codecs: core_sync::CodecRegistry,
    event_bus: Arc<core_runtime::events::EventBus>,
) -> core_sync::Result<core_sync::SyncCoordinator> {
    let factory = provider_google_drive::GoogleDriveConnectorFactory::new(Arc::clone(
        &config.http_client,
    ));

    core_sync::SyncCoordinator::from_config(
        config,
        credentials,
        Arc::new(factory),
        codecs,
        event_bus,
    )
    .await
}
