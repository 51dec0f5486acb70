//! # Core Configuration Module
//!
//! Builder-based configuration for the track sync core.
//!
//! `CoreConfig` gathers the host bridges the core depends on and validates
//! them up front, so a missing capability is reported at startup with an
//! actionable message instead of surfacing mid-sync.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - transport for the remote store (desktop default: reqwest)
//! - `SettingsStore` - persisted sync cursor and pending deletions
//!   (desktop default: SQLite file next to the track database)
//!
//! With the `desktop-shims` feature both are injected automatically when not
//! provided. Without it, `build()` fails with [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, FeatureFlags};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/tracks.db")
//!     .http_client(Arc::new(MyHttpClient))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .features(FeatureFlags {
//!         export_local_tracks: false,
//!         ..FeatureFlags::default()
//!     })
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SettingsStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Behavior toggles for the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Upload local tracks that have no remote counterpart after each pass.
    pub export_local_tracks: bool,
    /// Import objects other users shared with the account.
    pub include_shared_with_me: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            export_local_tracks: true,
            include_shared_with_me: true,
        }
    }
}

/// Validated core configuration.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite track database
    pub database_path: PathBuf,
    pub http_client: Arc<dyn HttpClient>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Directory holding the track database; sibling stores live here too.
    pub fn data_dir(&self) -> &Path {
        self.database_path.parent().unwrap_or_else(|| Path::new("."))
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client provided. \
                  Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                  Other hosts: inject a platform adapter via .http_client()."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "No settings store provided. \
                  Desktop: enable the 'desktop-shims' feature to use SqliteSettingsStore. \
                  Other hosts: inject a platform adapter via .settings_store()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to build default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Opens `settings.db` next to the track database.
///
/// The store constructor is async; when called from inside a runtime the
/// work runs on a helper thread with its own runtime so `build()` can stay
/// synchronous.
#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(database_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = database_path
        .parent()
        .map(|parent| parent.join("settings.db"))
        .unwrap_or_else(|| PathBuf::from("settings.db"));

    let init_store = move || -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| Error::Internal(format!("Failed to open default SettingsStore: {}", e)))
    };

    let store = if Handle::try_current().is_ok() {
        thread::spawn(init_store).join().map_err(|_| {
            Error::Internal("Settings store initialization thread panicked".to_string())
        })??
    } else {
        init_store()?
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_database_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Validate and assemble the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or empty
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no desktop
    ///   default is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        if database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&database_path)?,
        };

        Ok(CoreConfig {
            database_path,
            http_client,
            settings_store,
            features: self.features,
        })
    }
}
