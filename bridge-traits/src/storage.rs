//! Storage Abstractions
//!
//! Key-value settings storage used for persisted sync state, and the remote
//! object store that tracks are synchronized against.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences storage. The sync engine keeps its
/// change cursor and pending deletion queue here, one key per value.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_cursor(store: &dyn SettingsStore, change_id: i64) -> Result<()> {
///     store.set_i64("sync.default.largest_change_id", change_id).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool>;

    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Begin a transaction for atomic updates of several keys
    async fn begin_transaction(&self) -> Result<Box<dyn SettingsTransaction + Send>>;
}

/// Transaction for atomic settings updates
#[async_trait]
pub trait SettingsTransaction: Send {
    async fn set_string(&mut self, key: &str, value: &str) -> Result<()>;

    async fn set_i64(&mut self, key: &str, value: i64) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Snapshot of a remote object at the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    /// Objects may live in several folders at once
    pub parent_ids: Vec<String>,
    pub title: String,
    /// Milliseconds since the Unix epoch
    pub modified_time: i64,
    pub trashed: bool,
    pub shared_with_me: bool,
    /// Lower-case file extension without the dot, e.g. `kmz`
    pub extension: Option<String>,
    /// `None` when the object has no retrievable payload
    pub download_url: Option<String>,
}

impl RemoteObject {
    pub fn is_in_folder(&self, folder_id: &str) -> bool {
        self.parent_ids.iter().any(|parent| parent == folder_id)
    }

    /// An object is still tracked while it is live and either inside the
    /// sync folder or shared with the account.
    pub fn is_valid_for(&self, folder_id: &str) -> bool {
        !self.trashed && (self.is_in_folder(folder_id) || self.shared_with_me)
    }

    /// Title without its trailing extension.
    pub fn title_stem(&self) -> &str {
        match self.title.rfind('.') {
            Some(index) if index > 0 => &self.title[..index],
            _ => &self.title,
        }
    }

    /// Extension taken from the metadata, falling back to the title suffix.
    pub fn effective_extension(&self) -> Option<String> {
        self.extension
            .clone()
            .or_else(|| {
                let stem_len = self.title_stem().len();
                (stem_len < self.title.len()).then(|| self.title[stem_len + 1..].to_string())
            })
            .map(|ext| ext.to_ascii_lowercase())
    }
}

/// One page of object listings.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    pub next_page_token: Option<String>,
}

/// Raw entry of the remote change feed.
#[derive(Debug, Clone)]
pub struct RemoteChange {
    pub change_id: i64,
    pub object_id: String,
    /// Hard deletion; `object` is absent in that case
    pub deleted: bool,
    pub object: Option<RemoteObject>,
}

/// One page of the change feed.
#[derive(Debug, Clone, Default)]
pub struct ChangePage {
    pub changes: Vec<RemoteChange>,
    /// Global high-water mark reported alongside this page
    pub largest_change_id: i64,
    pub next_page_token: Option<String>,
}

/// Remote object store addressed by object id.
///
/// All listing operations are single-page; callers follow
/// `next_page_token` until it is `None`. Each call is one attempt.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Current global change id of the account
    async fn get_change_watermark(&self) -> Result<i64>;

    /// Live objects whose parents include `folder_id`
    async fn list_folder_objects(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<ObjectPage>;

    /// Live objects shared with the account by other users
    async fn list_shared_with_me(&self, page_token: Option<String>) -> Result<ObjectPage>;

    async fn get_object(&self, object_id: &str) -> Result<RemoteObject>;

    /// Changes with an id of at least `start_change_id`
    async fn list_changes_since(
        &self,
        start_change_id: i64,
        page_token: Option<String>,
    ) -> Result<ChangePage>;

    async fn create_object(
        &self,
        folder_id: &str,
        title: &str,
        content: Bytes,
        modified_time: i64,
    ) -> Result<RemoteObject>;

    async fn update_object_content(
        &self,
        object_id: &str,
        content: Bytes,
        modified_time: i64,
    ) -> Result<RemoteObject>;

    async fn update_object_title(
        &self,
        object_id: &str,
        title: &str,
        modified_time: i64,
    ) -> Result<RemoteObject>;

    async fn trash_object(&self, object_id: &str) -> Result<()>;

    async fn delete_object(&self, object_id: &str) -> Result<()>;

    /// `Ok(None)` when the object carries no downloadable payload
    async fn download_object(&self, object: &RemoteObject) -> Result<Option<Bytes>>;

    /// Non-trashed folder with the given title at the root
    async fn find_folder(&self, title: &str) -> Result<Option<RemoteObject>>;

    async fn create_folder(&self, title: &str) -> Result<RemoteObject>;
}

/// Opens a [`RemoteStore`] session bound to one access token.
pub trait RemoteStoreFactory: Send + Sync {
    fn connect(&self, access_token: &str) -> Arc<dyn RemoteStore>;
}

impl<F> RemoteStoreFactory for F
where
    F: Fn(&str) -> Arc<dyn RemoteStore> + Send + Sync,
{
    fn connect(&self, access_token: &str) -> Arc<dyn RemoteStore> {
        self(access_token)
    }
}
