//! Remote session used by a single pass
//!
//! Wraps the [`RemoteStore`] opened for the pass, sending every call through
//! the [`RetryPolicy`] and following page tokens to the end.

use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;
use bridge_traits::{RemoteChange, RemoteObject, RemoteStore};
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct RemoteClient {
    store: Arc<dyn RemoteStore>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl RemoteClient {
    pub fn new(store: Arc<dyn RemoteStore>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            store,
            retry,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    pub async fn watermark(&self) -> Result<i64> {
        self.retry
            .execute("get_change_watermark", &self.cancel, || {
                self.store.get_change_watermark()
            })
            .await
    }

    /// Every live object in `folder_id`, across all pages.
    #[instrument(skip(self))]
    pub async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            self.check_cancelled()?;

            let page = self
                .retry
                .execute("list_folder_objects", &self.cancel, || {
                    self.store
                        .list_folder_objects(folder_id, page_token.clone())
                })
                .await?;

            debug!(count = page.objects.len(), "Listed folder page");
            objects.extend(page.objects);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    /// Every live object shared with the account, across all pages.
    #[instrument(skip(self))]
    pub async fn list_shared(&self) -> Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            self.check_cancelled()?;

            let page = self
                .retry
                .execute("list_shared_with_me", &self.cancel, || {
                    self.store.list_shared_with_me(page_token.clone())
                })
                .await?;

            debug!(count = page.objects.len(), "Listed shared page");
            objects.extend(page.objects);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(objects)
    }

    /// Raw change entries with an id of at least `start_change_id`, in feed
    /// order, plus the largest change id any page reported.
    #[instrument(skip(self))]
    pub async fn changes_since(&self, start_change_id: i64) -> Result<(Vec<RemoteChange>, i64)> {
        let mut changes = Vec::new();
        let mut largest_change_id = start_change_id.saturating_sub(1);
        let mut page_token: Option<String> = None;

        loop {
            self.check_cancelled()?;

            let page = self
                .retry
                .execute("list_changes_since", &self.cancel, || {
                    self.store
                        .list_changes_since(start_change_id, page_token.clone())
                })
                .await?;

            largest_change_id = largest_change_id.max(page.largest_change_id);
            changes.extend(page.changes);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(
            count = changes.len(),
            largest_change_id, "Fetched change feed"
        );
        Ok((changes, largest_change_id))
    }

    pub async fn get_object(&self, object_id: &str) -> Result<RemoteObject> {
        self.retry
            .execute("get_object", &self.cancel, || self.store.get_object(object_id))
            .await
    }

    pub async fn download(&self, object: &RemoteObject) -> Result<Option<Bytes>> {
        self.retry
            .execute("download_object", &self.cancel, || {
                self.store.download_object(object)
            })
            .await
    }

    pub async fn create(
        &self,
        folder_id: &str,
        title: &str,
        content: Bytes,
        modified_time: i64,
    ) -> Result<RemoteObject> {
        self.retry
            .execute("create_object", &self.cancel, || {
                self.store
                    .create_object(folder_id, title, content.clone(), modified_time)
            })
            .await
    }

    pub async fn update_content(
        &self,
        object_id: &str,
        content: Bytes,
        modified_time: i64,
    ) -> Result<RemoteObject> {
        self.retry
            .execute("update_object_content", &self.cancel, || {
                self.store
                    .update_object_content(object_id, content.clone(), modified_time)
            })
            .await
    }

    pub async fn update_title(
        &self,
        object_id: &str,
        title: &str,
        modified_time: i64,
    ) -> Result<RemoteObject> {
        self.retry
            .execute("update_object_title", &self.cancel, || {
                self.store.update_object_title(object_id, title, modified_time)
            })
            .await
    }

    pub async fn trash(&self, object_id: &str) -> Result<()> {
        self.retry
            .execute("trash_object", &self.cancel, || {
                self.store.trash_object(object_id)
            })
            .await
    }

    pub async fn delete(&self, object_id: &str) -> Result<()> {
        self.retry
            .execute("delete_object", &self.cancel, || {
                self.store.delete_object(object_id)
            })
            .await
    }

    /// Id of the sync folder titled `title`, creating it when missing.
    #[instrument(skip(self))]
    pub async fn resolve_folder(&self, title: &str) -> Result<String> {
        let existing = self
            .retry
            .execute("find_folder", &self.cancel, || self.store.find_folder(title))
            .await
            .map_err(|e| unresolvable(title, e))?;

        if let Some(folder) = existing {
            debug!(folder_id = %folder.id, "Found sync folder");
            return Ok(folder.id);
        }

        let folder = self
            .retry
            .execute("create_folder", &self.cancel, || {
                self.store.create_folder(title)
            })
            .await
            .map_err(|e| unresolvable(title, e))?;

        info!(folder_id = %folder.id, "Created sync folder");
        Ok(folder.id)
    }
}

fn unresolvable(title: &str, error: SyncError) -> SyncError {
    match error {
        SyncError::Unauthorized(_) | SyncError::Cancelled | SyncError::Transient(_) => error,
        _ => SyncError::FolderUnresolvable(title.to_string()),
    }
}
