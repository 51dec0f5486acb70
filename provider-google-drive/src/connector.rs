//! Google Drive API connector implementation
//!
//! Implements the `RemoteStore` trait for Google Drive API v2.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    ChangePage, ObjectPage, RemoteChange, RemoteObject, RemoteStore, RemoteStoreFactory,
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{
    About, ChangeList, DriveFile, ErrorResponse, FileList, FilePatch, NewFile, ParentReference,
    FOLDER_MIME_TYPE, KML_MIME_TYPE, KMZ_MIME_TYPE,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v2";

/// Upload endpoint base URL
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v2";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str =
    "id,title,mimeType,modifiedDate,parents(id),labels(trashed),sharedWithMeDate,fileExtension,downloadUrl";

const MULTIPART_BOUNDARY: &str = "track_sync_multipart_boundary";

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Track files only; other formats in the folder are invisible to sync.
fn track_mime_clause() -> String {
    format!(
        "(mimeType = '{}' or mimeType = '{}')",
        KMZ_MIME_TYPE, KML_MIME_TYPE
    )
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn mime_type_for_title(title: &str) -> &'static str {
    let lower = title.to_ascii_lowercase();
    if lower.ends_with(".kml") {
        KML_MIME_TYPE
    } else if lower.ends_with(".kmz") {
        KMZ_MIME_TYPE
    } else {
        "application/octet-stream"
    }
}

/// Google Drive API connector
///
/// Implements `RemoteStore` for Google Drive API v2.
///
/// # Features
///
/// - Paginated listing of track files in a folder and in "Shared with me"
/// - Change feed keyed by the numeric `largestChangeId`
/// - Multipart uploads that preserve the caller's modification time
/// - Status classification into `BridgeError` so callers can decide on retries
///
/// Every method performs exactly one HTTP request.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::RemoteStore;
///
/// let connector = GoogleDriveConnector::new(http_client, access_token);
/// let watermark = connector.get_change_watermark().await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token
    access_token: String,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 access token with the `drive.file` scope
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
        }
    }

    /// Parse RFC 3339 timestamp to Unix milliseconds
    fn parse_timestamp(rfc3339: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
    }

    /// Format Unix milliseconds as RFC 3339 with millisecond precision
    fn format_timestamp(millis: i64) -> Result<String> {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .ok_or_else(|| {
                BridgeError::OperationFailed(format!("Timestamp out of range: {}", millis))
            })
    }

    fn parse_change_id(value: &str) -> Result<i64> {
        value.parse::<i64>().map_err(|e| {
            GoogleDriveError::ParseError(format!("Invalid change id '{}': {}", value, e)).into()
        })
    }

    /// Convert DriveFile to RemoteObject
    fn convert_file(drive_file: DriveFile) -> RemoteObject {
        RemoteObject {
            modified_time: drive_file
                .modified_date
                .as_deref()
                .and_then(Self::parse_timestamp)
                .unwrap_or(0),
            parent_ids: drive_file.parents.into_iter().map(|p| p.id).collect(),
            trashed: drive_file.labels.trashed,
            shared_with_me: drive_file.shared_with_me_date.is_some(),
            extension: drive_file
                .file_extension
                .filter(|ext| !ext.is_empty())
                .map(|ext| ext.to_ascii_lowercase()),
            download_url: drive_file.download_url,
            id: drive_file.id,
            title: drive_file.title,
        }
    }

    fn parse_body<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    /// Build a `multipart/related` body of JSON metadata plus file content.
    fn multipart_body<T: serde::Serialize>(metadata: &T, content: &[u8]) -> Result<Bytes> {
        let metadata = serde_json::to_vec(metadata).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to serialize metadata: {}", e))
        })?;

        let mut body = Vec::with_capacity(metadata.len() + content.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(&metadata);
        body.extend_from_slice(format!("\r\n--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        Ok(Bytes::from(body))
    }

    fn multipart_content_type() -> String {
        format!("multipart/related; boundary={}", MULTIPART_BOUNDARY)
    }

    /// Execute a single API request and classify non-success statuses.
    ///
    /// `object_id` turns a 404 into `FileNotFound` for that id.
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest, object_id: Option<&str>) -> Result<HttpResponse> {
        let request = request.bearer_token(&self.access_token);
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            return Ok(response);
        }

        let (message, reason) = match serde_json::from_slice::<ErrorResponse>(&response.body) {
            Ok(parsed) => {
                let reason = parsed.error.errors.into_iter().next().map(|e| e.reason);
                (parsed.error.message, reason)
            }
            Err(_) => (String::from_utf8_lossy(&response.body).to_string(), None),
        };

        let retry_after = response
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("retry-after"))
            .and_then(|(_, value)| value.trim().parse::<u64>().ok());

        warn!(
            status = response.status,
            reason = reason.as_deref().unwrap_or(""),
            "API request failed"
        );

        Err(GoogleDriveError::from_status(
            response.status,
            reason.as_deref(),
            message,
            retry_after,
            object_id,
        )
        .into())
    }

    async fn list_files(&self, query: String, page_token: Option<String>) -> Result<ObjectPage> {
        let mut url = format!(
            "{}/files?q={}&maxResults={}&fields=nextPageToken,items({})",
            DRIVE_API_BASE,
            urlencoding::encode(&query),
            MAX_PAGE_SIZE,
            FILE_FIELDS
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let request = HttpRequest::new(HttpMethod::Get, url).timeout(METADATA_TIMEOUT);
        let response = self.send(request, None).await?;
        let list: FileList = Self::parse_body(&response, "files list response")?;

        let objects: Vec<RemoteObject> = list.items.into_iter().map(Self::convert_file).collect();
        debug!(count = objects.len(), has_more = list.next_page_token.is_some(), "Listed files");

        Ok(ObjectPage {
            objects,
            next_page_token: list.next_page_token,
        })
    }
}

#[async_trait]
impl RemoteStore for GoogleDriveConnector {
    #[instrument(skip(self))]
    async fn get_change_watermark(&self) -> Result<i64> {
        let url = format!("{}/about?fields=largestChangeId", DRIVE_API_BASE);
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(METADATA_TIMEOUT);

        let response = self.send(request, None).await?;
        let about: About = Self::parse_body(&response, "about response")?;
        let watermark = Self::parse_change_id(&about.largest_change_id)?;

        info!(largest_change_id = watermark, "Fetched change watermark");
        Ok(watermark)
    }

    #[instrument(skip(self, page_token), fields(folder_id = %folder_id))]
    async fn list_folder_objects(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<ObjectPage> {
        let query = format!(
            "'{}' in parents and trashed = false and {}",
            quote(folder_id),
            track_mime_clause()
        );
        self.list_files(query, page_token).await
    }

    #[instrument(skip(self, page_token))]
    async fn list_shared_with_me(&self, page_token: Option<String>) -> Result<ObjectPage> {
        let query = format!("sharedWithMe and trashed = false and {}", track_mime_clause());
        self.list_files(query, page_token).await
    }

    #[instrument(skip(self), fields(object_id = %object_id))]
    async fn get_object(&self, object_id: &str) -> Result<RemoteObject> {
        let url = format!(
            "{}/files/{}?fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(object_id),
            FILE_FIELDS
        );
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(METADATA_TIMEOUT);

        let response = self.send(request, Some(object_id)).await?;
        let file: DriveFile = Self::parse_body(&response, "file metadata")?;
        Ok(Self::convert_file(file))
    }

    #[instrument(skip(self, page_token), fields(start_change_id = start_change_id))]
    async fn list_changes_since(
        &self,
        start_change_id: i64,
        page_token: Option<String>,
    ) -> Result<ChangePage> {
        let mut url = format!(
            "{}/changes?startChangeId={}&includeDeleted=true&includeSubscribed=true&maxResults={}\
             &fields=largestChangeId,nextPageToken,items(id,fileId,deleted,file({}))",
            DRIVE_API_BASE, start_change_id, MAX_PAGE_SIZE, FILE_FIELDS
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let request = HttpRequest::new(HttpMethod::Get, url).timeout(METADATA_TIMEOUT);
        let response = self.send(request, None).await?;
        let list: ChangeList = Self::parse_body(&response, "changes list")?;

        let mut changes = Vec::with_capacity(list.items.len());
        for change in list.items {
            changes.push(RemoteChange {
                change_id: Self::parse_change_id(&change.id)?,
                object_id: change.file_id,
                deleted: change.deleted,
                object: change.file.map(Self::convert_file),
            });
        }

        let largest_change_id = Self::parse_change_id(&list.largest_change_id)?;
        info!(
            count = changes.len(),
            largest_change_id,
            "Retrieved changes from Google Drive"
        );

        Ok(ChangePage {
            changes,
            largest_change_id,
            next_page_token: list.next_page_token,
        })
    }

    #[instrument(skip(self, content), fields(folder_id = %folder_id, title = %title, bytes = content.len()))]
    async fn create_object(
        &self,
        folder_id: &str,
        title: &str,
        content: Bytes,
        modified_time: i64,
    ) -> Result<RemoteObject> {
        let metadata = NewFile {
            title,
            mime_type: mime_type_for_title(title),
            parents: vec![ParentReference {
                id: folder_id.to_string(),
            }],
            modified_date: Some(Self::format_timestamp(modified_time)?),
        };
        let body = Self::multipart_body(&metadata, &content)?;

        let url = format!(
            "{}/files?uploadType=multipart&fields={}",
            DRIVE_UPLOAD_BASE, FILE_FIELDS
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .body(Self::multipart_content_type(), body)
            .timeout(TRANSFER_TIMEOUT);

        let response = self.send(request, None).await?;
        let file: DriveFile = Self::parse_body(&response, "created file")?;
        info!(object_id = %file.id, "Created file");
        Ok(Self::convert_file(file))
    }

    #[instrument(skip(self, content), fields(object_id = %object_id, bytes = content.len()))]
    async fn update_object_content(
        &self,
        object_id: &str,
        content: Bytes,
        modified_time: i64,
    ) -> Result<RemoteObject> {
        let metadata = FilePatch {
            title: None,
            modified_date: Self::format_timestamp(modified_time)?,
        };
        let body = Self::multipart_body(&metadata, &content)?;

        let url = format!(
            "{}/files/{}?uploadType=multipart&setModifiedDate=true&fields={}",
            DRIVE_UPLOAD_BASE,
            urlencoding::encode(object_id),
            FILE_FIELDS
        );
        let request = HttpRequest::new(HttpMethod::Put, url)
            .body(Self::multipart_content_type(), body)
            .timeout(TRANSFER_TIMEOUT);

        let response = self.send(request, Some(object_id)).await?;
        let file: DriveFile = Self::parse_body(&response, "updated file")?;
        Ok(Self::convert_file(file))
    }

    #[instrument(skip(self), fields(object_id = %object_id, title = %title))]
    async fn update_object_title(
        &self,
        object_id: &str,
        title: &str,
        modified_time: i64,
    ) -> Result<RemoteObject> {
        let patch = FilePatch {
            title: Some(title),
            modified_date: Self::format_timestamp(modified_time)?,
        };

        let url = format!(
            "{}/files/{}?setModifiedDate=true&fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(object_id),
            FILE_FIELDS
        );
        let request = HttpRequest::new(HttpMethod::Patch, url)
            .json(&patch)?
            .timeout(METADATA_TIMEOUT);

        let response = self.send(request, Some(object_id)).await?;
        let file: DriveFile = Self::parse_body(&response, "patched file")?;
        Ok(Self::convert_file(file))
    }

    #[instrument(skip(self), fields(object_id = %object_id))]
    async fn trash_object(&self, object_id: &str) -> Result<()> {
        let url = format!(
            "{}/files/{}/trash?fields=id",
            DRIVE_API_BASE,
            urlencoding::encode(object_id)
        );
        let request = HttpRequest::new(HttpMethod::Post, url).timeout(METADATA_TIMEOUT);

        self.send(request, Some(object_id)).await?;
        info!("Trashed file");
        Ok(())
    }

    #[instrument(skip(self), fields(object_id = %object_id))]
    async fn delete_object(&self, object_id: &str) -> Result<()> {
        let url = format!("{}/files/{}", DRIVE_API_BASE, urlencoding::encode(object_id));
        let request = HttpRequest::new(HttpMethod::Delete, url).timeout(METADATA_TIMEOUT);

        self.send(request, Some(object_id)).await?;
        info!("Deleted file");
        Ok(())
    }

    #[instrument(skip(self, object), fields(object_id = %object.id))]
    async fn download_object(&self, object: &RemoteObject) -> Result<Option<Bytes>> {
        let Some(url) = object.download_url.as_deref().filter(|u| !u.is_empty()) else {
            debug!("No download URL");
            return Ok(None);
        };

        let request = HttpRequest::new(HttpMethod::Get, url).timeout(TRANSFER_TIMEOUT);
        let response = self.send(request, Some(&object.id)).await?;

        if response.body.is_empty() {
            debug!("Empty download body");
            return Ok(None);
        }

        debug!(bytes = response.body.len(), "Downloaded file");
        Ok(Some(response.body))
    }

    #[instrument(skip(self))]
    async fn find_folder(&self, title: &str) -> Result<Option<RemoteObject>> {
        let query = format!(
            "title = '{}' and mimeType = '{}' and 'root' in parents and trashed = false",
            quote(title),
            FOLDER_MIME_TYPE
        );
        let page = self.list_files(query, None).await?;
        Ok(page.objects.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, title: &str) -> Result<RemoteObject> {
        let metadata = NewFile {
            title,
            mime_type: FOLDER_MIME_TYPE,
            parents: vec![ParentReference {
                id: "root".to_string(),
            }],
            modified_date: None,
        };

        let url = format!("{}/files?fields={}", DRIVE_API_BASE, FILE_FIELDS);
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&metadata)?
            .timeout(METADATA_TIMEOUT);

        let response = self.send(request, None).await?;
        let folder: DriveFile = Self::parse_body(&response, "created folder")?;
        if folder.mime_type != FOLDER_MIME_TYPE {
            return Err(GoogleDriveError::FolderNotFound(title.to_string()).into());
        }

        info!(folder_id = %folder.id, "Created sync folder");
        Ok(Self::convert_file(folder))
    }
}

/// Opens a [`GoogleDriveConnector`] per access token over a shared client.
#[derive(Clone)]
pub struct GoogleDriveConnectorFactory {
    http_client: Arc<dyn HttpClient>,
}

impl GoogleDriveConnectorFactory {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }
}

impl RemoteStoreFactory for GoogleDriveConnectorFactory {
    fn connect(&self, access_token: &str) -> Arc<dyn RemoteStore> {
        Arc::new(GoogleDriveConnector::new(
            self.http_client.clone(),
            access_token.to_string(),
        ))
    }
}
