//! Google Drive API response types
//!
//! Data structures for the Google Drive API v2 resources used by sync.
//! Drive v2 encodes 64-bit integers (change ids) as JSON strings.

use serde::{Deserialize, Serialize};

/// MIME type of Drive folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// MIME type of KMZ track files
pub const KMZ_MIME_TYPE: &str = "application/vnd.google-earth.kmz";

/// MIME type of KML track files
pub const KML_MIME_TYPE: &str = "application/vnd.google-earth.kml+xml";

/// Reference to a parent folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReference {
    pub id: String,
}

/// File labels; only `trashed` matters here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub trashed: bool,
}

/// Google Drive API v2 file resource
///
/// See: https://developers.google.com/drive/api/v2/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub mime_type: String,

    /// Modification time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,

    #[serde(default)]
    pub parents: Vec<ParentReference>,

    #[serde(default)]
    pub labels: Labels,

    /// Set when another user shared the file with the account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with_me_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,

    /// Absent for Google Docs formats and folders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Google Drive API v2 files.list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub items: Vec<DriveFile>,

    pub next_page_token: Option<String>,
}

/// Google Drive API v2 changes.list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeList {
    #[serde(default)]
    pub items: Vec<Change>,

    pub next_page_token: Option<String>,

    /// Current largest change id of the account
    pub largest_change_id: String,
}

/// Google Drive API v2 change resource
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: String,

    pub file_id: String,

    /// Permanently deleted; `file` is absent
    #[serde(default)]
    pub deleted: bool,

    pub file: Option<DriveFile>,
}

/// Google Drive API v2 about resource (only the fields requested)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct About {
    pub largest_change_id: String,
}

/// Metadata part of an insert request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile<'a> {
    pub title: &'a str,
    pub mime_type: &'a str,
    pub parents: Vec<ParentReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<String>,
}

/// Body of a metadata-only patch
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    pub modified_date: String,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorItem {
    #[serde(default)]
    pub reason: String,
}
