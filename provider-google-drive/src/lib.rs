//! # Google Drive Provider
//!
//! Implements the `RemoteStore` trait for Google Drive API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - Listing of KML/KMZ track files in the sync folder and in "Shared with me"
//! - The account change feed keyed by `largestChangeId`
//! - Multipart uploads, renames, trash and delete
//! - Lookup and creation of the sync folder at the Drive root
//! - Status classification into `BridgeError` (no retries at this layer)

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GoogleDriveConnector, GoogleDriveConnectorFactory};
pub use error::{GoogleDriveError, Result};
