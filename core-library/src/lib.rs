//! # Local Track Store
//!
//! Owns the SQLite database of recorded tracks and the repository used by
//! the sync engine to read and write them.
//!
//! ## Overview
//!
//! - Schema and embedded migrations ([`db`])
//! - [`Track`] and [`TrackDraft`] models ([`models`])
//! - [`TrackRepository`] with a SQLite implementation ([`repositories`])
//!
//! A track is bound to at most one remote object through `remote_id`; the
//! binding is unique across the table.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{Track, TrackDraft, TrackId};
pub use repositories::{SqliteTrackRepository, TrackRepository};
