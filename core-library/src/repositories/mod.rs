//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the local track store.
//!
//! - Traits define the interface the sync engine codes against
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>`

pub mod track;

pub use track::{SqliteTrackRepository, TrackRepository};
