//! # Host Bridge Traits
//!
//! Capability traits the sync core requires from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the track sync core and the
//! platform-specific code that provides networking, persistence and the remote
//! object store. Each trait is a seam: the core is written against the trait,
//! and hosts (or tests) plug in concrete implementations.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP transport
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value store for persisted sync state
//! - [`RemoteStore`](storage::RemoteStore) - Folder-based remote object store with a change feed
//! - [`RemoteStoreFactory`](storage::RemoteStoreFactory) - Opens a remote session for one credential
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! classify failures when converting: rejected credentials become
//! `Unauthorized`, missing objects `NotFound`, throttling and server faults
//! `Transient`, and timeouts or refused connections `Network`. The sync core
//! decides whether to retry from that classification alone.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{
    ChangePage, ObjectPage, RemoteChange, RemoteObject, RemoteStore, RemoteStoreFactory,
    SettingsStore, SettingsTransaction,
};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
