//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the track sync crates:
//! - Logging and tracing setup ([`logging`])
//! - Validated configuration with desktop defaults ([`config`])
//! - Broadcast event bus for sync progress and outcomes ([`events`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
