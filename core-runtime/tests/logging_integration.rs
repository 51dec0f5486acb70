//! Integration tests for the logging system

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// The global subscriber can be installed once per process, so every
// assertion about it lives in this single test.
#[tokio::test]
async fn test_global_logging_forwards_to_sink_and_rejects_reinit() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first initialization succeeds");

    tracing::info!(target: "core_sync::engine", phase = "listing", "Phase 1: listing folder");
    tracing::debug!(target: "sqlx::query", "SELECT 1");

    // Delivery is spawned onto the runtime.
    tokio::time::sleep(Duration::from_millis(50)).await;

    {
        let entries = sink.entries.lock().unwrap();
        assert!(entries
            .iter()
            .any(|e| e.message == "Phase 1: listing folder"
                && e.fields.get("phase").map(String::as_str) == Some("listing")));
        assert!(
            entries.iter().all(|e| !e.target.starts_with("sqlx")),
            "dependency debug output must be filtered"
        );
    }

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_credentials_never_logged_verbatim() {
    for field in ["access_token", "refresh_token", "Authorization", "client_secret"] {
        assert_eq!(redact_if_sensitive(field, "ya29.a0AfH6SM"), "[REDACTED]");
    }
}

#[test]
fn test_account_email_redaction() {
    let redacted = redact_if_sensitive("account", "runner@example.com");
    assert!(redacted.starts_with('r'));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Pretty)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false);

    assert_eq!(config.format, LogFormat::Pretty);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.logger_sink.is_none());
}
