//! Bounded retry of single remote calls.
//!
//! Every remote call made during a pass goes through [`RetryPolicy::execute`].
//! Failures are classified once, from the [`BridgeError`] variant alone:
//!
//! | Class             | Bridge variant            | Action                        |
//! |-------------------|---------------------------|-------------------------------|
//! | `AuthRecoverable` | `Unauthorized`            | return at once                |
//! | `Transient`       | `Transient`, `Network`    | retry until `max_attempts`    |
//! | `NotFound`        | `NotFound`                | return at once                |
//! | `Fatal`           | anything else             | return at once                |
//!
//! There is no backoff between attempts. Each attempt is raced against the
//! pass cancellation token.

use crate::error::{Result, SyncError};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default attempt budget: the first call plus one retry.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    AuthRecoverable,
    Transient,
    NotFound,
    Fatal,
}

impl ErrorClass {
    pub fn classify(error: &BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(_) => ErrorClass::AuthRecoverable,
            BridgeError::Transient(_) | BridgeError::Network(_) => ErrorClass::Transient,
            BridgeError::NotFound(_) => ErrorClass::NotFound,
            _ => ErrorClass::Fatal,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; values below 1 are raised to 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `call` until it succeeds, fails non-transiently, exhausts the
    /// attempt budget or the token is cancelled.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BridgeResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                result = call() => result,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match ErrorClass::classify(&error) {
                ErrorClass::AuthRecoverable => {
                    return Err(SyncError::Unauthorized(format!("{}: {}", operation, error)))
                }
                ErrorClass::NotFound => {
                    return Err(SyncError::RemoteNotFound(format!("{}: {}", operation, error)))
                }
                ErrorClass::Fatal => {
                    return Err(SyncError::Remote(format!("{}: {}", operation, error)))
                }
                ErrorClass::Transient if attempt < self.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "Remote call failed, retrying"
                    );
                }
                ErrorClass::Transient => {
                    return Err(SyncError::Transient(format!(
                        "{} failed after {} attempts: {}",
                        operation, attempt, error
                    )))
                }
            }
        }
    }
}
