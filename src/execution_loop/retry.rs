//! Retry Loop
//!
//! Bounded retry with exponential backoff for model calls.

use crate::error::{AstroError, Result};
use crate::execution_loop::error_classifier::{TransportError, TransportErrorKind};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry loop with bounded attempts
#[derive(Debug, Clone)]
pub struct RetryLoop {
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryLoop {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after a transient failure on zero-based `attempt`.
    ///
    /// With the default 2s base this is `2^(attempt+1)` seconds.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `call` until it succeeds, fails terminally or runs out of attempts.
    ///
    /// `call` receives the zero-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        for attempt in 0..self.max_attempts {
            let err = match call(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!("Model call succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            match err.kind {
                TransportErrorKind::Authentication => {
                    warn!("Model call rejected credentials: {}", err.message);
                    return Err(AstroError::Authentication(err.message));
                }
                TransportErrorKind::Transient if attempt + 1 < self.max_attempts => {
                    let wait = self.backoff_for(attempt);
                    warn!(
                        "Transient model error (attempt {} of {}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        wait,
                        err.message
                    );
                    tokio::time::sleep(wait).await;
                }
                TransportErrorKind::Transient | TransportErrorKind::Fatal => {
                    warn!("Model call failed ({}): {}", err.kind, err.message);
                    return Err(AstroError::Model(err.message));
                }
            }
        }

        Err(AstroError::MaxRetriesExceeded(self.max_attempts))
    }
}

impl Default for RetryLoop {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
