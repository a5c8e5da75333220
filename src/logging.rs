//! Logging utilities for structured tracing

use std::time::Instant;

/// Times a control API call (or any other operation) and logs it on drop
pub struct Timer {
    start: Instant,
    operation: String,
}

impl Timer {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.into(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        tracing::debug!(
            operation = %self.operation,
            duration_ms = self.elapsed_ms(),
            "Operation completed"
        );
    }
}

/// Log an error with structured context
pub fn log_error(operation: &str, error: &crate::error::SlackBotError) {
    tracing::error!(
        operation = %operation,
        error = %error,
        retryable = error.is_retryable(),
        not_found = error.is_not_found(),
        "Operation failed"
    );
}
