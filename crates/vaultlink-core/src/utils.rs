//! Shared utilities for operations across vaultlink crates.
//!
//! Provides helpers for:
//! - Transaction tracking (ids + elapsed time)
//! - Timestamps in the representation used by the index

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Transaction tracking utilities
pub struct TransactionBuilder {
    transaction_id: String,
    start_time: Instant,
}

impl TransactionBuilder {
    /// Create a new transaction tracker
    pub fn new() -> Self {
        Self {
            transaction_id: uuid::Uuid::new_v4().to_string(),
            start_time: Instant::now(),
        }
    }

    /// Get the transaction ID
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a filesystem timestamp into index seconds
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Current time in index seconds
pub fn now_secs() -> f64 {
    system_time_to_secs(SystemTime::now())
}
