//! Metrics hooks and cache statistics.

use crate::key::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for recording cache metrics.
///
/// Every method has a no-op default so implementors pick what they need.
pub trait CacheMetrics: Send + Sync {
    /// A keyed or filtered lookup found its record.
    fn record_hit(&self, _table: &Table, _duration: Duration) {}

    /// A keyed or filtered lookup found nothing.
    fn record_miss(&self, _table: &Table, _duration: Duration) {}

    /// A lookup failed for any other reason.
    fn record_error(&self, _table: &Table, _error: &str) {}

    /// An eviction sweep finished.
    fn record_purge(&self, _removed: usize, _duration: Duration) {}
}

/// Metrics sink that discards everything.
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {}

/// Point-in-time summary of the whole cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub created_at: DateTime<Utc>,
    /// Time of the last mutating operation; `None` until the first one.
    pub updated_at: Option<DateTime<Utc>>,
    pub table_count: usize,
    /// Live entries across every table.
    pub entry_count: usize,
}
