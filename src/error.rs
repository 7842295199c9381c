//! Error types for cache operations.

use crate::key::{Field, Table};
use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by cache operations.
///
/// Every failure is an explicit value; no operation falls back to a default
/// record when something goes wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Operation attempted on an inactive or unregistered table.
    CacheNotEnabled { operation: String, table: Table },

    /// A nil record was passed where one is required.
    CacheNilData(String),

    /// The table has no registered key field.
    CacheNoKeyDefined { operation: String, table: Table },

    /// The table has never been activated.
    CacheDoesNotExist(Table),

    /// Exact or filtered lookup matched zero entries.
    CacheRecordNotFound { table: Table, key: String },

    /// A single-result filtered lookup matched more than one entry.
    CacheMultipleRecordsFound {
        table: Table,
        field: Field,
        value: String,
        count: usize,
    },

    /// Hydration requested but no hydrator registered.
    CacheNoHydratorDefined(Table),

    /// Synchronisation requested but no synchroniser registered.
    CacheNoSynchroniserDefined(Table),

    /// The stored record cannot be produced as the requested type.
    TypeMismatch {
        table: Table,
        stored: &'static str,
        requested: &'static str,
    },

    /// The record does not expose the table's key field.
    KeyFieldMissing {
        table: Table,
        field: Field,
        type_name: &'static str,
    },

    /// Backing store failure reported by a hydrator or synchroniser.
    RepositoryError(String),

    /// A callback did not complete within the configured timeout.
    Timeout(String),

    /// Invalid configuration.
    ConfigError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CacheNotEnabled { operation, table } => {
                write!(f, "cache not enabled for table [{}] ({})", table, operation)
            }
            Error::CacheNilData(operation) => {
                write!(f, "cannot {} <nil> data in cache", operation)
            }
            Error::CacheNoKeyDefined { operation, table } => {
                write!(f, "no cache key defined for table [{}] ({})", table, operation)
            }
            Error::CacheDoesNotExist(table) => {
                write!(f, "cache does not exist for table [{}]", table)
            }
            Error::CacheRecordNotFound { table, key } => {
                write!(f, "cache record not found in table [{}] for [{}]", table, key)
            }
            Error::CacheMultipleRecordsFound {
                table,
                field,
                value,
                count,
            } => write!(
                f,
                "multiple cache records found in table [{}] where {}={} (count={})",
                table, field, value, count
            ),
            Error::CacheNoHydratorDefined(table) => {
                write!(f, "no hydrator defined for table [{}]", table)
            }
            Error::CacheNoSynchroniserDefined(table) => {
                write!(f, "no synchroniser defined for table [{}]", table)
            }
            Error::TypeMismatch {
                table,
                stored,
                requested,
            } => write!(
                f,
                "cache contains unexpected type for table [{}]: got {}, want {}",
                table, stored, requested
            ),
            Error::KeyFieldMissing {
                table,
                field,
                type_name,
            } => write!(
                f,
                "key field {:?} not found on {} for table [{}]",
                field.as_str(),
                type_name,
                table
            ),
            Error::RepositoryError(msg) => write!(f, "Repository error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for lookups that found nothing, as opposed to misconfiguration.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CacheRecordNotFound { .. })
    }
}
