//! # dao-cache
//!
//! A type-safe, multi-table, in-process cache for generated data-access
//! layers.
//!
//! ## Features
//!
//! - **One table per entity type:** each table has its own key field, expiry
//!   and activation state
//! - **Hydration:** bulk-load a table from the backing store through an async
//!   callback
//! - **Write-back:** flush cached records to the backing store through an
//!   async synchroniser
//! - **Lazy expiry:** entries are swept by an explicit purge call, never by a
//!   timer
//! - **Concurrent:** every operation is an atomic read-modify-write on one
//!   table; callbacks run without any lock held
//!
//! ## Quick Start
//!
//! ```ignore
//! use dao_cache::{Cache, CacheEntity, Field, FieldValue};
//!
//! // 1. Define your entity
//! #[derive(Clone)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! // 2. Implement CacheEntity
//! impl CacheEntity for User {
//!     fn table_name() -> &'static str {
//!         "User"
//!     }
//!
//!     fn field_value(&self, field: &Field) -> Option<FieldValue> {
//!         match field.as_str() {
//!             "ID" => Some(self.id.into()),
//!             "Name" => Some(self.name.clone().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! // 3. Use it
//! let cache = Cache::default();
//! cache.table::<User>().with_key("ID").activate()?;
//! cache.add_entry(User { id: 1, name: "A".into() })?;
//! let user: User = cache.get::<User>(1u64)?;
//! ```

#[macro_use]
extern crate log;

pub mod builder;
pub mod cache;
pub mod coerce;
pub mod config;
mod diagnostics;
pub mod entity;
mod entries;
pub mod error;
mod eviction;
mod hydrate;
pub mod key;
pub mod observability;
pub mod repository;
mod sync;
mod table;

// Re-exports for convenience
pub use builder::TableBuilder;
pub use cache::Cache;
pub use coerce::coerce;
pub use config::CacheConfig;
pub use entity::{CacheEntity, Record};
pub use error::{Error, Result};
pub use key::{Field, FieldValue, Table};
pub use observability::{CacheMetrics, CacheStats, NoOpMetrics};
pub use repository::{DataRepository, InMemoryRepository};

use once_cell::sync::Lazy;

static GLOBAL: Lazy<Cache> = Lazy::new(|| Cache::new(CacheConfig::from_env()));

/// Process-wide cache, configured from the environment on first use.
pub fn global() -> &'static Cache {
    &GLOBAL
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
