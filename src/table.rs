//! Per-table cache state and type-erased callbacks.

use crate::coerce::coerce_record;
use crate::entity::{CacheEntity, Record};
use crate::error::{Error, Result};
use crate::key::{Field, FieldValue};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Loads a table's authoritative record set from the backing store.
pub(crate) type HydratorFn =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<Arc<dyn Record>>>> + Send + Sync>;

/// Persists one cached record to the backing store.
pub(crate) type SynchroniserFn =
    Arc<dyn Fn(Arc<dyn Record>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A stored record plus its expiry timestamp.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    pub(crate) record: Arc<dyn Record>,
    pub(crate) expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub(crate) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// State for one active table.
pub(crate) struct TableState {
    pub(crate) active: bool,
    pub(crate) key: Option<Field>,
    pub(crate) indices: Vec<Field>,
    pub(crate) expiry: Duration,
    pub(crate) entries: HashMap<FieldValue, CacheEntry>,
    pub(crate) count: u64,
    pub(crate) hydrator: Option<HydratorFn>,
    pub(crate) synchroniser: Option<SynchroniserFn>,
}

impl TableState {
    /// Fresh state as produced by activation.
    pub(crate) fn activated(expiry: Duration) -> Self {
        TableState {
            active: true,
            key: None,
            indices: Vec::new(),
            expiry,
            entries: HashMap::new(),
            count: 0,
            hydrator: None,
            synchroniser: None,
        }
    }

    /// Drop entry data and the key; callbacks survive.
    pub(crate) fn disable(&mut self) {
        self.active = false;
        self.entries.clear();
        self.count = 0;
        self.indices.clear();
        self.key = None;
    }

    pub(crate) fn clear_entries(&mut self) {
        self.entries.clear();
        self.count = 0;
    }

    /// Insert or replace; returns true if the key was new.
    pub(crate) fn insert(&mut self, key: FieldValue, entry: CacheEntry) -> bool {
        let added = self.entries.insert(key, entry).is_none();
        if added {
            self.count += 1;
        }
        added
    }

    /// Remove by key; returns true if an entry was present.
    pub(crate) fn remove(&mut self, key: &FieldValue) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.count = self.count.saturating_sub(1);
        }
        removed
    }

    /// Entries whose `field` equals `value`, in unspecified order.
    pub(crate) fn matching<'a>(
        &'a self,
        field: &'a Field,
        value: &'a FieldValue,
    ) -> impl Iterator<Item = &'a CacheEntry> + 'a {
        self.entries
            .values()
            .filter(move |entry| entry.record.field_value(field).as_ref() == Some(value))
    }
}

pub(crate) fn erase_hydrator<E, F, Fut>(hydrator: F) -> HydratorFn
where
    E: CacheEntity,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<E>>> + Send + 'static,
{
    Arc::new(move || {
        let records = hydrator();
        async move {
            let records: Vec<E> = records.await?;
            Ok::<_, Error>(
                records
                    .into_iter()
                    .map(|record| Arc::new(record) as Arc<dyn Record>)
                    .collect::<Vec<_>>(),
            )
        }
        .boxed()
    })
}

pub(crate) fn erase_synchroniser<E, F, Fut>(synchroniser: F) -> SynchroniserFn
where
    E: CacheEntity,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |record: Arc<dyn Record>| {
        match coerce_record::<E>(&E::table(), &record) {
            Ok(entity) => synchroniser(entity).boxed(),
            Err(e) => futures::future::ready(Err(e)).boxed(),
        }
    })
}
