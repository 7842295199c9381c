//! Backing-store abstraction for hydration and write-back.

use crate::cache::Cache;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::{Field, FieldValue};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;

/// Trait for the data store a table is loaded from and flushed to.
///
/// Implement with plain `async fn`:
///
/// ```ignore
/// impl DataRepository<User> for UserRepository {
///     async fn fetch_all(&self) -> Result<Vec<User>> {
///         self.pool.query_users().await
///     }
///
///     async fn persist(&self, user: User) -> Result<()> {
///         self.pool.upsert_user(&user).await
///     }
/// }
/// ```
pub trait DataRepository<T: CacheEntity>: Send + Sync + 'static {
    /// Load the table's authoritative record set.
    fn fetch_all(&self) -> impl Future<Output = Result<Vec<T>>> + Send;

    /// Write one record back.
    fn persist(&self, entity: T) -> impl Future<Output = Result<()>> + Send;
}

impl Cache {
    /// Register `repository` as both hydrator and synchroniser for `E`.
    pub fn register_repository<E, R>(&self, repository: Arc<R>) -> Result<()>
    where
        E: CacheEntity,
        R: DataRepository<E>,
    {
        let source = repository.clone();
        self.register_hydrator(move || {
            let source = source.clone();
            async move { source.fetch_all().await }
        })?;

        self.register_synchroniser(move |entity: E| {
            let sink = repository.clone();
            async move { sink.persist(entity).await }
        })
    }
}

/// In-memory repository keyed by one field, for tests and demos.
pub struct InMemoryRepository<T> {
    key: Field,
    data: DashMap<FieldValue, T>,
}

impl<T: CacheEntity> InMemoryRepository<T> {
    pub fn new(key: impl Into<Field>) -> Self {
        InMemoryRepository {
            key: key.into(),
            data: DashMap::new(),
        }
    }

    fn key_of(&self, entity: &T) -> Result<FieldValue> {
        CacheEntity::field_value(entity, &self.key).ok_or_else(|| {
            Error::RepositoryError(format!(
                "record of type {} has no field [{}]",
                std::any::type_name::<T>(),
                self.key
            ))
        })
    }

    /// Insert or replace a record.
    pub fn insert(&self, entity: T) -> Result<()> {
        let key = self.key_of(&entity)?;
        self.data.insert(key, entity);
        Ok(())
    }

    pub fn get(&self, key: impl Into<FieldValue>) -> Option<T> {
        self.data.get(&key.into()).map(|entity| entity.value().clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl<T: CacheEntity> DataRepository<T> for InMemoryRepository<T> {
    async fn fetch_all(&self) -> Result<Vec<T>> {
        Ok(self
            .data
            .iter()
            .map(|entity| entity.value().clone())
            .collect())
    }

    async fn persist(&self, entity: T) -> Result<()> {
        self.insert(entity)
    }
}
