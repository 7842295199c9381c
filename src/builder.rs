//! Builder pattern for table setup.

use crate::cache::Cache;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::key::Field;
use crate::table::{erase_hydrator, erase_synchroniser, HydratorFn, SynchroniserFn};
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

/// Fluent builder that activates a table and registers its configuration in
/// one call.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
///
/// cache
///     .table::<User>()
///     .with_key("ID")
///     .with_index("Email")
///     .with_expiry(Duration::from_secs(300))
///     .with_hydrator(|| async { load_users().await })
///     .activate()?;
/// ```
pub struct TableBuilder<'a, E: CacheEntity> {
    cache: &'a Cache,
    key: Option<Field>,
    indices: Vec<Field>,
    expiry: Option<Duration>,
    hydrator: Option<(HydratorFn, &'static str)>,
    synchroniser: Option<(SynchroniserFn, &'static str)>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: CacheEntity> TableBuilder<'a, E> {
    pub(crate) fn new(cache: &'a Cache) -> Self {
        Self {
            cache,
            key: None,
            indices: Vec::new(),
            expiry: None,
            hydrator: None,
            synchroniser: None,
            _entity: PhantomData,
        }
    }

    /// Set the key field.
    pub fn with_key(mut self, field: impl Into<Field>) -> Self {
        self.key = Some(field.into());
        self
    }

    /// Add an advisory index field. May be called repeatedly.
    pub fn with_index(mut self, field: impl Into<Field>) -> Self {
        self.indices.push(field.into());
        self
    }

    /// Override the default expiry for this table.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_hydrator<F, Fut>(mut self, hydrator: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<E>>> + Send + 'static,
    {
        self.hydrator = Some((erase_hydrator(hydrator), std::any::type_name::<F>()));
        self
    }

    pub fn with_synchroniser<F, Fut>(mut self, synchroniser: F) -> Self
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.synchroniser = Some((
            erase_synchroniser(synchroniser),
            std::any::type_name::<F>(),
        ));
        self
    }

    /// Activate the table, wiping any prior state, then apply every
    /// configured registration.
    ///
    /// # Errors
    ///
    /// Returns the first registration error. The table stays activated with
    /// whatever was registered before the failure.
    pub fn activate(self) -> Result<()> {
        let table = E::table();
        self.cache.activate_table(&table);

        if let Some(key) = self.key {
            self.cache.register_key::<E>(key)?;
        }
        for index in self.indices {
            self.cache.register_index::<E>(index)?;
        }
        if let Some(expiry) = self.expiry {
            self.cache.register_expiry::<E>(expiry)?;
        }
        if let Some((hydrator, name)) = self.hydrator {
            self.cache.install_hydrator(&table, hydrator, name)?;
        }
        if let Some((synchroniser, name)) = self.synchroniser {
            self.cache.install_synchroniser(&table, synchroniser, name)?;
        }
        Ok(())
    }
}

impl Cache {
    /// Start configuring the table for `E`.
    pub fn table<E: CacheEntity>(&self) -> TableBuilder<'_, E> {
        TableBuilder::new(self)
    }
}
