//! Entry operations: add, remove, keyed and filtered retrieval, count.

use crate::cache::Cache;
use crate::coerce::coerce_record;
use crate::entity::{CacheEntity, Record};
use crate::error::{Error, Result};
use crate::key::{Field, FieldValue, Table};
use crate::table::{CacheEntry, TableState};
use chrono::{DateTime, Utc};
use dashmap::mapref::one::Ref;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `now + expiry`, saturating at the latest representable instant.
pub(crate) fn expiry_from(now: DateTime<Utc>, expiry: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(expiry)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Extract the registered key value from `record`.
fn key_of(
    state: &TableState,
    table: &Table,
    record: &dyn Record,
    operation: &str,
) -> Result<FieldValue> {
    if record.is_nil() {
        warn!("Cannot {} <nil> data in cache", operation);
        return Err(Error::CacheNilData(operation.to_string()));
    }
    let field = state.key.as_ref().ok_or_else(|| {
        warn!("No Key registered for Table [{}]", table);
        Error::CacheNoKeyDefined {
            operation: operation.to_string(),
            table: table.clone(),
        }
    })?;
    record.field_value(field).ok_or_else(|| Error::KeyFieldMissing {
        table: table.clone(),
        field: field.clone(),
        type_name: record.type_name(),
    })
}

impl Cache {
    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Add or replace the record under its key value.
    ///
    /// # Errors
    ///
    /// - `Error::CacheNilData`: the record is nil
    /// - `Error::CacheDoesNotExist`: the table was never activated
    /// - `Error::CacheNoKeyDefined`: no key field registered
    /// - `Error::KeyFieldMissing`: the record does not expose the key field
    pub fn add_entry<E: CacheEntity>(&self, record: E) -> Result<()> {
        self.add_record(&E::table(), Arc::new(record))
    }

    /// Add each record in turn, stopping at the first failure.
    ///
    /// Records added before the failure stay cached.
    pub fn add_entries<E, I>(&self, records: I) -> Result<()>
    where
        E: CacheEntity,
        I: IntoIterator<Item = E>,
    {
        for record in records {
            self.add_entry(record)?;
        }
        Ok(())
    }

    /// Alias of [`Cache::add_entry`].
    pub fn update<E: CacheEntity>(&self, record: E) -> Result<()> {
        self.add_entry(record)
    }

    pub(crate) fn add_record(&self, table: &Table, record: Arc<dyn Record>) -> Result<()> {
        if record.is_nil() {
            warn!("Cannot add <nil> data to cache");
            return Err(Error::CacheNilData("add".to_string()));
        }

        let mut state = self.table_mut(table).map_err(|_| Error::CacheNoKeyDefined {
            operation: "add".to_string(),
            table: table.clone(),
        })?;
        let key = key_of(&state, table, record.as_ref(), "add")?;

        let expiry = if state.active {
            state.expiry
        } else {
            self.config.default_expiry
        };
        let expires_at = expiry_from(Utc::now(), expiry);

        debug!(
            "Cache Entry for Table [{}] added with Key [{}], expiry [{}]",
            table,
            key,
            expires_at.to_rfc3339()
        );
        state.insert(key, CacheEntry { record, expires_at });
        drop(state);

        self.touch();
        Ok(())
    }

    /// Remove the entry whose key value matches `record`'s.
    pub fn remove_entry<E: CacheEntity>(&self, record: &E) -> Result<()> {
        let table = E::table();
        let mut state = self.table_mut(&table).map_err(|_| Error::CacheNoKeyDefined {
            operation: "remove".to_string(),
            table: table.clone(),
        })?;
        let key = key_of(&state, &table, record, "remove")?;
        if !state.remove(&key) {
            debug!("No Cache Entry for Table [{}] with Key [{}] to remove", table, key);
        }
        drop(state);

        self.touch();
        Ok(())
    }

    /// Remove an entry by explicit key value.
    pub fn remove_by_key<E: CacheEntity>(&self, key: impl Into<FieldValue>) -> Result<()> {
        let table = E::table();
        let key = key.into();
        let no_key = || Error::CacheNoKeyDefined {
            operation: "remove".to_string(),
            table: table.clone(),
        };

        let mut state = self.table_mut(&table).map_err(|_| no_key())?;
        if state.key.is_none() {
            warn!("No Key registered for Table [{}]", table);
            return Err(no_key());
        }
        if !state.remove(&key) {
            debug!("No Cache Entry for Table [{}] with Key [{}] to remove", table, key);
        }
        drop(state);

        self.touch();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// Read guard for a table that exists, is active and has a key.
    fn readable(&self, table: &Table, operation: &str) -> Result<Ref<'_, Table, TableState>> {
        let state = self
            .tables
            .get(table)
            .ok_or_else(|| Error::CacheDoesNotExist(table.clone()))?;
        if !state.active {
            return Err(Error::CacheNotEnabled {
                operation: operation.to_string(),
                table: table.clone(),
            });
        }
        if state.key.is_none() {
            warn!("No Key registered for Table [{}]", table);
            return Err(Error::CacheNoKeyDefined {
                operation: operation.to_string(),
                table: table.clone(),
            });
        }
        Ok(state)
    }

    /// Look up one record by key value.
    ///
    /// Expired entries are still returned until an eviction sweep removes
    /// them.
    ///
    /// # Errors
    ///
    /// - `Error::CacheDoesNotExist`: the table was never activated
    /// - `Error::CacheNotEnabled`: the table is disabled or hydrating
    /// - `Error::CacheNoKeyDefined`: no key field registered
    /// - `Error::CacheRecordNotFound`: no entry under `key`
    /// - `Error::TypeMismatch`: the stored record cannot be produced as `T`
    pub fn get<T: CacheEntity>(&self, key: impl Into<FieldValue>) -> Result<T> {
        let table = T::table();
        let key = key.into();
        let timer = Instant::now();

        let result = self.readable(&table, "get").and_then(|state| {
            let entry = state
                .entries
                .get(&key)
                .ok_or_else(|| Error::CacheRecordNotFound {
                    table: table.clone(),
                    key: key.to_string(),
                })?;
            coerce_record::<T>(&table, &entry.record)
        });

        self.observe(&table, timer, &result);
        result
    }

    /// Alias of [`Cache::get`].
    pub fn find_by_key<T: CacheEntity>(&self, key: impl Into<FieldValue>) -> Result<T> {
        self.get(key)
    }

    /// Every cached record of the table, expired or not, in unspecified order.
    pub fn get_all<T: CacheEntity>(&self) -> Result<Vec<T>> {
        let table = T::table();
        let state = self.readable(&table, "getall")?;
        state
            .entries
            .values()
            .map(|entry| coerce_record::<T>(&table, &entry.record))
            .collect()
    }

    /// The single record whose `field` equals `value`.
    ///
    /// A linear scan; registered indices are advisory and not consulted.
    ///
    /// # Errors
    ///
    /// - `Error::CacheRecordNotFound`: nothing matched
    /// - `Error::CacheMultipleRecordsFound`: more than one entry matched
    /// - plus the table-state errors of [`Cache::get`]
    pub fn get_where<T: CacheEntity>(
        &self,
        field: impl Into<Field>,
        value: impl Into<FieldValue>,
    ) -> Result<T> {
        let table = T::table();
        let field = field.into();
        let value = value.into();
        let timer = Instant::now();

        let result = self.readable(&table, "getwhere").and_then(|state| {
            let matches: Vec<&CacheEntry> = state.matching(&field, &value).collect();
            match matches.as_slice() {
                [] => Err(Error::CacheRecordNotFound {
                    table: table.clone(),
                    key: value.to_string(),
                }),
                [entry] => coerce_record::<T>(&table, &entry.record),
                _ => {
                    warn!(
                        "GetWhere: multiple cache entries found for table {} where {}={} (count={}); refusing ambiguous result",
                        table,
                        field,
                        value,
                        matches.len()
                    );
                    Err(Error::CacheMultipleRecordsFound {
                        table: table.clone(),
                        field: field.clone(),
                        value: value.to_string(),
                        count: matches.len(),
                    })
                }
            }
        });

        self.observe(&table, timer, &result);
        result
    }

    /// Every record whose `field` equals `value`; empty if none match.
    pub fn get_all_where<T: CacheEntity>(
        &self,
        field: impl Into<Field>,
        value: impl Into<FieldValue>,
    ) -> Result<Vec<T>> {
        let table = T::table();
        let field = field.into();
        let value = value.into();

        let state = self.readable(&table, "getallwhere")?;
        state
            .matching(&field, &value)
            .map(|entry| coerce_record::<T>(&table, &entry.record))
            .collect()
    }

    /// Alias of [`Cache::get_all_where`].
    pub fn find_by_index<T: CacheEntity>(
        &self,
        field: impl Into<Field>,
        value: impl Into<FieldValue>,
    ) -> Result<Vec<T>> {
        self.get_all_where(field, value)
    }

    /// The maintained entry count of the table.
    pub fn count<E: CacheEntity>(&self) -> Result<u64> {
        let table = E::table();
        self.tables
            .get(&table)
            .map(|state| state.count)
            .ok_or(Error::CacheDoesNotExist(table))
    }

    fn observe<T>(&self, table: &Table, timer: Instant, result: &Result<T>) {
        match result {
            Ok(_) => self.metrics.record_hit(table, timer.elapsed()),
            Err(e) if e.is_not_found() => self.metrics.record_miss(table, timer.elapsed()),
            Err(e) => self.metrics.record_error(table, &e.to_string()),
        }
    }
}
