//! Bulk loading of table caches from the backing store.

use crate::cache::Cache;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::Table;
use std::time::Instant;

impl Cache {
    /// Reload the table for `E` through its registered hydrator.
    ///
    /// Returns the number of records added.
    pub async fn hydrate<E: CacheEntity>(&self) -> Result<usize> {
        self.hydrate_table(&E::table()).await
    }

    /// Reload one table through its registered hydrator.
    ///
    /// Reads are refused (`CacheNotEnabled`) while the hydrator runs so
    /// callers fall through to the backing store instead of a half-loaded
    /// table. If the hydrator fails the table stays deactivated until a
    /// retry succeeds. Records are added on top of existing entries, stopping
    /// at the first record that cannot be added.
    ///
    /// # Errors
    ///
    /// - `Error::CacheDoesNotExist`: the table was never activated
    /// - `Error::CacheNoKeyDefined`: no key field registered
    /// - `Error::CacheNoHydratorDefined`: no hydrator registered
    /// - `Error::Timeout`: the hydrator exceeded `callback_timeout`
    /// - any error returned by the hydrator or by adding a record
    pub async fn hydrate_table(&self, table: &Table) -> Result<usize> {
        let timer = Instant::now();

        let (hydrator, existing) = {
            let mut state = self.table_mut(table)?;
            if state.key.is_none() {
                warn!("No Key registered for Table [{}]", table);
                return Err(Error::CacheNoKeyDefined {
                    operation: "hydrate".to_string(),
                    table: table.clone(),
                });
            }
            let hydrator = state
                .hydrator
                .clone()
                .ok_or_else(|| Error::CacheNoHydratorDefined(table.clone()))?;
            state.active = false;
            (hydrator, state.entries.len())
        };

        debug!("» Hydrating Cache for Table [{}]", table);
        let records = self
            .bounded(|| format!("hydrator for table [{}]", table), hydrator())
            .await
            .map_err(|e| {
                warn!("Hydration of Table [{}] failed, table left disabled: {}", table, e);
                e
            })?;

        self.set_active(table, true)?;

        let mut added = 0;
        for record in records {
            self.add_record(table, record)?;
            added += 1;
        }

        info!(
            "Cache for Table [{}] hydrated ({}/{}) in {:?}",
            table,
            added,
            existing,
            timer.elapsed()
        );
        Ok(added)
    }

    /// Hydrate every table with a registered hydrator, in table-name order,
    /// stopping at the first failure.
    ///
    /// Returns the total number of records added.
    pub async fn hydrate_all(&self) -> Result<usize> {
        let mut total = 0;
        for table in self.tables_with(|state| state.hydrator.is_some()) {
            total += self.hydrate_table(&table).await?;
        }
        Ok(total)
    }
}
