//! Write-back of cached records to the backing store.

use crate::cache::Cache;
use crate::entity::{CacheEntity, Record};
use crate::error::{Error, Result};
use crate::key::Table;
use crate::table::{SynchroniserFn, TableState};
use std::sync::Arc;

/// Key and synchroniser checks shared by every synchronise entry point.
fn synchroniser_of(state: &TableState, table: &Table) -> Result<SynchroniserFn> {
    if state.key.is_none() {
        warn!("No Key registered for Table [{}]", table);
        return Err(Error::CacheNoKeyDefined {
            operation: "synchronise".to_string(),
            table: table.clone(),
        });
    }
    state
        .synchroniser
        .clone()
        .ok_or_else(|| Error::CacheNoSynchroniserDefined(table.clone()))
}

impl Cache {
    /// Flush every cached record of `E` through its synchroniser.
    pub async fn synchronise<E: CacheEntity>(&self) -> Result<usize> {
        self.synchronise_table(&E::table()).await
    }

    /// Flush every cached record of one table through its synchroniser.
    ///
    /// The synchroniser is invoked once per entry on a snapshot taken when
    /// the call starts. The first error aborts the flush; records already
    /// written stay written.
    ///
    /// # Errors
    ///
    /// - `Error::CacheDoesNotExist`: the table was never activated
    /// - `Error::CacheNoKeyDefined`: no key field registered
    /// - `Error::CacheNoSynchroniserDefined`: no synchroniser registered
    /// - `Error::Timeout`: one invocation exceeded `callback_timeout`
    /// - any error returned by the synchroniser
    pub async fn synchronise_table(&self, table: &Table) -> Result<usize> {
        let (synchroniser, records) = {
            let state = self.table_mut(table)?;
            let synchroniser = synchroniser_of(&state, table)?;
            let records: Vec<Arc<dyn Record>> = state
                .entries
                .values()
                .map(|entry| entry.record.clone())
                .collect();
            (synchroniser, records)
        };

        let total = records.len();
        let mut flushed = 0;
        for record in records {
            self.bounded(
                || format!("synchroniser for table [{}]", table),
                synchroniser(record),
            )
            .await
            .map_err(|e| {
                warn!(
                    "Synchronisation of Table [{}] aborted after {}/{}: {}",
                    table, flushed, total, e
                );
                e
            })?;
            flushed += 1;
        }

        info!("Cache for Table [{}] synchronised ({}/{})", table, flushed, total);
        Ok(flushed)
    }

    /// Flush the one cached entry whose key matches `record`'s.
    ///
    /// The cached copy is written, not `record` itself.
    pub async fn synchronise_entry<E: CacheEntity>(&self, record: &E) -> Result<()> {
        let table = E::table();
        if CacheEntity::is_nil(record) {
            return Err(Error::CacheNilData("synchronise".to_string()));
        }

        let (synchroniser, key, cached) = {
            let state = self.table_mut(&table)?;
            let synchroniser = synchroniser_of(&state, &table)?;
            let field = state.key.clone().ok_or_else(|| Error::CacheNoKeyDefined {
                operation: "synchronise".to_string(),
                table: table.clone(),
            })?;
            let key = CacheEntity::field_value(record, &field).ok_or_else(|| {
                Error::KeyFieldMissing {
                    table: table.clone(),
                    field: field.clone(),
                    type_name: std::any::type_name::<E>(),
                }
            })?;
            let cached = state
                .entries
                .get(&key)
                .map(|entry| entry.record.clone())
                .ok_or_else(|| Error::CacheRecordNotFound {
                    table: table.clone(),
                    key: key.to_string(),
                })?;
            (synchroniser, key, cached)
        };

        self.bounded(
            || format!("synchroniser for table [{}]", table),
            synchroniser(cached),
        )
        .await?;

        info!("Cache Entry for Table [{}] with Key [{}] synchronised", table, key);
        Ok(())
    }

    /// Synchronise every table with a registered synchroniser, in table-name
    /// order, stopping at the first failure.
    pub async fn synchronise_all(&self) -> Result<usize> {
        let mut total = 0;
        for table in self.tables_with(|state| state.synchroniser.is_some()) {
            total += self.synchronise_table(&table).await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::Cache;
    use crate::entity::CacheEntity;
    use crate::error::Error;
    use crate::key::{Field, FieldValue, Table};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    struct Account {
        id: i64,
        balance: i64,
    }

    impl CacheEntity for Account {
        fn table_name() -> &'static str {
            "Account"
        }

        fn field_value(&self, field: &Field) -> Option<FieldValue> {
            match field.as_str() {
                "ID" => Some(self.id.into()),
                "Balance" => Some(self.balance.into()),
                _ => None,
            }
        }
    }

    fn account(id: i64, balance: i64) -> Account {
        Account { id, balance }
    }

    fn recording_cache() -> (Cache, Arc<Mutex<Vec<Account>>>) {
        let cache = Cache::default();
        cache.activate::<Account>();
        cache.register_key::<Account>("ID").expect("Failed to register key");

        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = written.clone();
        cache
            .register_synchroniser(move |account: Account| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(account);
                    Ok(())
                }
            })
            .expect("Failed to register synchroniser");

        (cache, written)
    }

    #[tokio::test]
    async fn test_synchronise_flushes_every_entry() {
        let (cache, written) = recording_cache();
        cache
            .add_entries((1..=4).map(|id| account(id, id * 10)))
            .expect("Failed to add");

        assert_eq!(cache.synchronise::<Account>().await, Ok(4));

        let mut ids: Vec<i64> = written.lock().iter().map(|a| a.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_synchronise_entry_writes_cached_copy() {
        let (cache, written) = recording_cache();
        cache.add_entry(account(1, 100)).expect("Failed to add");
        cache.add_entry(account(2, 200)).expect("Failed to add");

        cache
            .synchronise_entry(&account(1, 0))
            .await
            .expect("Failed to synchronise entry");

        assert_eq!(*written.lock(), vec![account(1, 100)]);
        assert!(cache
            .synchronise_entry(&account(9, 0))
            .await
            .expect_err("Expected miss")
            .is_not_found());
    }

    #[tokio::test]
    async fn test_synchronise_requires_synchroniser() {
        let cache = Cache::default();
        cache.activate::<Account>();
        cache.register_key::<Account>("ID").expect("Failed to register key");

        assert_eq!(
            cache.synchronise::<Account>().await,
            Err(Error::CacheNoSynchroniserDefined(Table::from("Account")))
        );
        assert_eq!(cache.synchronise_all().await, Ok(0));
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Ledger {
        code: String,
    }

    impl CacheEntity for Ledger {
        fn table_name() -> &'static str {
            "Ledger"
        }

        fn field_value(&self, field: &Field) -> Option<FieldValue> {
            match field.as_str() {
                "Code" => Some(self.code.clone().into()),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_synchronise_all_walks_every_table() {
        let (cache, accounts) = recording_cache();
        cache
            .add_entries((1..=3).map(|id| account(id, 0)))
            .expect("Failed to add");

        cache.activate::<Ledger>();
        cache.register_key::<Ledger>("Code").expect("Failed to register key");
        let ledgers = Arc::new(Mutex::new(Vec::new()));
        let sink = ledgers.clone();
        cache
            .register_synchroniser(move |ledger: Ledger| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(ledger.code);
                    Ok(())
                }
            })
            .expect("Failed to register synchroniser");
        for code in ["gl", "ap"] {
            cache
                .add_entry(Ledger {
                    code: code.to_string(),
                })
                .expect("Failed to add");
        }

        cache.activate_table(&Table::from("Unsynchronised"));

        assert_eq!(cache.synchronise_all().await, Ok(5));
        assert_eq!(accounts.lock().len(), 3);
        let mut codes = ledgers.lock().clone();
        codes.sort();
        assert_eq!(codes, vec!["ap".to_string(), "gl".to_string()]);
    }

    #[tokio::test]
    async fn test_synchronise_aborts_on_first_error() {
        let cache = Cache::default();
        cache.activate::<Account>();
        cache.register_key::<Account>("ID").expect("Failed to register key");
        cache
            .add_entries((1..=5).map(|id| account(id, 0)))
            .expect("Failed to add");

        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        cache
            .register_synchroniser(move |_account: Account| {
                let counter = counter.clone();
                async move {
                    let mut calls = counter.lock();
                    *calls += 1;
                    if *calls == 2 {
                        return Err(Error::RepositoryError("write failed".to_string()));
                    }
                    Ok(())
                }
            })
            .expect("Failed to register synchroniser");

        assert_eq!(
            cache.synchronise::<Account>().await,
            Err(Error::RepositoryError("write failed".to_string()))
        );
        assert_eq!(*calls.lock(), 2);
    }
}
