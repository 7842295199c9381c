//! Expiry sweep and explicit clearing.

use crate::cache::Cache;
use crate::entity::CacheEntity;
use crate::error::Result;
use crate::key::Table;
use chrono::Utc;
use std::time::Instant;

impl Cache {
    /// Remove every entry whose expiry is strictly before now.
    ///
    /// There is no internal timer; an external scheduler must call this.
    /// Returns the number of entries removed.
    pub fn purge_expired_entries(&self) -> usize {
        let timer = Instant::now();
        let now = Utc::now();
        info!("Cache Purge Started at {}", now.to_rfc3339());

        let mut purged = 0;
        for mut state in self.tables.iter_mut() {
            let (table, state) = state.pair_mut();
            let before = state.entries.len();
            state.entries.retain(|key, entry| {
                let expired = entry.is_expired_at(now);
                if expired {
                    debug!(
                        "Cache Entry for Table [{}] with Key [{}] expired at [{}], removing it",
                        table,
                        key,
                        entry.expires_at.to_rfc3339()
                    );
                }
                !expired
            });
            let removed = before - state.entries.len();
            state.count = state.count.saturating_sub(removed as u64);
            purged += removed;
        }

        self.metrics.record_purge(purged, timer.elapsed());
        info!("Cache Purge Completed, {} entries removed in {:?}", purged, timer.elapsed());
        purged
    }

    /// Empty the table for `E`, keeping its configuration.
    pub fn clear<E: CacheEntity>(&self) -> Result<()> {
        self.clear_table(&E::table())
    }

    pub fn clear_table(&self, table: &Table) -> Result<()> {
        self.table_mut(table)?.clear_entries();
        self.touch();
        info!("Cache for Table [{}] cleared", table);
        Ok(())
    }

    /// Empty every table, keeping their configuration.
    pub fn clear_all_caches(&self) {
        for mut state in self.tables.iter_mut() {
            state.clear_entries();
        }
        self.touch();
        info!("All Caches cleared");
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::Cache;
    use crate::entity::CacheEntity;
    use crate::error::Error;
    use crate::key::{Field, FieldValue, Table};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct Session {
        token: String,
    }

    impl CacheEntity for Session {
        fn table_name() -> &'static str {
            "Session"
        }

        fn field_value(&self, field: &Field) -> Option<FieldValue> {
            match field.as_str() {
                "Token" => Some(self.token.clone().into()),
                _ => None,
            }
        }
    }

    fn session(token: &str) -> Session {
        Session {
            token: token.to_string(),
        }
    }

    fn session_cache() -> Cache {
        let cache = Cache::default();
        cache.activate::<Session>();
        cache.register_key::<Session>("Token").expect("Failed to register key");
        cache
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let cache = session_cache();
        cache
            .register_expiry::<Session>(Duration::from_millis(1))
            .expect("Failed to register expiry");
        cache.add_entry(session("short")).expect("Failed to add");

        cache
            .register_expiry::<Session>(Duration::from_secs(3600))
            .expect("Failed to register expiry");
        cache.add_entry(session("long")).expect("Failed to add");

        std::thread::sleep(Duration::from_millis(10));

        // Expiry is lazy: still readable until swept.
        assert!(cache.get::<Session>("short").is_ok());

        assert_eq!(cache.purge_expired_entries(), 1);
        assert!(cache
            .get::<Session>("short")
            .expect_err("Expected miss")
            .is_not_found());
        assert!(cache.get::<Session>("long").is_ok());
        assert_eq!(cache.count::<Session>(), Ok(1));
    }

    #[test]
    fn test_clear_keeps_configuration() {
        let cache = session_cache();
        cache.add_entry(session("a")).expect("Failed to add");

        cache.clear::<Session>().expect("Failed to clear");

        assert_eq!(cache.count::<Session>(), Ok(0));
        assert!(cache.is_enabled::<Session>());
        assert_eq!(cache.key_field::<Session>(), Some(Field::from("Token")));
        cache.add_entry(session("b")).expect("Failed to add after clear");
    }

    #[test]
    fn test_clear_refreshes_updated_at() {
        let cache = session_cache();
        assert_eq!(cache.updated_at(), None);

        cache.clear::<Session>().expect("Failed to clear");
        let cleared = cache.updated_at().expect("clear must record an update");

        std::thread::sleep(Duration::from_millis(5));
        cache.clear_all_caches();
        let cleared_all = cache.updated_at().expect("clear all must record an update");
        assert!(cleared_all > cleared);
    }

    #[test]
    fn test_clear_unknown_table() {
        let cache = Cache::default();
        assert_eq!(
            cache.clear_table(&Table::from("Nope")),
            Err(Error::CacheDoesNotExist(Table::from("Nope")))
        );
    }

    #[test]
    fn test_clear_all_caches() {
        let cache = session_cache();
        cache.add_entry(session("a")).expect("Failed to add");
        cache.add_entry(session("b")).expect("Failed to add");

        cache.clear_all_caches();

        assert_eq!(cache.count::<Session>(), Ok(0));
        assert_eq!(cache.get_all::<Session>(), Ok(vec![]));
    }
}
