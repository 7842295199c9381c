//! The cache registry and per-table lifecycle.

use crate::config::CacheConfig;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::{Field, Table};
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::table::{erase_hydrator, erase_synchroniser, HydratorFn, SynchroniserFn, TableState};
use chrono::{DateTime, Utc};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::future::Future;
use std::time::Duration;

/// Multi-table in-process cache.
///
/// Each table (one per entity type) carries its own activation state, key
/// field, expiry and optional hydrator/synchroniser. Table states live in a
/// sharded concurrent map, so every operation is an atomic read-modify-write
/// on one table; callbacks run without any table lock held.
///
/// # Example
///
/// ```ignore
/// use dao_cache::Cache;
///
/// let cache = Cache::default();
/// cache.activate::<User>();
/// cache.register_key::<User>("ID")?;
/// cache.add_entry(user)?;
/// let user: User = cache.get::<User>(1)?;
/// ```
pub struct Cache {
    pub(crate) tables: DashMap<Table, TableState>,
    pub(crate) config: CacheConfig,
    pub(crate) metrics: Box<dyn CacheMetrics>,
    created_at: DateTime<Utc>,
    updated_at: RwLock<Option<DateTime<Utc>>>,
}

impl Default for Cache {
    fn default() -> Self {
        Cache::new(CacheConfig::default())
    }
}

impl Cache {
    /// Create an empty cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Cache {
            tables: DashMap::new(),
            config,
            metrics: Box::new(NoOpMetrics),
            created_at: Utc::now(),
            updated_at: RwLock::new(None),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        *self.updated_at.read()
    }

    pub(crate) fn touch(&self) {
        *self.updated_at.write() = Some(Utc::now());
    }

    /// Guard for an existing table, or `CacheDoesNotExist`.
    pub(crate) fn table_mut(&self, table: &Table) -> Result<RefMut<'_, Table, TableState>> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| Error::CacheDoesNotExist(table.clone()))
    }

    /// Guard for an existing, active table.
    fn enabled_table_mut(
        &self,
        table: &Table,
        operation: &str,
    ) -> Result<RefMut<'_, Table, TableState>> {
        match self.tables.get_mut(table) {
            Some(state) if state.active => Ok(state),
            _ => Err(Error::CacheNotEnabled {
                operation: operation.to_string(),
                table: table.clone(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// (Re)initialise the table for `E`, wiping any prior state.
    pub fn activate<E: CacheEntity>(&self) {
        self.activate_table(&E::table());
    }

    pub fn activate_table(&self, table: &Table) {
        info!("Activating Cache for Table [{}]", table);
        self.tables.insert(
            table.clone(),
            TableState::activated(self.config.default_expiry),
        );
        info!("Cache for Table [{}] Activated", table);
    }

    /// Deactivate the table, dropping its entries, indices and key.
    ///
    /// Registered hydrator and synchroniser are kept. An unknown table is
    /// registered as inactive and empty, so it counts as zero afterwards.
    pub fn disable<E: CacheEntity>(&self) {
        self.disable_table(&E::table());
    }

    pub fn disable_table(&self, table: &Table) {
        self.tables
            .entry(table.clone())
            .or_insert_with(|| TableState::activated(self.config.default_expiry))
            .disable();
        info!("Cache for Table [{}] Disabled", table);
    }

    /// Alias of [`Cache::disable`].
    pub fn deinitialise<E: CacheEntity>(&self) {
        self.disable::<E>();
    }

    pub fn is_enabled<E: CacheEntity>(&self) -> bool {
        self.is_table_enabled(&E::table())
    }

    pub fn is_table_enabled(&self, table: &Table) -> bool {
        self.tables.get(table).map_or(false, |state| state.active)
    }

    pub fn is_disabled<E: CacheEntity>(&self) -> bool {
        !self.is_enabled::<E>()
    }

    pub fn is_initialised<E: CacheEntity>(&self) -> bool {
        self.is_enabled::<E>()
    }

    pub fn is_deinitialised<E: CacheEntity>(&self) -> bool {
        self.is_disabled::<E>()
    }

    pub(crate) fn set_active(&self, table: &Table, active: bool) -> Result<()> {
        self.table_mut(table)?.active = active;
        Ok(())
    }

    /// Await a callback future, bounded by `callback_timeout` if configured.
    pub(crate) async fn bounded<T>(
        &self,
        what: impl FnOnce() -> String,
        callback: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.config.callback_timeout {
            Some(limit) => tokio::time::timeout(limit, callback)
                .await
                .map_err(|_| Error::Timeout(format!("{} exceeded {:?}", what(), limit)))?,
            None => callback.await,
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Set the table's single key field.
    ///
    /// Whether records actually expose the field is checked on first add.
    pub fn register_key<E: CacheEntity>(&self, field: impl Into<Field>) -> Result<()> {
        let table = E::table();
        let field = field.into();
        info!("Adding Cache Key [{}] for Table [{}]", field, table);

        let mut state = self.enabled_table_mut(&table, "add key")?;
        state.key = Some(field);
        Ok(())
    }

    pub fn key_field<E: CacheEntity>(&self) -> Option<Field> {
        self.tables
            .get(&E::table())
            .and_then(|state| state.key.clone())
    }

    /// Declare an advisory index field. Duplicates are ignored with a warning.
    pub fn register_index<E: CacheEntity>(&self, field: impl Into<Field>) -> Result<()> {
        let table = E::table();
        let field = field.into();

        let mut state = self.enabled_table_mut(&table, "add index")?;
        if state.indices.contains(&field) {
            warn!("index {} already exists for {}", field, table);
            return Ok(());
        }
        state.indices.push(field);
        Ok(())
    }

    /// Remove an advisory index field. Missing fields are ignored with a warning.
    pub fn remove_index<E: CacheEntity>(&self, field: impl Into<Field>) -> Result<()> {
        let table = E::table();
        let field = field.into();

        let mut state = self.enabled_table_mut(&table, "remove index")?;
        match state.indices.iter().position(|existing| *existing == field) {
            Some(pos) => {
                state.indices.remove(pos);
            }
            None => warn!("index {} does not exist for {}", field, table),
        }
        Ok(())
    }

    pub fn indices<E: CacheEntity>(&self) -> Vec<Field> {
        self.tables
            .get(&E::table())
            .map(|state| state.indices.clone())
            .unwrap_or_default()
    }

    /// Set the expiry applied to entries added from now on.
    pub fn register_expiry<E: CacheEntity>(&self, expiry: Duration) -> Result<()> {
        let table = E::table();
        info!("Setting Cache Expiry for Table [{}] to {:?}", table, expiry);

        let mut state = self.enabled_table_mut(&table, "set expiry")?;
        state.expiry = expiry;
        Ok(())
    }

    pub fn get_expiry<E: CacheEntity>(&self) -> Result<Duration> {
        self.table_expiry(&E::table())
    }

    pub(crate) fn table_expiry(&self, table: &Table) -> Result<Duration> {
        self.enabled_table_mut(table, "get expiry")
            .map(|state| state.expiry)
    }

    /// Register the callback that bulk-loads this table from the backing store.
    ///
    /// Replaces any earlier hydrator.
    pub fn register_hydrator<E, F, Fut>(&self, hydrator: F) -> Result<()>
    where
        E: CacheEntity,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<E>>> + Send + 'static,
    {
        self.install_hydrator(&E::table(), erase_hydrator(hydrator), std::any::type_name::<F>())
    }

    pub(crate) fn install_hydrator(
        &self,
        table: &Table,
        hydrator: HydratorFn,
        name: &str,
    ) -> Result<()> {
        let mut state = self.table_mut(table)?;
        if state.hydrator.replace(hydrator).is_some() {
            warn!("Replacing Hydrator for Table [{}]", table);
        }
        info!("[REGISTER] Registered Function {} as Hydrator for Table [{}]", name, table);
        Ok(())
    }

    /// Register the callback that writes one cached record back to the
    /// backing store. Replaces any earlier synchroniser.
    pub fn register_synchroniser<E, F, Fut>(&self, synchroniser: F) -> Result<()>
    where
        E: CacheEntity,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.install_synchroniser(
            &E::table(),
            erase_synchroniser(synchroniser),
            std::any::type_name::<F>(),
        )
    }

    pub(crate) fn install_synchroniser(
        &self,
        table: &Table,
        synchroniser: SynchroniserFn,
        name: &str,
    ) -> Result<()> {
        let mut state = self.table_mut(table)?;
        if state.synchroniser.replace(synchroniser).is_some() {
            warn!("Replacing Synchroniser for Table [{}]", table);
        }
        info!("[REGISTER] Registered Function {} as Synchroniser for Table [{}]", name, table);
        Ok(())
    }

    /// Tables currently known to the cache, sorted by name.
    pub fn tables(&self) -> Vec<Table> {
        self.tables_with(|_| true)
    }

    pub(crate) fn tables_with(&self, predicate: impl Fn(&TableState) -> bool) -> Vec<Table> {
        let mut tables: Vec<Table> = self
            .tables
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();
        tables.sort();
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::FieldValue;

    #[derive(Clone, Debug, PartialEq)]
    struct User {
        id: u32,
    }

    impl CacheEntity for User {
        fn table_name() -> &'static str {
            "User"
        }

        fn field_value(&self, field: &Field) -> Option<FieldValue> {
            match field.as_str() {
                "ID" => Some(self.id.into()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_unknown_table_reports_disabled() {
        let cache = Cache::default();
        assert!(!cache.is_enabled::<User>());
        assert!(cache.is_disabled::<User>());
        assert!(!cache.is_initialised::<User>());
        assert!(cache.is_deinitialised::<User>());
    }

    #[test]
    fn test_activate_and_disable() {
        let cache = Cache::default();
        cache.activate::<User>();
        assert!(cache.is_enabled::<User>());
        assert!(cache.is_initialised::<User>());

        cache.deinitialise::<User>();
        assert!(cache.is_disabled::<User>());
        assert_eq!(cache.tables(), vec![Table::from("User")]);
    }

    #[test]
    fn test_disable_unknown_table_registers_it_inactive() {
        let cache = Cache::default();
        assert_eq!(
            cache.count::<User>(),
            Err(Error::CacheDoesNotExist(Table::from("User")))
        );

        cache.disable::<User>();

        assert!(cache.is_disabled::<User>());
        assert_eq!(cache.count::<User>(), Ok(0));
        assert_eq!(cache.tables(), vec![Table::from("User")]);
        assert!(matches!(
            cache.get::<User>(1u32),
            Err(Error::CacheNotEnabled { .. })
        ));
    }

    #[test]
    fn test_register_key_requires_active_table() {
        let cache = Cache::default();
        assert!(matches!(
            cache.register_key::<User>("ID"),
            Err(Error::CacheNotEnabled { .. })
        ));

        cache.activate::<User>();
        cache.register_key::<User>("ID").expect("Failed to register key");
        assert_eq!(cache.key_field::<User>(), Some(Field::from("ID")));
    }

    #[test]
    fn test_reactivate_wipes_state() {
        let cache = Cache::default();
        cache.activate::<User>();
        cache.register_key::<User>("ID").expect("Failed to register key");
        cache.register_index::<User>("Name").expect("Failed to register index");

        cache.activate::<User>();
        assert_eq!(cache.key_field::<User>(), None);
        assert!(cache.indices::<User>().is_empty());
    }

    #[test]
    fn test_index_registration() {
        let cache = Cache::default();
        cache.activate::<User>();

        cache.register_index::<User>("Name").expect("Failed to register index");
        cache.register_index::<User>("Name").expect("Duplicate must be a no-op");
        cache.register_index::<User>("Email").expect("Failed to register index");
        assert_eq!(
            cache.indices::<User>(),
            vec![Field::from("Name"), Field::from("Email")]
        );

        cache.remove_index::<User>("Name").expect("Failed to remove index");
        cache.remove_index::<User>("Missing").expect("Missing must be a no-op");
        assert_eq!(cache.indices::<User>(), vec![Field::from("Email")]);

        cache.disable::<User>();
        assert!(matches!(
            cache.register_index::<User>("Name"),
            Err(Error::CacheNotEnabled { .. })
        ));
    }

    #[test]
    fn test_expiry_registration() {
        let cache = Cache::new(CacheConfig::default().with_default_expiry(Duration::from_secs(10)));
        assert!(matches!(
            cache.get_expiry::<User>(),
            Err(Error::CacheNotEnabled { .. })
        ));

        cache.activate::<User>();
        assert_eq!(cache.get_expiry::<User>(), Ok(Duration::from_secs(10)));

        cache
            .register_expiry::<User>(Duration::from_secs(60))
            .expect("Failed to register expiry");
        assert_eq!(cache.get_expiry::<User>(), Ok(Duration::from_secs(60)));
    }

    #[test]
    fn test_callback_registration_requires_known_table() {
        let cache = Cache::default();
        let result = cache.register_hydrator(|| async { Ok(Vec::<User>::new()) });
        assert_eq!(result, Err(Error::CacheDoesNotExist(Table::from("User"))));

        cache.activate::<User>();
        cache
            .register_hydrator(|| async { Ok(Vec::<User>::new()) })
            .expect("Failed to register hydrator");
        cache
            .register_synchroniser(|_user: User| async { Ok(()) })
            .expect("Failed to register synchroniser");

        cache.disable::<User>();
        let state = cache.tables.get(&User::table()).expect("table state");
        assert!(state.hydrator.is_some());
        assert!(state.synchroniser.is_some());
    }

    #[test]
    fn test_updated_at_starts_empty() {
        let cache = Cache::default();
        assert_eq!(cache.updated_at(), None);
        assert!(cache.created_at() <= Utc::now());
    }
}
