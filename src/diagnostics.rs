//! Stats and human-readable reports of cache state.

use crate::cache::Cache;
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::Table;
use crate::observability::CacheStats;
use std::fmt::Write;

impl Cache {
    /// Creation/update timestamps plus table and live entry counts.
    pub fn stats(&self) -> CacheStats {
        let mut table_count = 0;
        let mut entry_count = 0;
        for state in self.tables.iter() {
            table_count += 1;
            entry_count += state.entries.len();
        }

        CacheStats {
            created_at: self.created_at(),
            updated_at: self.updated_at(),
            table_count,
            entry_count,
        }
    }

    /// [`Cache::stats`] rendered as JSON.
    pub fn stats_json(&self) -> Result<String> {
        serde_json::to_string(&self.stats())
            .map_err(|e| Error::ConfigError(format!("Failed to render cache stats: {}", e)))
    }

    /// Report for the whole cache: timestamps, tables, key fields and every
    /// entry with its expiry.
    pub fn dump(&self) -> String {
        let stats = self.stats();
        let tables = self.tables();
        let mut out = String::new();

        let _ = writeln!(out, "Cache created at: {}", stats.created_at.to_rfc3339());
        match stats.updated_at {
            Some(updated) => {
                let _ = writeln!(out, "Cache updated at: {}", updated.to_rfc3339());
            }
            None => {
                let _ = writeln!(out, "Cache updated at: never");
            }
        }

        if tables.is_empty() {
            let _ = writeln!(out, "No tables are currently cached");
            return out;
        }

        let names: Vec<&str> = tables.iter().map(Table::as_str).collect();
        let _ = writeln!(out, ". Cached Tables: {}", names.join(" "));

        let _ = writeln!(out, ". Cached Keys Summary");
        for table in &tables {
            if let Some(state) = self.tables.get(table) {
                let key = state.key.as_ref().map_or("<unknown-key>", |k| k.as_str());
                let _ = writeln!(out, ".\tTable [{}] has Key Field [{}]", table, key);
            }
        }

        let _ = writeln!(out, ". Cached Records Summary");
        for table in &tables {
            out.push_str(&self.dump_table(table));
        }

        let _ = writeln!(
            out,
            "Cache Stats - Tables: {}, Entries: {}",
            stats.table_count, stats.entry_count
        );
        out
    }

    /// Report for the table of `E`.
    pub fn dump_for<E: CacheEntity>(&self) -> String {
        self.dump_table(&E::table())
    }

    /// Report for one table, in key order.
    pub fn dump_table(&self, table: &Table) -> String {
        let mut out = String::new();
        let state = match self.tables.get(table) {
            Some(state) => state,
            None => {
                let _ = writeln!(out, ".\tTable [{}] is not currently cached", table);
                return out;
            }
        };

        let status = if state.active { "active" } else { "disabled" };
        let _ = writeln!(
            out,
            ".\tTable [{}] ({}) has [{}] cached records and expiry set to [{:?}]",
            table,
            status,
            state.entries.len(),
            state.expiry
        );

        let key_field = state.key.as_ref().map_or("<unknown-key>", |k| k.as_str());
        let mut entries: Vec<(String, String)> = state
            .entries
            .iter()
            .map(|(key, entry)| (key.to_string(), entry.expires_at.to_rfc3339()))
            .collect();
        entries.sort();
        for (key, expires) in entries {
            let _ = writeln!(
                out,
                ".\t\t{}>{}: {} - expires: {}",
                table, key_field, key, expires
            );
        }
        out
    }

    /// Emit [`Cache::dump`] through the logger.
    pub fn log_report(&self) {
        info!("Cache Report - Start");
        for line in self.dump().lines() {
            info!("{}", line);
        }
        info!("Cache Report - End");
    }
}
