use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock};

use super::{Entity, StoreError, Table};

type Key = (&'static str, String, String);

/// In-process table store. Keys sort exactly like the SQL backend's binary
/// collation, so range queries behave the same.
#[derive(Clone, Default)]
pub struct MemoryTables {
    rows: Arc<RwLock<BTreeMap<Key, String>>>,
    read_only: Arc<RwLock<HashSet<&'static str>>>,
}

impl MemoryTables {
    /// Makes writes to `table` fail until switched back, so partial writes
    /// can be reproduced without a database.
    pub fn set_read_only(&self, table: Table, read_only: bool) {
        let mut tables = self.read_only.write().unwrap_or_else(PoisonError::into_inner);
        if read_only {
            tables.insert(table.name());
        } else {
            tables.remove(table.name());
        }
    }

    fn check_writable(&self, table: Table) -> Result<(), StoreError> {
        let tables = self.read_only.read().unwrap_or_else(PoisonError::into_inner);
        if tables.contains(table.name()) {
            Err(StoreError::ReadOnly(table.name()))
        } else {
            Ok(())
        }
    }

    pub fn upsert(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
        properties: String,
    ) -> Result<(), StoreError> {
        self.check_writable(table)?;
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (table.name(), partition_key.to_string(), row_key.to_string()),
                properties,
            );
        Ok(())
    }

    pub fn get(&self, table: Table, partition_key: &str, row_key: &str) -> Option<String> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(table.name(), partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    pub fn query_partition(&self, table: Table, partition_key: &str) -> Vec<Entity<String>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let start = (table.name(), partition_key.to_string(), String::new());

        rows.range(start..)
            .take_while(|((t, pk, _), _)| *t == table.name() && pk == partition_key)
            .map(to_entity)
            .collect()
    }

    pub fn query_partition_range(&self, table: Table, from: &str, to: &str) -> Vec<Entity<String>> {
        if from >= to {
            return Vec::new();
        }
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let start = (table.name(), from.to_string(), String::new());
        // the empty row key is the smallest key of partition `to`
        let end = (table.name(), to.to_string(), String::new());

        rows.range((Bound::Included(start), Bound::Excluded(end)))
            .map(to_entity)
            .collect()
    }

    pub fn delete(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
    ) -> Result<bool, StoreError> {
        self.check_writable(table)?;
        Ok(self
            .rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(table.name(), partition_key.to_string(), row_key.to_string()))
            .is_some())
    }
}

fn to_entity(((_, pk, rk), value): (&Key, &String)) -> Entity<String> {
    Entity {
        partition_key: pk.clone(),
        row_key: rk.clone(),
        value: value.clone(),
    }
}
