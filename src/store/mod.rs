//! Partition-key / row-key table storage.
//!
//! Every logical table holds JSON entities addressed by `(partition_key,
//! row_key)`. Keys compare ordinally (byte order), so a partition-key range
//! `[from, to)` selects a contiguous slice of partitions. Writes are full
//! replacements; there is no merge.

mod memory;
mod mysql;

pub use memory::MemoryTables;
pub use mysql::MySqlTables;

use serde::{Serialize, de::DeserializeOwned};
use strum_macros::{Display, IntoStaticStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Table {
    Students,
    AttendanceByDate,
    AttendanceByStudent,
}

impl Table {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("entity serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid key `{0}`")]
    InvalidKey(String),

    #[error("table {0} is read-only")]
    ReadOnly(&'static str),
}

#[derive(Debug, Clone)]
pub struct Entity<T> {
    pub partition_key: String,
    pub row_key: String,
    pub value: T,
}

/// Longest partition or row key, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Characters that may not appear in a partition or row key.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control());
    if bad {
        Err(StoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Clone)]
pub enum TableStore {
    MySql(MySqlTables),
    Memory(MemoryTables),
}

impl TableStore {
    /// Insert or fully replace the entity at `(pk, rk)`.
    pub async fn upsert<T: Serialize>(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        validate_key(partition_key)?;
        validate_key(row_key)?;
        let properties = serde_json::to_string(value)?;
        match self {
            TableStore::MySql(t) => t.upsert(table, partition_key, row_key, properties).await,
            TableStore::Memory(t) => t.upsert(table, partition_key, row_key, properties),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<T>, StoreError> {
        if validate_key(partition_key).is_err() || validate_key(row_key).is_err() {
            return Ok(None);
        }
        let raw = match self {
            TableStore::MySql(t) => t.get(table, partition_key, row_key).await?,
            TableStore::Memory(t) => t.get(table, partition_key, row_key),
        };
        raw.map(|p| serde_json::from_str(&p).map_err(StoreError::from))
            .transpose()
    }

    /// All entities of one partition, ordered by row key.
    pub async fn query_partition<T: DeserializeOwned>(
        &self,
        table: Table,
        partition_key: &str,
    ) -> Result<Vec<Entity<T>>, StoreError> {
        if validate_key(partition_key).is_err() {
            return Ok(Vec::new());
        }
        let raw = match self {
            TableStore::MySql(t) => t.query_partition(table, partition_key).await?,
            TableStore::Memory(t) => t.query_partition(table, partition_key),
        };
        decode_all(raw)
    }

    /// Entities whose partition key lies in `[from, to)`, ordered by key.
    pub async fn query_partition_range<T: DeserializeOwned>(
        &self,
        table: Table,
        from: &str,
        to: &str,
    ) -> Result<Vec<Entity<T>>, StoreError> {
        let raw = match self {
            TableStore::MySql(t) => t.query_partition_range(table, from, to).await?,
            TableStore::Memory(t) => t.query_partition_range(table, from, to),
        };
        decode_all(raw)
    }

    /// Returns whether an entity was removed.
    pub async fn delete(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
    ) -> Result<bool, StoreError> {
        match self {
            TableStore::MySql(t) => t.delete(table, partition_key, row_key).await,
            TableStore::Memory(t) => t.delete(table, partition_key, row_key),
        }
    }
}

fn decode_all<T: DeserializeOwned>(raw: Vec<Entity<String>>) -> Result<Vec<Entity<T>>, StoreError> {
    raw.into_iter()
        .map(|e| -> Result<Entity<T>, StoreError> {
            Ok(Entity {
                value: serde_json::from_str(&e.value)?,
                partition_key: e.partition_key,
                row_key: e.row_key,
            })
        })
        .collect()
}
