use futures_util::TryStreamExt;
use moka::future::Cache;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, info};

use super::{Entity, StoreError, Table};

#[derive(FromRow)]
struct EntityRow {
    partition_key: String,
    row_key: String,
    properties: String,
}

impl From<EntityRow> for Entity<String> {
    fn from(row: EntityRow) -> Self {
        Entity {
            partition_key: row.partition_key,
            row_key: row.row_key,
            value: row.properties,
        }
    }
}

/// MySQL-backed table store: one SQL table per logical table, created on
/// first use.
#[derive(Clone)]
pub struct MySqlTables {
    pool: MySqlPool,
    /// true => CREATE TABLE already ran in this process
    initialized: Cache<&'static str, bool>,
}

impl MySqlTables {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            initialized: Cache::builder().max_capacity(64).build(),
        }
    }

    async fn ensure_table(&self, table: Table) -> Result<(), StoreError> {
        if self.initialized.get(&table.name()).await.unwrap_or(false) {
            return Ok(());
        }

        // binary collation keeps key ordering ordinal, matching range scans
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS `{}` (
                partition_key VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
                row_key VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
                properties LONGTEXT NOT NULL,
                updated_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6),
                PRIMARY KEY (partition_key, row_key)
            )
            "#,
            table.name()
        );
        sqlx::query(&ddl).execute(&self.pool).await?;

        info!(table = %table, "Table provisioned");
        self.initialized.insert(table.name(), true).await;
        Ok(())
    }

    pub async fn upsert(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
        properties: String,
    ) -> Result<(), StoreError> {
        self.ensure_table(table).await?;

        let sql = format!(
            r#"
            INSERT INTO `{}` (partition_key, row_key, properties)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE properties = VALUES(properties)
            "#,
            table.name()
        );
        sqlx::query(&sql)
            .bind(partition_key)
            .bind(row_key)
            .bind(properties)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<String>, StoreError> {
        self.ensure_table(table).await?;

        let sql = format!(
            "SELECT properties FROM `{}` WHERE partition_key = ? AND row_key = ?",
            table.name()
        );
        let properties = sqlx::query_scalar::<_, String>(&sql)
            .bind(partition_key)
            .bind(row_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(properties)
    }

    pub async fn query_partition(
        &self,
        table: Table,
        partition_key: &str,
    ) -> Result<Vec<Entity<String>>, StoreError> {
        self.ensure_table(table).await?;

        let sql = format!(
            r#"
            SELECT partition_key, row_key, properties
            FROM `{}`
            WHERE partition_key = ?
            ORDER BY row_key
            "#,
            table.name()
        );
        debug!(table = %table, partition_key, "Querying partition");

        let rows: Vec<EntityRow> = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(partition_key)
            .fetch(&self.pool)
            .try_collect()
            .await?;
        Ok(rows.into_iter().map(Entity::from).collect())
    }

    pub async fn query_partition_range(
        &self,
        table: Table,
        from: &str,
        to: &str,
    ) -> Result<Vec<Entity<String>>, StoreError> {
        self.ensure_table(table).await?;

        let sql = format!(
            r#"
            SELECT partition_key, row_key, properties
            FROM `{}`
            WHERE partition_key >= ? AND partition_key < ?
            ORDER BY partition_key, row_key
            "#,
            table.name()
        );
        debug!(table = %table, from, to, "Querying partition range");

        let rows: Vec<EntityRow> = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(from)
            .bind(to)
            .fetch(&self.pool)
            .try_collect()
            .await?;
        Ok(rows.into_iter().map(Entity::from).collect())
    }

    pub async fn delete(
        &self,
        table: Table,
        partition_key: &str,
        row_key: &str,
    ) -> Result<bool, StoreError> {
        self.ensure_table(table).await?;

        let sql = format!(
            "DELETE FROM `{}` WHERE partition_key = ? AND row_key = ?",
            table.name()
        );
        let result = sqlx::query(&sql)
            .bind(partition_key)
            .bind(row_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
