use anyhow::Result;
use driftwatch_core::{ActionRecord, Allocation, MonitoringConfig};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// `SQLite` database mirroring monitoring configs, targets, and the action
/// log.
///
/// Rows store the serialized document plus the columns needed for lookup
/// and ordering. Uses connection pooling for concurrent access across
/// wallet tasks.
#[derive(Clone)]
pub struct MonitorDatabase {
    pool: SqlitePool,
}

impl MonitorDatabase {
    /// Creates a new database connection pool and runs migrations.
    ///
    /// # Arguments
    ///
    /// * `database_url` - `SQLite` database path (e.g., `sqlite://data/driftwatch.db`)
    ///
    /// # Errors
    ///
    /// Returns error if connection fails or migrations fail.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns error if connection fails.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self> {
        // One connection only: every in-memory SQLite connection is its own
        // database, so a larger pool would scatter tables.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Inserts or updates a wallet's monitoring configuration.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the database operation fails.
    pub async fn upsert_config(&self, config: &MonitoringConfig) -> Result<()> {
        let config_json = serde_json::to_string(config)?;
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r"
            INSERT INTO wallet_configs (wallet_address, config_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(wallet_address) DO UPDATE SET
                config_json = excluded.config_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&config.wallet_address)
        .bind(config_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes a wallet's configuration and target.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails.
    pub async fn delete_wallet(&self, wallet: &str) -> Result<()> {
        sqlx::query("DELETE FROM wallet_targets WHERE wallet_address = ?1")
            .bind(wallet)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM wallet_configs WHERE wallet_address = ?1")
            .bind(wallet)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Loads all persisted monitoring configurations.
    ///
    /// # Errors
    ///
    /// Returns error if the query or deserialization fails.
    pub async fn load_configs(&self) -> Result<Vec<MonitoringConfig>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT config_json FROM wallet_configs ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut configs = Vec::new();
        for (config_json,) in rows {
            let config: MonitoringConfig = serde_json::from_str(&config_json)?;
            configs.push(config);
        }

        Ok(configs)
    }

    /// Inserts or updates a wallet's target allocation.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the database operation fails.
    pub async fn upsert_target(&self, wallet: &str, target: &Allocation) -> Result<()> {
        let target_json = serde_json::to_string(target)?;
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r"
            INSERT INTO wallet_targets (wallet_address, target_json, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(wallet_address) DO UPDATE SET
                target_json = excluded.target_json,
                updated_at = excluded.updated_at
            ",
        )
        .bind(wallet)
        .bind(target_json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Loads all persisted target allocations.
    ///
    /// # Errors
    ///
    /// Returns error if the query or deserialization fails.
    pub async fn load_targets(&self) -> Result<Vec<(String, Allocation)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT wallet_address, target_json FROM wallet_targets",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut targets = Vec::new();
        for (wallet, target_json) in rows {
            let target: Allocation = serde_json::from_str(&target_json)?;
            targets.push((wallet, target));
        }

        Ok(targets)
    }

    /// Appends one action record. Records are never updated.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the database operation fails.
    pub async fn insert_action(&self, record: &ActionRecord) -> Result<()> {
        let record_json = serde_json::to_string(record)?;

        sqlx::query(
            r"
            INSERT INTO action_records
                (action_id, wallet_address, action_type, record_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&record.action_id)
        .bind(&record.wallet_address)
        .bind(record.action_type.as_str())
        .bind(record_json)
        .bind(record.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent action records for a wallet, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the query or deserialization fails.
    pub async fn recent_actions(&self, wallet: &str, limit: u32) -> Result<Vec<ActionRecord>> {
        let rows = sqlx::query_as::<_, (String,)>(
            r"
            SELECT record_json FROM action_records
            WHERE wallet_address = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            ",
        )
        .bind(wallet)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::new();
        for (record_json,) in rows {
            let record: ActionRecord = serde_json::from_str(&record_json)?;
            records.push(record);
        }

        Ok(records)
    }

    /// Counts of (all actions, executed actions) recorded since `since`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn action_counts_since(
        &self,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<(u64, u64)> {
        let (total, executed) = sqlx::query_as::<_, (i64, i64)>(
            r"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN action_type = 'execute' THEN 1 ELSE 0 END), 0)
            FROM action_records
            WHERE created_at >= ?1
            ",
        )
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        Ok((
            u64::try_from(total).unwrap_or(0),
            u64::try_from(executed).unwrap_or(0),
        ))
    }
}
