pub mod models;
pub mod schema;

use std::{str::FromStr, time::Duration};

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool,
};
use thiserror::Error;
use tracing::debug;

use self::models::{Averages, Credential, Measurement, Reading, ReadingRow, Source, TIMESTAMP_FORMAT};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("username {0:?} is already registered")]
    DuplicateUsername(String),

    #[error("stored timestamp is malformed: {0:?}")]
    Timestamp(String),

    #[error("table {table} has an older layout, missing columns: {missing}")]
    IncompatibleSchema { table: &'static str, missing: String },
}

/// Opens (creating if needed) the SQLite file behind `database_url`.
///
/// Other processes write to the same file, so a busy timeout lets the storage
/// engine serialize writers instead of failing immediately.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Deletes the `n` oldest rows (smallest timestamp, then smallest id) of
/// `source`'s table and returns how many were removed.
///
/// Takes any executor so the sweeper can run it inside its own transaction.
pub async fn delete_oldest<'e, E>(executor: E, source: Source, n: u32) -> Result<u64, StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "DELETE FROM {table} WHERE id IN (
            SELECT id FROM {table} ORDER BY timestamp ASC, id ASC LIMIT ?
        )",
        table = source.table()
    );
    let result = sqlx::query(&sql).bind(i64::from(n)).execute(executor).await?;
    Ok(result.rows_affected())
}

/// Persistence layer shared by the ingesters, the sweeper and the API.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // CREATE IF NOT EXISTS keeps a table of the wrong shape; fail here
        // rather than on every insert.
        for (table, columns) in schema::required_columns() {
            let existing: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info(?)")
                .bind(table)
                .fetch_all(&mut *tx)
                .await?;
            if existing.is_empty() {
                continue;
            }
            let missing: Vec<&str> = columns
                .iter()
                .copied()
                .filter(|column| !existing.iter().any(|(name,)| name == column))
                .collect();
            if !missing.is_empty() {
                return Err(StoreError::IncompatibleSchema {
                    table,
                    missing: missing.join(", "),
                });
            }
        }

        sqlx::query(schema::AVERAGE_TABLE).execute(&mut *tx).await?;
        sqlx::query(schema::USERS_TABLE).execute(&mut *tx).await?;

        for source in Source::ALL {
            sqlx::query(&schema::reading_table(source)).execute(&mut *tx).await?;
            sqlx::query(&schema::timestamp_index(source)).execute(&mut *tx).await?;
            sqlx::query(&schema::average_trigger(source)).execute(&mut *tx).await?;
            debug!(table = source.table(), "Reading table ready");
        }

        tx.commit().await?;
        Ok(())
    }

    /// Appends `measurement` stamped with the current local time.
    pub async fn insert_reading(
        &self,
        source: Source,
        measurement: &Measurement,
    ) -> Result<Reading, StoreError> {
        self.insert_reading_at(source, measurement, Local::now().naive_local())
            .await
    }

    /// Appends `measurement` with an explicit capture time. The snapshot
    /// trigger fires inside the same transaction.
    pub async fn insert_reading_at(
        &self,
        source: Source,
        measurement: &Measurement,
        timestamp: NaiveDateTime,
    ) -> Result<Reading, StoreError> {
        let sql = format!(
            "INSERT INTO {} (timestamp, humidity, temperature, light_level)
             VALUES (?, ?, ?, ?)
             RETURNING id, timestamp, humidity, temperature, light_level",
            source.table()
        );

        let mut tx = self.pool.begin().await?;
        let row: ReadingRow = sqlx::query_as(&sql)
            .bind(timestamp.format(TIMESTAMP_FORMAT).to_string())
            .bind(measurement.humidity)
            .bind(measurement.temperature)
            .bind(measurement.light_level)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Reading::try_from(row)
    }

    /// Most recently inserted reading (highest id).
    pub async fn latest(&self, source: Source) -> Result<Option<Reading>, StoreError> {
        let sql = format!(
            "SELECT id, timestamp, humidity, temperature, light_level
             FROM {} ORDER BY id DESC LIMIT 1",
            source.table()
        );
        let row: Option<ReadingRow> = sqlx::query_as(&sql).fetch_optional(&self.pool).await?;
        row.map(Reading::try_from).transpose()
    }

    /// Every reading of `source` in insertion order.
    pub async fn all_readings(&self, source: Source) -> Result<Vec<Reading>, StoreError> {
        let sql = format!(
            "SELECT id, timestamp, humidity, temperature, light_level
             FROM {} ORDER BY id ASC",
            source.table()
        );
        let rows: Vec<ReadingRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Reading::try_from).collect()
    }

    pub async fn count(&self, source: Source) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", source.table());
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Trigger-maintained means, as of the last insert into `source`.
    pub async fn snapshot(&self, source: Source) -> Result<Option<Averages>, StoreError> {
        let snapshot = sqlx::query_as(
            "SELECT average_humidity, average_temperature, average_light_level
             FROM average_data WHERE source = ?",
        )
        .bind(source.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(snapshot)
    }

    pub async fn delete_oldest(&self, source: Source, n: u32) -> Result<u64, StoreError> {
        delete_oldest(&self.pool, source, n).await
    }

    pub async fn insert_credential(
        &self,
        username: &str,
        digest: &str,
    ) -> Result<Credential, StoreError> {
        let result = sqlx::query_as(
            "INSERT INTO users (username, password) VALUES (?, ?)
             RETURNING id, username, password",
        )
        .bind(username)
        .bind(digest)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(credential) => Ok(credential),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUsername(username.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let credential = sqlx::query_as("SELECT id, username, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(credential)
    }
}

impl TryFrom<ReadingRow> for Reading {
    type Error = StoreError;

    fn try_from(row: ReadingRow) -> Result<Self, Self::Error> {
        let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| StoreError::Timestamp(row.timestamp.clone()))?;
        Ok(Self {
            id: row.id,
            timestamp,
            humidity: row.humidity,
            temperature: row.temperature,
            light_level: row.light_level,
        })
    }
}

/// Single-connection in-memory database with the schema applied.
///
/// Every `sqlite::memory:` connection is its own database, so the pool must
/// never open a second one.
#[cfg(test)]
pub(crate) async fn test_store() -> Store {
    let store = Store::new(memory_pool().await);
    store.create_schema().await.unwrap();
    store
}

#[cfg(test)]
async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

/// URL of a database file inside `dir`, for tests that need more than one
/// connection to the same data.
#[cfg(test)]
pub(crate) fn file_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}", dir.path().join("sensor_data.db").display())
}

#[cfg(test)]
pub(crate) async fn file_store(dir: &tempfile::TempDir) -> Store {
    let store = Store::new(create_pool(&file_url(dir)).await.unwrap());
    store.create_schema().await.unwrap();
    store
}
