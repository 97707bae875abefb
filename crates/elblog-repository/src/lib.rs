//! SQLite-backed store for parsed access-log rows.

pub mod record;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, warn};

pub use record::{Column, ColumnType, ColumnTypeMismatch, ColumnValue, LogRecord};

pub const TABLE_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one [`LogStore::insert_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub inserted: usize,
    pub duplicates: usize,
    /// The single-transaction insert hit a key conflict and rows were retried
    /// one at a time.
    pub fell_back: bool,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Creates the `logs` table if it does not already exist.
    async fn initialize(&self) -> Result<(), RepositoryError>;

    /// Inserts all records in one transaction. When that transaction fails on
    /// a duplicate `id`, it is rolled back and every record is retried in its
    /// own transaction; duplicates are skipped with a warning.
    async fn insert_batch(&self, records: &[LogRecord]) -> Result<InsertReport, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    insert_sql: String,
}

impl SqliteRepository {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        ensure_parent_dir(options.get_filename())?;

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// A private in-memory database. The pool holds exactly one connection
    /// that is never recycled, since the data lives only as long as it does.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            insert_sql: insert_statement(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn fetch_by_id(&self, id: i64) -> Result<Option<LogRecord>, RepositoryError> {
        let sql = format!("SELECT {} FROM {TABLE_NAME} WHERE id = ?", column_list());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(LogRecord {
            id: row.try_get("id")?,
            timestamp: row.try_get("t")?,
            client_ip: row.try_get("client_ip")?,
            backend_ip: row.try_get("backend_ip")?,
            status: row.try_get("status")?,
            backend_status: row.try_get("bstatus")?,
            request_url: row.try_get("request_url")?,
            redirect_url: row.try_get("redirect_url")?,
            user_agent: row.try_get("user_agent")?,
            country_code: row.try_get("country_code")?,
            browser_family: row.try_get("browser_family")?,
            browser_major: row.try_get("browser_major")?,
            device_brand: row.try_get("device_brand")?,
            device_family: row.try_get("device_family")?,
            device_model: row.try_get("device_model")?,
            os_family: row.try_get("os_family")?,
            os_major: row.try_get("os_major")?,
        }))
    }

    async fn insert_all(&self, records: &[LogRecord]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            bind_record(sqlx::query(&self.insert_sql), record)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }

    async fn insert_one(&self, record: &LogRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        bind_record(sqlx::query(&self.insert_sql), record)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn insert_each(&self, records: &[LogRecord]) -> Result<InsertReport, RepositoryError> {
        let mut report = InsertReport {
            fell_back: true,
            ..InsertReport::default()
        };

        for record in records {
            match self.insert_one(record).await {
                Ok(()) => report.inserted += 1,
                Err(err) if is_unique_violation(&err) => {
                    warn!(id = record.id, timestamp = %record.timestamp, "duplicate row skipped");
                    report.duplicates += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl LogStore for SqliteRepository {
    async fn initialize(&self) -> Result<(), RepositoryError> {
        sqlx::query(&create_table_statement())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_batch(&self, records: &[LogRecord]) -> Result<InsertReport, RepositoryError> {
        if records.is_empty() {
            return Ok(InsertReport::default());
        }

        match self.insert_all(records).await {
            Ok(()) => {
                debug!(rows = records.len(), "batch insert committed");
                Ok(InsertReport {
                    inserted: records.len(),
                    ..InsertReport::default()
                })
            }
            Err(err) if is_unique_violation(&err) => {
                warn!(error = %err, rows = records.len(), "batch insert conflicted, retrying row by row");
                self.insert_each(records).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub fn create_table_statement() -> String {
    let columns: Vec<String> = Column::ALL
        .iter()
        .map(|column| match column {
            Column::Id => format!("    {} {} PRIMARY KEY", column.name(), column.column_type().sql_type()),
            other => format!("    {} {}", other.name(), other.column_type().sql_type()),
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE_NAME}(\n{}\n)",
        columns.join(",\n")
    )
}

fn insert_statement() -> String {
    let placeholders = vec!["?"; Column::ALL.len()].join(", ");
    format!(
        "INSERT INTO {TABLE_NAME} ({}) VALUES ({placeholders})",
        column_list()
    )
}

fn column_list() -> String {
    Column::ALL
        .iter()
        .map(Column::name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn bind_record<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    record: &LogRecord,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for column in Column::ALL {
        query = match record.value(column) {
            ColumnValue::Integer(v) => query.bind(v),
            ColumnValue::DateTime(v) => query.bind(v),
            ColumnValue::Text(v) => query.bind(v),
        };
    }
    query
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

fn ensure_parent_dir(filename: &Path) -> Result<(), std::io::Error> {
    if filename.as_os_str() == ":memory:" {
        return Ok(());
    }
    match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
