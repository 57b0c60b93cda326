//! SQLite-backed job store.
//!
//! All synchronization between workers is delegated to the database: the
//! claim is a single `UPDATE ... WHERE id IN (SELECT ...) RETURNING` run in
//! one transaction, so concurrent claimants (same or different process
//! sharing the file) never select the same row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::instrument;

use mailspool_core::{EmailMessage, Job, JobId, JobStatus};

use super::store::{JobStore, JobStoreError};

const MIGRATE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS email_jobs (
    id TEXT PRIMARY KEY,
    to_addr TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    created_at TEXT NOT NULL,
    sent_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_email_jobs_status
ON email_jobs(status);
"#;

/// SQLite-backed job store.
///
/// Thread-safe: the sqlx pool is `Send + Sync` and every mutation is a single
/// statement or a single transaction.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (or create) the database at `url` and run the schema migration.
    pub async fn connect(url: &str) -> Result<Self, JobStoreError> {
        let pool = SqlitePoolOptions::new()
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool, running the schema migration first.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, JobStoreError> {
        sqlx::query(MIGRATE_SQL)
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, message), err)]
    async fn create(&self, message: EmailMessage) -> Result<JobId, JobStoreError> {
        let job = Job::new(message);

        sqlx::query(
            r#"
            INSERT INTO email_jobs
            (id, to_addr, subject, body, status, attempts, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.to)
        .bind(&job.subject)
        .bind(&job.body)
        .bind(job.status.as_str())
        .bind(job.attempts as i64)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create", e))?;

        Ok(job.id)
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: JobId) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, to_addr, subject, body, status, attempts,
                   error_message, created_at, sent_at
            FROM email_jobs
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| job_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn claim_batch(&self, limit: u32) -> Result<Vec<Job>, JobStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("claim_batch", e))?;

        // Atomically select-and-mark; a separate select-then-update would
        // reintroduce the double-claim race.
        let rows = sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = ?
            WHERE id IN (
                SELECT id FROM email_jobs
                WHERE status = ?
                ORDER BY created_at ASC
                LIMIT ?
            )
            RETURNING id, to_addr, subject, body, status, attempts,
                      error_message, created_at, sent_at
            "#,
        )
        .bind(JobStatus::Processing.as_str())
        .bind(JobStatus::Pending.as_str())
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_batch", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("claim_batch", e))?;

        let mut jobs = rows
            .iter()
            .map(job_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        // RETURNING does not guarantee row order; re-establish oldest-first.
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    #[instrument(skip(self), err)]
    async fn mark_sent(&self, id: JobId) -> Result<(), JobStoreError> {
        let res = sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = ?, sent_at = COALESCE(sent_at, ?)
            WHERE id = ?
            "#,
        )
        .bind(JobStatus::Sent.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_sent", e))?;

        if res.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn increment_attempts(&self, id: JobId) -> Result<(), JobStoreError> {
        let res = sqlx::query(
            r#"
            UPDATE email_jobs
            SET attempts = attempts + 1
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("increment_attempts", e))?;

        if res.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, error_message), err)]
    async fn mark_failed(&self, id: JobId, error_message: &str) -> Result<(), JobStoreError> {
        let res = sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error_message)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_failed", e))?;

        if res.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }
}

fn job_from_row(row: &SqliteRow) -> Result<Job, JobStoreError> {
    let id: String = read_column(row, "id")?;
    let status: String = read_column(row, "status")?;
    let attempts: i64 = read_column(row, "attempts")?;
    let created_at: DateTime<Utc> = read_column(row, "created_at")?;
    let sent_at: Option<DateTime<Utc>> = read_column(row, "sent_at")?;

    Ok(Job {
        id: id
            .parse()
            .map_err(|e| JobStoreError::Storage(format!("malformed job id {id:?}: {e}")))?,
        to: read_column(row, "to_addr")?,
        subject: read_column(row, "subject")?,
        body: read_column(row, "body")?,
        status: status
            .parse()
            .map_err(JobStoreError::Storage)?,
        attempts: attempts as u32,
        error_message: read_column(row, "error_message")?,
        created_at,
        sent_at,
    })
}

fn read_column<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, JobStoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column)
        .map_err(|e| JobStoreError::Storage(format!("failed to read column {column}: {e}")))
}

/// Map sqlx errors onto the store error.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => JobStoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        other => JobStoreError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}
