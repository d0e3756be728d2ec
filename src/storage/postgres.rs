// src/storage/postgres.rs
//! Postgres-backed store over sqlx.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

use crate::job::Job;
use crate::storage::{Storage, StorageError, UpsertOutcome};

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if missing. Called once at startup.
    pub async fn init(&self) -> Result<(), StorageError> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id SERIAL PRIMARY KEY,
                source_id TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                last_scraped_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id SERIAL PRIMARY KEY,
                source_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                title TEXT NOT NULL,
                location TEXT NOT NULL,
                team TEXT,
                department TEXT,
                employment_type TEXT,
                remote BOOLEAN NOT NULL DEFAULT FALSE,
                description TEXT NOT NULL DEFAULT '',
                description_html TEXT NOT NULL DEFAULT '',
                apply_url TEXT NOT NULL DEFAULT '',
                job_url TEXT NOT NULL DEFAULT '',
                published_at TIMESTAMPTZ NOT NULL,
                scraped_at TIMESTAMPTZ NOT NULL,
                compensation_summary TEXT,
                content_hash TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_source_jobid
                ON jobs (source_id, job_id)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_jobs_active ON jobs (is_active)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS job_snapshots (
                id SERIAL PRIMARY KEY,
                source_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                snapshot_data JSONB NOT NULL,
                captured_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshots_source_job_hash
                ON job_snapshots (source_id, job_id, content_hash)
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(query_err)?;
        }
        info!("database schema initialized");
        Ok(())
    }
}

fn query_err(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable(e.to_string())
        }
        other => StorageError::Query(other.to_string()),
    }
}

fn job_from_row(row: &PgRow) -> Job {
    Job {
        source_id: row.get("source_id"),
        job_id: row.get("job_id"),
        title: row.get("title"),
        location: row.get("location"),
        team: row.get("team"),
        department: row.get("department"),
        employment_type: row.get("employment_type"),
        remote: row.get("remote"),
        description: row.get("description"),
        description_html: row.get("description_html"),
        apply_url: row.get("apply_url"),
        job_url: row.get("job_url"),
        published_at: row.get("published_at"),
        scraped_at: row.get("scraped_at"),
        compensation_summary: row.get("compensation_summary"),
        content_hash: row.get("content_hash"),
        is_active: row.get("is_active"),
    }
}

const JOB_COLUMNS: &str = "source_id, job_id, title, location, team, department, \
     employment_type, remote, description, description_html, apply_url, job_url, \
     published_at, scraped_at, compensation_summary, content_hash, is_active";

#[async_trait]
impl Storage for PostgresStorage {
    async fn upsert_source(
        &self,
        source_id: &str,
        display_name: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO sources (source_id, display_name)
            VALUES ($1, $2)
            ON CONFLICT (source_id) DO UPDATE SET display_name = EXCLUDED.display_name
            "#,
        )
        .bind(source_id)
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn update_last_scraped(&self, source_id: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE sources SET last_scraped_at = NOW() WHERE source_id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn last_scraped_all(
        &self,
    ) -> Result<HashMap<String, Option<DateTime<Utc>>>, StorageError> {
        let rows = sqlx::query("SELECT source_id, last_scraped_at FROM sources")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("source_id"), r.get("last_scraped_at")))
            .collect())
    }

    async fn active_jobs(&self, source_id: &str) -> Result<Vec<Job>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE source_id = $1 AND is_active = TRUE ORDER BY id"
        ))
        .bind(source_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    async fn job(&self, source_id: &str, job_id: &str) -> Result<Option<Job>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE source_id = $1 AND job_id = $2"
        ))
        .bind(source_id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(row.as_ref().map(job_from_row))
    }

    async fn upsert_job(&self, job: &Job) -> Result<UpsertOutcome, StorageError> {
        // Row-lock the key for the read-then-write so the outcome and the
        // write cannot interleave with another writer.
        let mut tx = self.pool.begin().await.map_err(query_err)?;

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT content_hash FROM jobs WHERE source_id = $1 AND job_id = $2 FOR UPDATE",
        )
        .bind(&job.source_id)
        .bind(&job.job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_err)?;

        let outcome = match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO jobs (
                        source_id, job_id, title, location, team, department,
                        employment_type, remote, description, description_html,
                        apply_url, job_url, published_at, scraped_at,
                        compensation_summary, content_hash, is_active
                    ) VALUES (
                        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                        $11, $12, $13, $14, $15, $16, TRUE
                    )
                    "#,
                )
                .bind(&job.source_id)
                .bind(&job.job_id)
                .bind(&job.title)
                .bind(&job.location)
                .bind(&job.team)
                .bind(&job.department)
                .bind(&job.employment_type)
                .bind(job.remote)
                .bind(&job.description)
                .bind(&job.description_html)
                .bind(&job.apply_url)
                .bind(&job.job_url)
                .bind(job.published_at)
                .bind(job.scraped_at)
                .bind(&job.compensation_summary)
                .bind(&job.content_hash)
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
                UpsertOutcome::Inserted
            }
            Some(hash) if hash != job.content_hash => {
                sqlx::query(
                    r#"
                    UPDATE jobs SET
                        title = $1, location = $2, team = $3, department = $4,
                        employment_type = $5, remote = $6, description = $7,
                        description_html = $8, apply_url = $9, job_url = $10,
                        published_at = $11, scraped_at = $12,
                        compensation_summary = $13, content_hash = $14,
                        is_active = TRUE, updated_at = NOW()
                    WHERE source_id = $15 AND job_id = $16
                    "#,
                )
                .bind(&job.title)
                .bind(&job.location)
                .bind(&job.team)
                .bind(&job.department)
                .bind(&job.employment_type)
                .bind(job.remote)
                .bind(&job.description)
                .bind(&job.description_html)
                .bind(&job.apply_url)
                .bind(&job.job_url)
                .bind(job.published_at)
                .bind(job.scraped_at)
                .bind(&job.compensation_summary)
                .bind(&job.content_hash)
                .bind(&job.source_id)
                .bind(&job.job_id)
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
                UpsertOutcome::Updated
            }
            Some(_) => {
                sqlx::query(
                    r#"
                    UPDATE jobs SET scraped_at = $1, is_active = TRUE, updated_at = NOW()
                    WHERE source_id = $2 AND job_id = $3
                    "#,
                )
                .bind(job.scraped_at)
                .bind(&job.source_id)
                .bind(&job.job_id)
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
                UpsertOutcome::Unchanged
            }
        };

        tx.commit().await.map_err(query_err)?;
        Ok(outcome)
    }

    async fn mark_inactive(
        &self,
        source_id: &str,
        keep_active: &[String],
    ) -> Result<Vec<Job>, StorageError> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE jobs SET is_active = FALSE, updated_at = NOW()
            WHERE source_id = $1 AND is_active = TRUE AND NOT (job_id = ANY($2))
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(source_id)
        .bind(keep_active)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    async fn save_snapshot(&self, job: &Job) -> Result<(), StorageError> {
        let data = serde_json::to_value(job).unwrap_or_default();
        sqlx::query(
            r#"
            INSERT INTO job_snapshots (source_id, job_id, content_hash, snapshot_data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source_id, job_id, content_hash) DO NOTHING
            "#,
        )
        .bind(&job.source_id)
        .bind(&job.job_id)
        .bind(&job.content_hash)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn all_active_jobs(&self) -> Result<Vec<Job>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE is_active = TRUE \
             ORDER BY source_id, published_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(rows.iter().map(job_from_row).collect())
    }
}
