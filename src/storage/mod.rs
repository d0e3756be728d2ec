// src/storage/mod.rs
//! Durable keyed store for sources, jobs, and job snapshots.
//!
//! The pipeline consumes this narrow contract only; implementations live in
//! [`postgres`] (production) and [`memory`] (tests).

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::job::Job;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The store itself cannot be reached; aborts the whole run.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// A single query or write failed; isolated to the job or source at hand.
    #[error("storage operation failed: {0}")]
    Query(String),
}

/// Outcome of an atomic per-key job upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn upsert_source(&self, source_id: &str, display_name: &str)
        -> Result<(), StorageError>;

    async fn update_last_scraped(&self, source_id: &str) -> Result<(), StorageError>;

    async fn last_scraped_all(
        &self,
    ) -> Result<HashMap<String, Option<DateTime<Utc>>>, StorageError>;

    async fn active_jobs(&self, source_id: &str) -> Result<Vec<Job>, StorageError>;

    async fn job(&self, source_id: &str, job_id: &str) -> Result<Option<Job>, StorageError>;

    /// Insert or reconcile one job, atomic per `(source_id, job_id)`.
    /// A differing `content_hash` rewrites the mutable fields; a matching one
    /// only touches `scraped_at`. Both paths reactivate the row.
    async fn upsert_job(&self, job: &Job) -> Result<UpsertOutcome, StorageError>;

    /// Deactivate every active job of `source_id` whose id is not in
    /// `keep_active`, returning the rows that were flipped.
    async fn mark_inactive(
        &self,
        source_id: &str,
        keep_active: &[String],
    ) -> Result<Vec<Job>, StorageError>;

    async fn save_snapshot(&self, job: &Job) -> Result<(), StorageError>;

    async fn all_active_jobs(&self) -> Result<Vec<Job>, StorageError>;
}
