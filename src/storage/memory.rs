// src/storage/memory.rs
//! Mutex-guarded in-memory store backing unit and pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::job::{Job, JobSnapshot};
use crate::storage::{Storage, StorageError, UpsertOutcome};

#[derive(Default)]
struct Inner {
    /// source_id -> (display_name, last_scraped_at)
    sources: HashMap<String, (String, Option<DateTime<Utc>>)>,
    /// (source_id, job_id) -> job, insertion-ordered key list alongside
    jobs: HashMap<(String, String), Job>,
    job_order: Vec<(String, String)>,
    snapshots: Vec<JobSnapshot>,
    /// keys whose next upsert fails, for failure-isolation tests
    broken_keys: HashSet<(String, String)>,
}

#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make upserts for `(source_id, job_id)` fail until cleared; lets tests
    /// exercise per-job persistence failure without a real store.
    pub fn inject_upsert_failure(&self, source_id: &str, job_id: &str) {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        inner
            .broken_keys
            .insert((source_id.to_string(), job_id.to_string()));
    }

    pub fn clear_upsert_failures(&self) {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        inner.broken_keys.clear();
    }

    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        inner.snapshots.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upsert_source(
        &self,
        source_id: &str,
        display_name: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        let last = inner
            .sources
            .get(source_id)
            .and_then(|(_, last)| *last);
        inner
            .sources
            .insert(source_id.to_string(), (display_name.to_string(), last));
        Ok(())
    }

    async fn update_last_scraped(&self, source_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        match inner.sources.get_mut(source_id) {
            Some((_, last)) => {
                *last = Some(Utc::now());
                Ok(())
            }
            None => Err(StorageError::Query(format!(
                "unknown source `{source_id}`"
            ))),
        }
    }

    async fn last_scraped_all(
        &self,
    ) -> Result<HashMap<String, Option<DateTime<Utc>>>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner
            .sources
            .iter()
            .map(|(id, (_, last))| (id.clone(), *last))
            .collect())
    }

    async fn active_jobs(&self, source_id: &str) -> Result<Vec<Job>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner
            .job_order
            .iter()
            .filter(|(src, _)| src == source_id)
            .filter_map(|key| inner.jobs.get(key))
            .filter(|job| job.is_active)
            .cloned()
            .collect())
    }

    async fn job(&self, source_id: &str, job_id: &str) -> Result<Option<Job>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner
            .jobs
            .get(&(source_id.to_string(), job_id.to_string()))
            .cloned())
    }

    async fn upsert_job(&self, job: &Job) -> Result<UpsertOutcome, StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        let key = (job.source_id.clone(), job.job_id.clone());

        if inner.broken_keys.contains(&key) {
            return Err(StorageError::Query(format!(
                "injected failure for `{}/{}`",
                job.source_id, job.job_id
            )));
        }

        match inner.jobs.get_mut(&key) {
            None => {
                let mut stored = job.clone();
                stored.is_active = true;
                inner.jobs.insert(key.clone(), stored);
                inner.job_order.push(key);
                Ok(UpsertOutcome::Inserted)
            }
            Some(existing) if existing.content_hash != job.content_hash => {
                let mut stored = job.clone();
                stored.is_active = true;
                *existing = stored;
                Ok(UpsertOutcome::Updated)
            }
            Some(existing) => {
                existing.scraped_at = job.scraped_at;
                existing.is_active = true;
                Ok(UpsertOutcome::Unchanged)
            }
        }
    }

    async fn mark_inactive(
        &self,
        source_id: &str,
        keep_active: &[String],
    ) -> Result<Vec<Job>, StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        let keep: HashSet<&str> = keep_active.iter().map(String::as_str).collect();
        let keys: Vec<(String, String)> = inner
            .job_order
            .iter()
            .filter(|(src, id)| src == source_id && !keep.contains(id.as_str()))
            .cloned()
            .collect();

        let mut removed = Vec::new();
        for key in keys {
            if let Some(job) = inner.jobs.get_mut(&key) {
                if job.is_active {
                    job.is_active = false;
                    removed.push(job.clone());
                }
            }
        }
        Ok(removed)
    }

    async fn save_snapshot(&self, job: &Job) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("storage mutex poisoned");
        let snapshot = JobSnapshot::of(job);
        // Keyed by (source, job, hash): re-captures of the same content are
        // no-ops.
        let exists = inner.snapshots.iter().any(|s| {
            s.source_id == snapshot.source_id
                && s.job_id == snapshot.job_id
                && s.content_hash == snapshot.content_hash
        });
        if !exists {
            inner.snapshots.push(snapshot);
        }
        Ok(())
    }

    async fn all_active_jobs(&self) -> Result<Vec<Job>, StorageError> {
        let inner = self.inner.lock().expect("storage mutex poisoned");
        Ok(inner
            .job_order
            .iter()
            .filter_map(|key| inner.jobs.get(key))
            .filter(|job| job.is_active)
            .cloned()
            .collect())
    }
}
