// src/diff.rs
//! Change classification for one employer's batch of normalized jobs.
//!
//! Classification itself is a pure function of `(previous active set,
//! current batch)`; [`DiffEngine`] applies the result through the
//! [`Storage`] contract and emits the events that actually committed.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::job::Job;
use crate::storage::{Storage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    New,
    Updated,
    Removed,
}

/// One observed transition for a `(source_id, job_id)`. `previous` is set
/// only for `Updated`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub job: Job,
    pub previous: Option<Job>,
}

/// Pure diff result: events in emit order (inserts/updates in batch order,
/// removals appended) plus the ids that remain active after the batch.
#[derive(Debug, Default)]
pub struct DiffOutcome {
    pub events: Vec<ChangeEvent>,
    pub active_ids: Vec<String>,
}

/// Classify a batch against the previously-active set, without storage.
///
/// A job absent from the previously-active set is New even when an inactive
/// row for it still exists: re-appearance starts a new lifecycle. An
/// unchanged hash produces no event. Every previously-active id the batch no
/// longer lists is Removed, carrying the last-known fields.
pub fn diff_batch(previous_active: &[Job], batch: &[Job]) -> DiffOutcome {
    let prev_by_id: HashMap<&str, &Job> = previous_active
        .iter()
        .map(|j| (j.job_id.as_str(), j))
        .collect();
    let batch_ids: HashSet<&str> = batch.iter().map(|j| j.job_id.as_str()).collect();

    let mut events = Vec::new();
    for job in batch {
        match prev_by_id.get(job.job_id.as_str()) {
            None => events.push(ChangeEvent {
                kind: ChangeKind::New,
                job: job.clone(),
                previous: None,
            }),
            Some(prev) if prev.content_hash != job.content_hash => events.push(ChangeEvent {
                kind: ChangeKind::Updated,
                job: job.clone(),
                previous: Some((*prev).clone()),
            }),
            Some(_) => {}
        }
    }

    for prev in previous_active {
        if !batch_ids.contains(prev.job_id.as_str()) {
            let mut gone = prev.clone();
            gone.is_active = false;
            events.push(ChangeEvent {
                kind: ChangeKind::Removed,
                job: gone,
                previous: None,
            });
        }
    }

    DiffOutcome {
        events,
        active_ids: batch.iter().map(|j| j.job_id.clone()).collect(),
    }
}

/// Applies a batch to storage and returns the events that committed.
pub struct DiffEngine<'a> {
    storage: &'a dyn Storage,
}

impl<'a> DiffEngine<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Upsert every batch job in input order, snapshot inserts and content
    /// changes, then deactivate whatever the batch no longer lists. Removal
    /// detection runs last, against the just-updated active set.
    ///
    /// A failed write skips that job's event and keeps going; the job's id
    /// stays in the keep-active set so our own failure never deactivates a
    /// posting the source still lists. Only an unreachable store aborts.
    pub async fn detect_changes(
        &self,
        batch: &[Job],
        source_id: &str,
    ) -> Result<Vec<ChangeEvent>, StorageError> {
        let previous = self.storage.active_jobs(source_id).await?;
        let planned = diff_batch(&previous, batch);

        let mut planned_by_id: HashMap<&str, &ChangeEvent> = HashMap::new();
        for event in &planned.events {
            if event.kind != ChangeKind::Removed {
                planned_by_id.insert(event.job.job_id.as_str(), event);
            }
        }

        let mut events: Vec<ChangeEvent> = Vec::new();
        for job in batch {
            match self.storage.upsert_job(job).await {
                Ok(_) => {
                    if let Some(event) = planned_by_id.get(job.job_id.as_str()) {
                        if let Err(err) = self.storage.save_snapshot(job).await {
                            warn!(
                                source_id,
                                job_id = %job.job_id,
                                error = %err,
                                "snapshot write failed"
                            );
                        }
                        events.push((*event).clone());
                    }
                }
                Err(StorageError::Unavailable(msg)) => {
                    return Err(StorageError::Unavailable(msg));
                }
                Err(err) => {
                    warn!(
                        source_id,
                        job_id = %job.job_id,
                        error = %err,
                        "job write failed, continuing with batch"
                    );
                }
            }
        }

        let removed = self
            .storage
            .mark_inactive(source_id, &planned.active_ids)
            .await?;
        for job in removed {
            events.push(ChangeEvent {
                kind: ChangeKind::Removed,
                job,
                previous: None,
            });
        }

        let count = |kind: ChangeKind| events.iter().filter(|e| e.kind == kind).count();
        info!(
            source_id,
            new = count(ChangeKind::New),
            updated = count(ChangeKind::Updated),
            removed = count(ChangeKind::Removed),
            "diff complete"
        );

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(id: &str, hash: &str) -> Job {
        Job {
            source_id: "acme".into(),
            job_id: id.into(),
            title: format!("Job {id}"),
            location: "Unknown".into(),
            team: None,
            department: None,
            employment_type: None,
            remote: false,
            description: String::new(),
            description_html: String::new(),
            apply_url: String::new(),
            job_url: String::new(),
            published_at: Utc::now(),
            scraped_at: Utc::now(),
            compensation_summary: None,
            content_hash: hash.into(),
            is_active: true,
        }
    }

    #[test]
    fn empty_previous_set_makes_everything_new() {
        let out = diff_batch(&[], &[job("a", "h1"), job("b", "h2")]);
        assert_eq!(out.events.len(), 2);
        assert!(out.events.iter().all(|e| e.kind == ChangeKind::New));
        assert_eq!(out.active_ids, vec!["a", "b"]);
    }

    #[test]
    fn unchanged_batch_is_silent() {
        let prev = vec![job("a", "h1")];
        let out = diff_batch(&prev, &[job("a", "h1")]);
        assert!(out.events.is_empty());
    }

    #[test]
    fn hash_change_emits_updated_with_previous() {
        let prev = vec![job("a", "h1")];
        let out = diff_batch(&prev, &[job("a", "h2")]);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].kind, ChangeKind::Updated);
        assert_eq!(
            out.events[0].previous.as_ref().unwrap().content_hash,
            "h1"
        );
    }

    #[test]
    fn missing_job_emits_removed_after_upserts() {
        let prev = vec![job("a", "h1"), job("b", "h2")];
        let out = diff_batch(&prev, &[job("a", "h1")]);
        assert_eq!(out.events.len(), 1);
        let ev = &out.events[0];
        assert_eq!(ev.kind, ChangeKind::Removed);
        assert_eq!(ev.job.job_id, "b");
        assert!(!ev.job.is_active);
    }

    #[test]
    fn id_swap_is_removal_plus_new() {
        let prev = vec![job("old-id", "h1")];
        let out = diff_batch(&prev, &[job("new-id", "h1")]);
        let kinds: Vec<ChangeKind> = out.events.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::New, ChangeKind::Removed]);
    }

    #[test]
    fn empty_batch_removes_all_previously_active() {
        let prev = vec![job("a", "h1"), job("b", "h2")];
        let out = diff_batch(&prev, &[]);
        assert_eq!(out.events.len(), 2);
        assert!(out.events.iter().all(|e| e.kind == ChangeKind::Removed));
        assert!(out.active_ids.is_empty());
    }
}
