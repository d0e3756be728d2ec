// src/job.rs
//! Canonical records: jobs, their append-only snapshots, and sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single posting at one employer, keyed by `(source_id, job_id)`.
///
/// `content_hash` covers exactly the mutable display attributes (title,
/// location, plain description, employment type, remote flag, team,
/// department); two jobs with the same hash are unchanged even when other
/// metadata such as `scraped_at` differs. Jobs are never hard-deleted:
/// delisting flips `is_active` off, and a later re-listing starts a new
/// lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub source_id: String,
    pub job_id: String,
    pub title: String,
    pub location: String,
    pub team: Option<String>,
    pub department: Option<String>,
    pub employment_type: Option<String>,
    pub remote: bool,
    pub description: String,
    pub description_html: String,
    pub apply_url: String,
    pub job_url: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub compensation_summary: Option<String>,
    pub content_hash: String,
    pub is_active: bool,
}

/// Immutable capture of a job's normalized form at the moment it was
/// inserted or content-updated. Keyed by `(source_id, job_id, content_hash)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub source_id: String,
    pub job_id: String,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl JobSnapshot {
    pub fn of(job: &Job) -> Self {
        Self {
            source_id: job.source_id.clone(),
            job_id: job.job_id.clone(),
            content_hash: job.content_hash.clone(),
            captured_at: Utc::now(),
            data: serde_json::to_value(job).unwrap_or_default(),
        }
    }
}

/// An employer/job-board identity, upserted idempotently by `source_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub source_id: String,
    pub display_name: String,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

/// Digest over field values joined with a fixed `|` delimiter.
///
/// Change-detection strength only, not a security boundary.
pub fn fingerprint<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let mut hasher = Sha256::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
